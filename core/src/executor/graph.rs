use std::collections::{HashMap, VecDeque};

use crate::error::GraphError;

/// Common task interface for graph handling.
pub trait TaskLike {
    fn id(&self) -> &str;
    fn dependencies(&self) -> &[String];
}

/// Topological levels of a validated graph, as indices into the task slice.
///
/// Level 0 holds tasks without dependencies; every other task sits at
/// `1 + max(level of its dependencies)`. Inside a level, indices are sorted
/// by declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Levels {
    levels: Vec<Vec<usize>>,
}

impl Levels {
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, level: usize) -> Option<&[usize]> {
        self.levels.get(level).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.levels.iter().map(Vec::as_slice)
    }

    /// Level number of the task at `idx`.
    pub fn level_of(&self, idx: usize) -> Option<usize> {
        self.levels.iter().position(|level| level.contains(&idx))
    }

    pub fn to_ids<T: TaskLike>(&self, tasks: &[T]) -> Vec<Vec<String>> {
        self.levels
            .iter()
            .map(|level| level.iter().map(|&i| tasks[i].id().to_string()).collect())
            .collect()
    }
}

/// Task dependency graph (DAG) over an arena of tasks.
///
/// Nodes are referred to by their index in the task slice; edges are
/// index lists, so validation and leveling are plain array algorithms.
#[derive(Debug)]
pub struct TaskGraph<'a, T: TaskLike> {
    nodes: &'a [T],

    /// Dependency edges: node -> nodes it depends on (declared order)
    edges: Vec<Vec<usize>>,

    /// Reverse edges: node -> nodes that depend on it
    reverse_edges: Vec<Vec<usize>>,
}

impl<'a, T: TaskLike> TaskGraph<'a, T> {
    /// Construct task graph from task list
    ///
    /// Fails on duplicate IDs and on dependencies that name no task in the
    /// list (first offender in declaration order).
    pub fn from_tasks(tasks: &'a [T]) -> Result<Self, GraphError> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(tasks.len());
        for (idx, task) in tasks.iter().enumerate() {
            if index.insert(task.id(), idx).is_some() {
                return Err(GraphError::DuplicateTaskId(task.id().to_string()));
            }
        }

        let mut edges = Vec::with_capacity(tasks.len());
        let mut reverse_edges = vec![Vec::new(); tasks.len()];

        for (idx, task) in tasks.iter().enumerate() {
            let mut deps = Vec::with_capacity(task.dependencies().len());
            for dep in task.dependencies() {
                let Some(&dep_idx) = index.get(dep.as_str()) else {
                    return Err(GraphError::UnknownDependency {
                        task_id: task.id().to_string(),
                        dependency: dep.clone(),
                    });
                };
                deps.push(dep_idx);
                reverse_edges[dep_idx].push(idx);
            }
            edges.push(deps);
        }

        Ok(Self {
            nodes: tasks,
            edges,
            reverse_edges,
        })
    }

    /// Validate the graph and compute its levels.
    pub fn resolve(&self) -> Result<Levels, GraphError> {
        self.validate()?;
        Ok(self.levels())
    }

    /// Reject empty graphs and cycles.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::EmptyPlan);
        }

        if let Some(path) = self.detect_cycle() {
            return Err(GraphError::CycleDetected { path });
        }

        Ok(())
    }

    pub fn dependencies_of(&self, idx: usize) -> &[usize] {
        &self.edges[idx]
    }

    pub fn dependents_of(&self, idx: usize) -> &[usize] {
        &self.reverse_edges[idx]
    }

    /// Nodes nothing depends on, in declaration order.
    pub fn sinks(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&idx| self.reverse_edges[idx].is_empty())
            .collect()
    }

    /// Longest-path leveling using Kahn's algorithm.
    ///
    /// Must only be called on a validated (acyclic) graph.
    ///
    /// # Time Complexity
    ///
    /// O(V + E) where V = number of tasks, E = number of dependencies
    fn levels(&self) -> Levels {
        let n = self.nodes.len();
        let mut in_degree: Vec<usize> = self.edges.iter().map(Vec::len).collect();
        let mut level = vec![0usize; n];

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();

        while let Some(node) = queue.pop_front() {
            for &dependent in &self.reverse_edges[node] {
                level[dependent] = level[dependent].max(level[node] + 1);
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        let depth = level.iter().copied().max().map_or(0, |max| max + 1);
        let mut levels = vec![Vec::new(); depth];
        // Ascending index order keeps declaration order within a level.
        for (idx, &lvl) in level.iter().enumerate() {
            levels[lvl].push(idx);
        }

        Levels { levels }
    }

    /// Detect circular dependencies using DFS with a recursion stack.
    ///
    /// Returns the offending path, starting and ending at the same task.
    fn detect_cycle(&self) -> Option<Vec<String>> {
        let n = self.nodes.len();
        let mut visited = vec![false; n];
        let mut on_stack = vec![false; n];
        let mut stack = Vec::new();

        for start in 0..n {
            if !visited[start]
                && self.dfs_cycle(start, &mut visited, &mut on_stack, &mut stack)
            {
                return Some(
                    stack
                        .iter()
                        .map(|&i| self.nodes[i].id().to_string())
                        .collect(),
                );
            }
        }

        None
    }

    fn dfs_cycle(
        &self,
        node: usize,
        visited: &mut [bool],
        on_stack: &mut [bool],
        stack: &mut Vec<usize>,
    ) -> bool {
        visited[node] = true;
        on_stack[node] = true;
        stack.push(node);

        for &dep in &self.edges[node] {
            if on_stack[dep] {
                if let Some(pos) = stack.iter().position(|&x| x == dep) {
                    stack.push(dep);
                    stack.drain(..pos);
                }
                return true;
            }

            if !visited[dep] && self.dfs_cycle(dep, visited, on_stack, stack) {
                return true;
            }
        }

        on_stack[node] = false;
        stack.pop();
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone)]
    struct Node {
        id: String,
        deps: Vec<String>,
    }

    impl TaskLike for Node {
        fn id(&self) -> &str {
            &self.id
        }

        fn dependencies(&self) -> &[String] {
            &self.deps
        }
    }

    fn node(id: &str, deps: &[&str]) -> Node {
        Node {
            id: id.to_string(),
            deps: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn level_ids(tasks: &[Node]) -> Vec<Vec<String>> {
        TaskGraph::from_tasks(tasks)
            .unwrap()
            .resolve()
            .unwrap()
            .to_ids(tasks)
    }

    #[test]
    fn test_diamond_levels() {
        let tasks = vec![
            node("a", &[]),
            node("b", &["a"]),
            node("c", &["a"]),
            node("d", &["b", "c"]),
        ];
        assert_eq!(
            level_ids(&tasks),
            vec![
                vec!["a".to_string()],
                vec!["b".to_string(), "c".to_string()],
                vec!["d".to_string()],
            ]
        );
    }

    #[test]
    fn test_level_is_longest_path() {
        // d depends on a (level 0) and c (level 2) -> level 3
        let tasks = vec![
            node("a", &[]),
            node("b", &["a"]),
            node("c", &["b"]),
            node("d", &["a", "c"]),
        ];
        let levels = TaskGraph::from_tasks(&tasks).unwrap().resolve().unwrap();
        assert_eq!(levels.len(), 4);
        assert_eq!(levels.level_of(3), Some(3));
    }

    #[test]
    fn test_levels_independent_of_declaration_order() {
        let forward = vec![
            node("a", &[]),
            node("b", &["a"]),
            node("c", &["b"]),
            node("x", &[]),
        ];
        let reversed: Vec<Node> = forward.iter().rev().cloned().collect();

        let mut fwd = level_ids(&forward);
        let mut rev = level_ids(&reversed);
        for level in fwd.iter_mut().chain(rev.iter_mut()) {
            level.sort();
        }
        assert_eq!(fwd, rev);
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let tasks = vec![node("z", &[]), node("m", &[]), node("a", &[])];
        assert_eq!(
            level_ids(&tasks),
            vec![vec!["z".to_string(), "m".to_string(), "a".to_string()]]
        );
    }

    #[test]
    fn test_unknown_dependency() {
        let tasks = vec![node("a", &[]), node("b", &["ghost"])];
        let err = TaskGraph::from_tasks(&tasks).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownDependency {
                task_id: "b".into(),
                dependency: "ghost".into(),
            }
        );
    }

    #[test]
    fn test_two_node_cycle_path() {
        let tasks = vec![node("a", &["b"]), node("b", &["a"])];
        let err = TaskGraph::from_tasks(&tasks).unwrap().resolve().unwrap_err();
        assert_eq!(
            err,
            GraphError::CycleDetected {
                path: vec!["a".into(), "b".into(), "a".into()],
            }
        );
    }

    #[test]
    fn test_cycle_behind_acyclic_prefix() {
        let tasks = vec![
            node("root", &[]),
            node("x", &["root", "z"]),
            node("y", &["x"]),
            node("z", &["y"]),
        ];
        let err = TaskGraph::from_tasks(&tasks).unwrap().validate().unwrap_err();
        assert_eq!(
            err,
            GraphError::CycleDetected {
                path: vec!["x".into(), "z".into(), "y".into(), "x".into()],
            }
        );
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let tasks = vec![node("a", &["a"])];
        let err = TaskGraph::from_tasks(&tasks).unwrap().validate().unwrap_err();
        assert_eq!(
            err,
            GraphError::CycleDetected {
                path: vec!["a".into(), "a".into()],
            }
        );
    }

    #[test]
    fn test_empty_graph() {
        let tasks: Vec<Node> = Vec::new();
        let err = TaskGraph::from_tasks(&tasks).unwrap().resolve().unwrap_err();
        assert_eq!(err, GraphError::EmptyPlan);
    }

    #[test]
    fn test_sinks_and_edges() {
        let tasks = vec![
            node("a", &[]),
            node("b", &["a"]),
            node("c", &["a"]),
        ];
        let graph = TaskGraph::from_tasks(&tasks).unwrap();
        assert_eq!(graph.sinks(), vec![1, 2]);
        assert_eq!(graph.dependents_of(0), &[1, 2]);
        assert_eq!(graph.dependencies_of(2), &[0]);
    }
}
