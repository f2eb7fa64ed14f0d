use std::path::Path;

use anyhow::{Context, Result};
use planrun_core::executor::ExecutionResult;
use tracing::info;

/// Write `result` as a pretty-printed JSON report, creating parent
/// directories as needed.
pub fn write_report(path: impl AsRef<Path>, result: &ExecutionResult) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create report dir {}", parent.display()))?;
    }

    let json = result
        .to_json_pretty()
        .context("serialize execution result")?;
    std::fs::write(path, json).with_context(|| format!("write report {}", path.display()))?;

    info!(run_id = %result.run_id, path = %path.display(), "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::FnStepRunner;
    use planrun_core::error::StepError;
    use planrun_core::executor::{ExecutionEngine, StepInput};
    use planrun_core::plan::{Plan, TaskType};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_report_round_trips_through_disk() {
        let engine = ExecutionEngine::new(Arc::new(FnStepRunner::new(
            |input: StepInput| async move { Ok::<_, StepError>(input.task_id) },
        )));
        let mut plan = Plan::new("report");
        plan.add("a", "x", TaskType::Action, Vec::<String>::new())
            .unwrap();
        let result = engine.execute(&mut plan).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        write_report(&path, &result).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["run_id"], result.run_id.as_str());
        assert_eq!(value["status"], "success");
        assert_eq!(value["final_output"]["output"], "a");
    }
}
