use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::EngineConfig;
use crate::error::ConfigError;
use crate::plan::Strategy;

/// Get the default planrun data directory: ~/.planrun
pub fn get_planrun_data_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()
        .filter(|home| !home.trim().is_empty())
        .map(|home| PathBuf::from(home).join(".planrun"))
}

pub fn load_from_str(s: &str) -> Result<EngineConfig, ConfigError> {
    let cfg: EngineConfig = toml::from_str(s)?;
    Ok(cfg)
}

/// Load a config file, apply environment overrides and validate.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let s = std::fs::read_to_string(path.as_ref())?;
    let mut cfg = load_from_str(&s)?;
    apply_env_overrides(&mut cfg)?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_default() -> Result<EngineConfig, ConfigError> {
    // Priority 1: ~/.planrun/config.toml
    if let Some(user_config) = get_planrun_data_dir().map(|dir| dir.join("config.toml")) {
        if user_config.exists() {
            debug!(path = %user_config.display(), "loading config");
            return load_from_path(user_config);
        }
    }

    // Priority 2: ./planrun.toml
    let local_config = Path::new("planrun.toml");
    if local_config.exists() {
        debug!(path = %local_config.display(), "loading config");
        return load_from_path(local_config);
    }

    let mut cfg = EngineConfig::default();
    apply_env_overrides(&mut cfg)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Environment variable overrides (highest priority).
pub fn apply_env_overrides(cfg: &mut EngineConfig) -> Result<(), ConfigError> {
    apply_overrides(cfg, |key| std::env::var(key).ok())
}

fn apply_overrides<F>(cfg: &mut EngineConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = var("PLANRUN_STRATEGY") {
        cfg.executor.strategy_override = Some(v.parse::<Strategy>()?);
    }
    if let Some(v) = var("PLANRUN_MAX_PARALLEL") {
        cfg.executor.max_parallel = v.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: "PLANRUN_MAX_PARALLEL",
            value: v.clone(),
        })?;
    }
    if let Some(v) = var("PLANRUN_TASK_TIMEOUT_MS") {
        let ms = v.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: "PLANRUN_TASK_TIMEOUT_MS",
            value: v.clone(),
        })?;
        cfg.executor.task_timeout_ms = Some(ms);
    }
    if let Some(v) = var("PLANRUN_LOG") {
        cfg.logging.level = v;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[executor]
strategy = "adaptive"
max_parallel = 6
cancel_grace_ms = 250

[executor.adaptive]
failure_threshold = 0.25

[logging]
console = false
level = "debug"
"#
        )
        .unwrap();

        let cfg = load_from_path(file.path()).unwrap();
        assert_eq!(cfg.executor.strategy_override, Some(Strategy::Adaptive));
        assert_eq!(cfg.executor.max_parallel, 6);
        assert_eq!(cfg.executor.cancel_grace_ms, 250);
        assert_eq!(cfg.executor.adaptive.failure_threshold, 0.25);
        assert!(!cfg.logging.console);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg = load_from_str("").unwrap();
        assert_eq!(cfg.executor.max_parallel, 4);
        assert!(cfg.executor.strategy_override.is_none());
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = load_from_str("[executor\nmax_parallel = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from_path(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_zero_parallel_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[executor]\nmax_parallel = 0").unwrap();
        let err = load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConcurrency(0)));
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = EngineConfig::default();
        apply_overrides(
            &mut cfg,
            env(&[
                ("PLANRUN_STRATEGY", "sequential"),
                ("PLANRUN_MAX_PARALLEL", "12"),
                ("PLANRUN_TASK_TIMEOUT_MS", "1500"),
                ("PLANRUN_LOG", "planrun_core=trace"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.executor.strategy_override, Some(Strategy::Sequential));
        assert_eq!(cfg.executor.max_parallel, 12);
        assert_eq!(cfg.executor.task_timeout_ms, Some(1500));
        assert_eq!(cfg.logging.level, "planrun_core=trace");
    }

    #[test]
    fn test_env_overrides_reject_garbage() {
        let mut cfg = EngineConfig::default();
        let err = apply_overrides(&mut cfg, env(&[("PLANRUN_MAX_PARALLEL", "lots")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "PLANRUN_MAX_PARALLEL",
                ..
            }
        ));

        let err = apply_overrides(&mut cfg, env(&[("PLANRUN_STRATEGY", "random")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownStrategy(_)));
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut cfg = EngineConfig::default();
        apply_overrides(&mut cfg, env(&[("PLANRUN_MAX_PARALLEL", "  ")])).unwrap();
        assert_eq!(cfg.executor.max_parallel, 4);
    }
}
