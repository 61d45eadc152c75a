use std::env;
use std::time::Duration;

/// Engine-level settings that are not part of the pipeline document
/// itself. Deliberately small: full pipeline-file loading
/// and CLI flag parsing are external concerns.
///
/// Sourced from `NOVAPIPE_*` environment variables, following the
/// env-var-first discovery pattern used for other process-wide
/// settings in this codebase.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Demotes a `failed_abort` to `failed_ignored` pipeline-wide.
    pub ignore_failures: bool,
    /// Applied to an attempt when the task doesn't set its own `timeout`.
    /// `None` means attempts never time out unless the task says so.
    pub default_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ignore_failures: false,
            default_timeout: None,
        }
    }
}

impl EngineConfig {
    /// Builds a config from the process environment, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let ignore_failures = env::var("NOVAPIPE_IGNORE_FAILURES")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let default_timeout = env::var("NOVAPIPE_DEFAULT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|secs| *secs > 0.0)
            .map(Duration::from_secs_f64);

        Self {
            ignore_failures,
            default_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_timeout_and_does_not_ignore_failures() {
        let config = EngineConfig::default();
        assert!(!config.ignore_failures);
        assert!(config.default_timeout.is_none());
    }

    #[test]
    fn from_env_reads_ignore_failures_truthy_spellings() {
        for val in ["1", "true", "TRUE", "yes", "Yes"] {
            env::set_var("NOVAPIPE_IGNORE_FAILURES", val);
            assert!(EngineConfig::from_env().ignore_failures, "val={val}");
        }
        env::remove_var("NOVAPIPE_IGNORE_FAILURES");
    }

    #[test]
    fn from_env_parses_default_timeout() {
        env::set_var("NOVAPIPE_DEFAULT_TIMEOUT_SECS", "2.5");
        let config = EngineConfig::from_env();
        assert_eq!(config.default_timeout, Some(Duration::from_secs_f64(2.5)));
        env::remove_var("NOVAPIPE_DEFAULT_TIMEOUT_SECS");
    }

    #[test]
    fn from_env_ignores_non_positive_timeout() {
        env::set_var("NOVAPIPE_DEFAULT_TIMEOUT_SECS", "-1");
        assert!(EngineConfig::from_env().default_timeout.is_none());
        env::remove_var("NOVAPIPE_DEFAULT_TIMEOUT_SECS");
    }
}
