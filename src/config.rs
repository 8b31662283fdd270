use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Explicit path to the library, skipping discovery
pub const LIBRARY_ENV: &str = "RENDERSTREAM_LIBRARY";
/// How long to wait for each frame request, in milliseconds
pub const TIMEOUT_ENV: &str = "RENDERSTREAM_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Load the library from here instead of the installed host's directory
    pub library_path: Option<PathBuf>,
    /// Longest wait for a frame request before reporting a timeout
    pub timeout: Duration,
    /// Route the library's log callbacks into `log`
    pub forward_logs: bool,
    /// Where to save the schema so the host can show it before the engine is launched
    pub schema_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library_path: None,
            timeout: Duration::from_millis(5000),
            forward_logs: true,
            schema_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults, overridden by whatever `lookup` finds
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = lookup(LIBRARY_ENV).filter(|p| !p.is_empty()) {
            config.library_path = Some(path.into());
        }
        if let Some(ms) = lookup(TIMEOUT_ENV) {
            let ms: u64 = ms.trim().parse().with_context(|| {
                format!("{} must be a whole number of milliseconds, got {:?}", TIMEOUT_ENV, ms)
            })?;
            config.timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }

    pub fn with_schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.timeout, Duration::from_millis(5000));
        assert!(config.forward_logs);
    }

    #[test]
    fn environment_overrides() {
        let config = Config::from_lookup(lookup(&[
            (LIBRARY_ENV, "/opt/d3/d3renderstream.dll"),
            (TIMEOUT_ENV, " 250 "),
        ]))
        .unwrap();
        assert_eq!(config.library_path, Some(PathBuf::from("/opt/d3/d3renderstream.dll")));
        assert_eq!(config.timeout, Duration::from_millis(250));
    }

    #[test]
    fn malformed_timeout_is_an_error() {
        assert!(Config::from_lookup(lookup(&[(TIMEOUT_ENV, "soon")])).is_err());
    }
}
