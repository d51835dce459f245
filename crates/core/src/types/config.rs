use std::num::NonZeroUsize;

use serde::Deserialize;

pub const DEFAULT_RUN_NAME: &str = "run";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Diagnostic label; also published in the root context under `_run`.
    pub name: String,
    /// Record item failures as outcomes instead of raising the first one.
    pub return_exceptions: bool,
    /// Treat whatever the entry produces as one item.
    pub protected_items: bool,
    /// Upper bound on items in flight in parallel mode. Unbounded when unset.
    pub max_concurrency: Option<NonZeroUsize>,
}

impl RunConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn concurrency_limit(&self) -> usize {
        self.max_concurrency.map_or(usize::MAX, NonZeroUsize::get)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_RUN_NAME.to_string(),
            return_exceptions: false,
            protected_items: false,
            max_concurrency: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_partial_config_with_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{ "return_exceptions": true, "max_concurrency": 4 }"#)
                .expect("config should parse");

        assert_eq!(config.name, DEFAULT_RUN_NAME);
        assert!(config.return_exceptions);
        assert!(!config.protected_items);
        assert_eq!(config.concurrency_limit(), 4);
    }

    #[test]
    fn unbounded_when_no_limit_is_set() {
        assert_eq!(RunConfig::new("batch").concurrency_limit(), usize::MAX);
    }

    #[test]
    fn rejects_zero_concurrency() {
        let parsed = serde_json::from_str::<RunConfig>(r#"{ "max_concurrency": 0 }"#);
        assert!(parsed.is_err());
    }
}
