use coursegraph_api::DEFAULT_AGGREGATION_PATH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Node-count limits applied by the tree store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Eager major loading stops once the graph would grow past this.
    pub initial_expansion_cap: usize,
    /// Initial graphs above this size produce a non-blocking warning.
    pub comfortable_threshold: usize,
    /// Children kept per expansion; extra rows are dropped.
    pub child_cap: usize,
    pub soft_ceiling: usize,
    pub hard_ceiling: usize,
    /// `limit` sent with every aggregation request.
    pub fetch_limit: usize,
    pub include_empty: bool,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            initial_expansion_cap: 400,
            comfortable_threshold: 250,
            child_cap: 120,
            soft_ceiling: 800,
            hard_ceiling: 1200,
            fetch_limit: 1000,
            include_empty: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Distance between consecutive levels along the depth axis.
    pub level_separation: f32,
    /// Gap between adjacent siblings.
    pub sibling_separation: f32,
    /// Gap between neighbouring nodes of different parents.
    pub subtree_separation: f32,
    pub node_width: f32,
    pub node_height: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            level_separation: 120.0,
            sibling_separation: 24.0,
            subtree_separation: 48.0,
            node_width: 160.0,
            node_height: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub min_scale: f32,
    pub max_scale: f32,
    pub fit_margin: f32,
    pub zoom_step: f32,
    pub animation_ms: u64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.1,
            max_scale: 4.0,
            fit_margin: 24.0,
            zoom_step: 1.15,
            animation_ms: 200,
        }
    }
}

impl ViewportConfig {
    pub fn animation(&self) -> Duration {
        Duration::from_millis(self.animation_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Live backend to load from when no data source is given on the
    /// command line.
    pub base_url: Option<String>,
    pub aggregation_path: String,
    pub timeout_secs: u64,
    /// Resource-list page that activated nodes link to.
    pub resource_list_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            aggregation_path: DEFAULT_AGGREGATION_PATH.to_string(),
            timeout_secs: 10,
            resource_list_url: "http://localhost:3000/resources".to_string(),
        }
    }
}

impl EndpointConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    pub budget: BudgetConfig,
    pub layout: LayoutConfig,
    pub viewport: ViewportConfig,
    pub endpoint: EndpointConfig,
}

impl NavigatorConfig {
    /// Read and validate a JSON config file. Missing fields keep their
    /// defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&content)?;
        tracing::info!("Loaded navigator config from {:?}", path);
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let budget = &self.budget;
        if budget.child_cap == 0 {
            return Err(ConfigError::Invalid("child_cap must be positive".into()));
        }
        if budget.comfortable_threshold > budget.initial_expansion_cap {
            return Err(ConfigError::Invalid(format!(
                "comfortable_threshold ({}) exceeds initial_expansion_cap ({})",
                budget.comfortable_threshold, budget.initial_expansion_cap
            )));
        }
        if budget.initial_expansion_cap > budget.hard_ceiling {
            return Err(ConfigError::Invalid(format!(
                "initial_expansion_cap ({}) exceeds hard_ceiling ({})",
                budget.initial_expansion_cap, budget.hard_ceiling
            )));
        }
        if budget.child_cap > budget.hard_ceiling {
            return Err(ConfigError::Invalid(format!(
                "child_cap ({}) exceeds hard_ceiling ({})",
                budget.child_cap, budget.hard_ceiling
            )));
        }
        if budget.soft_ceiling >= budget.hard_ceiling {
            return Err(ConfigError::Invalid(format!(
                "soft_ceiling ({}) must be below hard_ceiling ({})",
                budget.soft_ceiling, budget.hard_ceiling
            )));
        }

        let viewport = &self.viewport;
        if !(viewport.min_scale > 0.0 && viewport.min_scale <= viewport.max_scale) {
            return Err(ConfigError::Invalid(format!(
                "scale range [{}, {}] is empty",
                viewport.min_scale, viewport.max_scale
            )));
        }
        if viewport.zoom_step <= 1.0 {
            return Err(ConfigError::Invalid("zoom_step must be greater than 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = NavigatorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.budget.child_cap, 120);
        assert_eq!(config.budget.hard_ceiling, 1200);
        assert_eq!(config.viewport.max_scale, 4.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            NavigatorConfig::from_json(r#"{"budget": {"child_cap": 50}, "viewport": {}}"#)
                .unwrap();
        assert_eq!(config.budget.child_cap, 50);
        assert_eq!(config.budget.soft_ceiling, 800);
        assert_eq!(config.layout, LayoutConfig::default());
    }

    #[test]
    fn test_rejects_inconsistent_budgets() {
        let mut config = NavigatorConfig::default();
        config.budget.soft_ceiling = 1200;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = NavigatorConfig::default();
        config.budget.comfortable_threshold = 500;
        assert!(config.validate().is_err());

        let mut config = NavigatorConfig::default();
        config.budget.child_cap = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_caps_above_hard_ceiling() {
        let err = NavigatorConfig::from_json(
            r#"{"budget": {"soft_ceiling": 200, "hard_ceiling": 300}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("initial_expansion_cap (400)"));

        let err = NavigatorConfig::from_json(
            r#"{"budget": {"initial_expansion_cap": 100, "comfortable_threshold": 50,
                "child_cap": 400, "soft_ceiling": 200, "hard_ceiling": 300}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("child_cap (400)"));

        NavigatorConfig::from_json(
            r#"{"budget": {"initial_expansion_cap": 300, "comfortable_threshold": 250,
                "soft_ceiling": 200, "hard_ceiling": 300}}"#,
        )
        .unwrap();
    }

    #[test]
    fn test_rejects_inverted_scale_range() {
        let err = NavigatorConfig::from_json(r#"{"viewport": {"min_scale": 5.0}}"#).unwrap_err();
        assert!(err.to_string().contains("scale range"));
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("navigator.json");

        let mut config = NavigatorConfig::default();
        config.budget.initial_expansion_cap = 600;
        config.endpoint.base_url = Some("http://catalog.internal:9000".into());
        config.save(&path).unwrap();

        let loaded = NavigatorConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        match NavigatorConfig::load(&path) {
            Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
