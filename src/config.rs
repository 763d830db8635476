//! Configuration types for the clear detector
//!
//! These types define the structure of rule tables loaded from TOML files.
//! Threshold values are tuned by hand against real captures and belong in
//! configuration rather than code.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::{
    ActionRule, ClearLog, ClearState, ClearStateMachine, ClearWatcher, DEFAULT_COOLDOWN_TICKS,
    DEFAULT_MAX_LINES, DEFAULT_SUFFIX,
};
use crate::vision::DetectorConfig;
use crate::{ConfigError, Result};

/// Rule table shipped with the crate
pub const STANDARD_RULES: &str = include_str!("../assets/standard_rules.toml");

/// Reference image used by the bundled "Cleared outside endless" rule.
///
/// It is not shipped with the crate. Save a screenshot of the course clear
/// screen, at the resolution frames will be captured in, under this name in
/// the directory passed to [`WatcherConfig::build_watcher`].
pub const CLEAR_FRAME_ASSET: &str = "clear_frame.png";

/// Top-level watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Name of this configuration
    pub name: String,
    /// Delay between captures in milliseconds
    #[serde(default = "default_interval")]
    pub poll_interval_ms: u64,
    /// Ticks skipped after each transition
    #[serde(default = "default_cooldown")]
    pub cooldown_ticks: u32,
    #[serde(default)]
    pub counter: CounterConfig,
    /// Log lines kept before the oldest are dropped
    #[serde(default = "default_max_log_lines")]
    pub max_log_lines: usize,
    /// Rules in evaluation order
    pub rules: Vec<RuleConfig>,
}

fn default_interval() -> u64 {
    1000
}

fn default_cooldown() -> u32 {
    DEFAULT_COOLDOWN_TICKS
}

fn default_max_log_lines() -> usize {
    DEFAULT_MAX_LINES
}

/// Clear counter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterConfig {
    /// Count to resume from
    #[serde(default)]
    pub initial: u64,
    /// Text after the number in the overlay
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

fn default_suffix() -> String {
    DEFAULT_SUFFIX.to_string()
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            initial: 0,
            suffix: default_suffix(),
        }
    }
}

/// One action rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Message logged when the rule fires
    pub label: String,
    pub source: String,
    pub target: String,
    /// Named side effect, e.g. `increment_clears`
    #[serde(default)]
    pub on_fire: Option<String>,
    pub detector: DetectorConfig,
}

impl RuleConfig {
    /// Build the rule, loading reference images relative to `base_path`
    pub fn build(&self, base_path: &Path) -> Result<ActionRule> {
        let source: ClearState = self.source.parse()?;
        let target: ClearState = self.target.parse()?;
        let detector = self.detector.build(base_path)?;

        let mut rule = ActionRule::new(self.label.clone(), source, target, detector);
        if let Some(name) = &self.on_fire {
            let handler = ActionRule::named_handler(name).ok_or_else(|| {
                ConfigError::Invalid(format!("unknown handler '{}' on rule '{}'", name, self.label))
            })?;
            rule.set_handler(Some(handler));
        }
        Ok(rule)
    }
}

impl WatcherConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// The bundled rule table.
    ///
    /// Building it needs [`CLEAR_FRAME_ASSET`] in the base directory; without
    /// it `build_*` fails with [`Error::Image`](crate::Error::Image).
    pub fn standard() -> std::result::Result<Self, ConfigError> {
        Self::from_toml_str(STANDARD_RULES)
    }

    /// Delay between captures
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Build every rule in order
    pub fn build_rules(&self, base_path: &Path) -> Result<Vec<ActionRule>> {
        self.rules.iter().map(|rule| rule.build(base_path)).collect()
    }

    /// Build a state machine over the configured rules
    pub fn build_machine(&self, base_path: &Path) -> Result<ClearStateMachine> {
        let rules = self.build_rules(base_path)?;
        log::info!("Loaded {} rules from '{}'", rules.len(), self.name);
        Ok(ClearStateMachine::new(rules))
    }

    /// Build a watcher with the configured cooldown
    pub fn build_watcher(&self, base_path: &Path) -> Result<ClearWatcher> {
        Ok(ClearWatcher::new(self.build_machine(base_path)?).with_cooldown(self.cooldown_ticks))
    }

    /// A fresh log with the configured counter
    pub fn new_log(&self) -> ClearLog {
        ClearLog::with_counter(self.counter.initial, self.counter.suffix.clone())
            .with_max_lines(self.max_log_lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::Detector;
    use crate::Error;

    const MINIMAL: &str = r#"
        name = "test"

        [[rules]]
        label = "Always"
        source = "waiting"
        target = "cleared"
        detector = { type = "constant", value = true }
    "#;

    #[test]
    fn test_defaults() {
        let config = WatcherConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.cooldown_ticks, 2);
        assert_eq!(config.counter.initial, 0);
        assert_eq!(config.new_log().display_text(), "0 clears");
        assert_eq!(config.new_log().max_lines(), DEFAULT_MAX_LINES);
        assert!(config.rules[0].on_fire.is_none());
    }

    #[test]
    fn test_standard_table() {
        let config = WatcherConfig::standard().unwrap();
        assert_eq!(config.rules.len(), 6);
        assert_eq!(config.rules[0].label, "Course cleared");
        assert_eq!(config.rules[0].source, "waiting");

        let counting: Vec<_> = config
            .rules
            .iter()
            .filter(|r| r.on_fire.as_deref() == Some("increment_clears"))
            .map(|r| r.label.as_str())
            .collect();
        assert_eq!(counting.len(), 4);
        assert!(counting.iter().all(|l| l.starts_with("Endless")));

        let off_screen = &config.rules[5];
        assert!(off_screen.on_fire.is_none());
        assert!(matches!(
            &off_screen.detector,
            DetectorConfig::Stable { inner, window_ms: 7000, min_count: 5 }
                if matches!(**inner, DetectorConfig::Not { .. })
        ));
    }

    #[test]
    fn test_standard_table_from_asset_directory() {
        let assets = tempfile::tempdir().unwrap();
        let rules_path = assets.path().join("standard_rules.toml");
        std::fs::write(&rules_path, STANDARD_RULES).unwrap();
        let config = WatcherConfig::load(&rules_path).unwrap();

        // Only the clear frame is missing
        assert!(matches!(config.build_watcher(assets.path()), Err(Error::Image(_))));

        image::RgbaImage::new(96, 54)
            .save(assets.path().join(CLEAR_FRAME_ASSET))
            .unwrap();
        let watcher = config.build_watcher(assets.path()).unwrap();
        assert_eq!(watcher.machine().rules().len(), 6);
        assert_eq!(watcher.state(), ClearState::Waiting);
    }

    #[test]
    fn test_build_rules() {
        let config = WatcherConfig::from_toml_str(MINIMAL).unwrap();
        let rules = config.build_rules(Path::new(".")).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].source(), ClearState::Waiting);
        assert_eq!(rules[0].target(), ClearState::Cleared);
        assert!(matches!(rules[0].detector(), Detector::Constant(true)));
        assert!(!rules[0].has_handler());
    }

    #[test]
    fn test_invalid_state_and_handler() {
        let bad_state = MINIMAL.replace("\"cleared\"", "\"finished\"");
        let config = WatcherConfig::from_toml_str(&bad_state).unwrap();
        assert!(matches!(
            config.build_rules(Path::new(".")),
            Err(Error::Config(ConfigError::Invalid(_)))
        ));

        let bad_handler = MINIMAL.replace(
            "target = \"cleared\"",
            "target = \"cleared\"\n        on_fire = \"explode\"",
        );
        let config = WatcherConfig::from_toml_str(&bad_handler).unwrap();
        let err = config.build_rules(Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("explode"));
    }

    #[test]
    fn test_parse_and_io_errors() {
        assert!(matches!(
            WatcherConfig::from_toml_str("name = "),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            WatcherConfig::load(Path::new("/nonexistent/rules.toml")),
            Err(ConfigError::IoError(_))
        ));
    }
}
