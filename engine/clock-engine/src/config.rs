//! Configuration for ClockEngine

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::clock::validate_tick_size;
use crate::error::ClockError;
use crate::modifier::{Modifier, ModifierKind};
use crate::types::TickMode;
use crate::{CORE_CLOCK_NAME, DEFAULT_MAX_CATCH_UP};

/// Registry-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tick size of the reference clock in seconds; `None` makes it variable-step
    pub core_tick_size: Option<f64>,

    /// Maximum catch-up ticks (and timer firings) performed per update call
    pub max_catch_up: u32,

    /// Clocks created alongside the reference clock, in order
    pub clocks: Vec<ClockConfig>,
}

/// One clock described in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    pub name: String,

    /// Tick size in seconds
    #[serde(default)]
    pub tick_size: Option<f64>,

    /// Tick rate in Hz, alternative to `tick_size`
    #[serde(default)]
    pub frequency: Option<f64>,

    #[serde(default)]
    pub modifier: Option<ModifierConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModifierConfig {
    pub kind: ModifierKind,
    pub value: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { core_tick_size: None, max_catch_up: DEFAULT_MAX_CATCH_UP, clocks: Vec::new() }
    }
}

impl EngineConfig {
    /// Validate every field, including each configured clock
    pub fn validate(&self) -> Result<(), ClockError> {
        if let Some(size) = self.core_tick_size {
            if !(size.is_finite() && size > 0.0) {
                return Err(ClockError::Config(format!("core_tick_size must be positive, got {size}")));
            }
        }
        if self.max_catch_up == 0 {
            return Err(ClockError::Config("max_catch_up must be at least 1".to_string()));
        }

        let mut seen = HashSet::new();
        for clock in &self.clocks {
            clock.validate()?;
            if clock.name == CORE_CLOCK_NAME {
                return Err(ClockError::Config(format!("clock name '{CORE_CLOCK_NAME}' is reserved")));
            }
            if !seen.insert(clock.name.as_str()) {
                return Err(ClockError::Config(format!("duplicate clock name '{}'", clock.name)));
            }
        }
        Ok(())
    }

    /// Tick mode and size of the reference clock
    pub fn core_tick(&self) -> (TickMode, f64) {
        match self.core_tick_size {
            Some(size) => (TickMode::Fixed, size),
            None => (TickMode::Variable, 0.0),
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ClockError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClockError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ClockError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl ClockConfig {
    pub fn fixed(name: impl Into<String>, tick_size: f64) -> Self {
        Self { name: name.into(), tick_size: Some(tick_size), frequency: None, modifier: None }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self { name: name.into(), tick_size: None, frequency: None, modifier: None }
    }

    pub fn with_modifier(mut self, kind: ModifierKind, value: f64) -> Self {
        self.modifier = Some(ModifierConfig { kind, value });
        self
    }

    pub fn validate(&self) -> Result<(), ClockError> {
        if self.name.trim().is_empty() {
            return Err(ClockError::Config("clock name must not be empty".to_string()));
        }
        if self.tick_size.is_some() && self.frequency.is_some() {
            return Err(ClockError::Config(format!(
                "clock '{}' sets both tick_size and frequency",
                self.name
            )));
        }
        if let Some(hz) = self.frequency {
            if !(hz.is_finite() && hz > 0.0) {
                return Err(ClockError::Config(format!(
                    "clock '{}' frequency must be positive, got {hz}",
                    self.name
                )));
            }
        }
        if let (TickMode::Fixed, size) = self.tick() {
            validate_tick_size(size)?;
        }
        if let Some(modifier) = self.modifier {
            modifier.to_modifier()?;
        }
        Ok(())
    }

    /// Resolved tick mode and tick size in seconds
    pub fn tick(&self) -> (TickMode, f64) {
        match (self.tick_size, self.frequency) {
            (Some(size), _) => (TickMode::Fixed, size),
            (None, Some(hz)) => (TickMode::Fixed, 1.0 / hz),
            (None, None) => (TickMode::Variable, 0.0),
        }
    }
}

impl ModifierConfig {
    pub fn to_modifier(self) -> Result<Modifier, ClockError> {
        Modifier::new(self.kind, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_catch_up, DEFAULT_MAX_CATCH_UP);
        assert_eq!(config.core_tick(), (TickMode::Variable, 0.0));
    }

    #[test]
    fn test_parse_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            core_tick_size = 0.01
            max_catch_up = 4

            [[clocks]]
            name = "physics"
            frequency = 50.0

            [[clocks]]
            name = "ui"
            modifier = { kind = "maxed", value = 0.1 }
            "#,
        )
        .unwrap();

        assert_eq!(config.core_tick(), (TickMode::Fixed, 0.01));
        assert_eq!(config.max_catch_up, 4);
        assert_eq!(config.clocks.len(), 2);

        let (mode, tick) = config.clocks[0].tick();
        assert_eq!(mode, TickMode::Fixed);
        assert!((tick - 0.02).abs() < 1e-12);

        assert_eq!(config.clocks[1].tick(), (TickMode::Variable, 0.0));
        assert_eq!(
            config.clocks[1].modifier,
            Some(ModifierConfig { kind: ModifierKind::Maxed, value: 0.1 })
        );
    }

    #[test]
    fn test_rejects_invalid_configs() {
        let both = ClockConfig { frequency: Some(60.0), ..ClockConfig::fixed("a", 0.1) };
        assert!(both.validate().is_err());

        assert!(ClockConfig::fixed("a", 0.0).validate().is_err());
        let subnormal = ClockConfig { frequency: Some(f64::MIN_POSITIVE / 4.0), ..ClockConfig::variable("a") };
        assert_eq!(subnormal.validate().unwrap_err().kind(), crate::ErrorKind::InvalidArgument);
        assert!(ClockConfig::variable("").validate().is_err());
        assert!(ClockConfig::variable("a").with_modifier(ModifierKind::Multiply, -2.0).validate().is_err());

        let reserved = EngineConfig { clocks: vec![ClockConfig::variable(CORE_CLOCK_NAME)], ..Default::default() };
        assert!(reserved.validate().is_err());

        let duplicate = EngineConfig {
            clocks: vec![ClockConfig::variable("a"), ClockConfig::fixed("a", 0.5)],
            ..Default::default()
        };
        assert!(duplicate.validate().is_err());

        let no_cap = EngineConfig { max_catch_up: 0, ..Default::default() };
        assert_eq!(no_cap.validate().unwrap_err().kind(), crate::ErrorKind::Config);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clocks.toml");

        let config = EngineConfig {
            core_tick_size: Some(0.016),
            max_catch_up: 3,
            clocks: vec![ClockConfig::fixed("sim", 0.05).with_modifier(ModifierKind::Average, 4.0)],
        };
        config.to_file(&path).unwrap();
        assert_eq!(EngineConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = EngineConfig::from_file("/nonexistent/clocks.toml").unwrap_err();
        assert!(matches!(err, ClockError::Config(_)));
    }
}
