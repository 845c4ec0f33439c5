//! Engine configuration
//!
//! ```ignore
//! max_shipsets = 3
//! max_cascade_steps = 1024
//!
//! [kill]
//! enter_delay = 200
//!
//! [[ships]]
//! initial_bounty = 10
//! ```

use std::path::Path;

use hull_core::Ship;
use serde::Deserialize;

use crate::error::ConfigError;

/// Kill settings of the arena
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KillConfig {
    /// Ticks before a killed player re-enters
    pub enter_delay: i32,
}

/// Per-ship settings, indexed by ship
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShipConfig {
    /// Bounty floor of the ship
    pub initial_bounty: i32,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of shipsets per ship
    pub max_shipsets: u8,
    /// Bound on work processed by one public call
    pub max_cascade_steps: usize,
    pub kill: KillConfig,
    /// Up to one entry per ship; missing ships use defaults
    pub ships: Vec<ShipConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_shipsets: 3,
            max_cascade_steps: 1024,
            kill: KillConfig::default(),
            ships: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_shipsets == 0 {
            return Err(ConfigError::Invalid("max_shipsets must be at least 1".into()));
        }
        if self.max_cascade_steps == 0 {
            return Err(ConfigError::Invalid("max_cascade_steps must be at least 1".into()));
        }
        if self.ships.len() > Ship::COUNT {
            return Err(ConfigError::Invalid(format!(
                "{} ship entries given, at most {} allowed",
                self.ships.len(),
                Ship::COUNT
            )));
        }
        Ok(())
    }

    pub fn with_enter_delay(mut self, ticks: i32) -> Self {
        self.kill.enter_delay = ticks;
        self
    }

    pub fn with_max_cascade_steps(mut self, steps: usize) -> Self {
        self.max_cascade_steps = steps;
        self
    }

    pub fn with_initial_bounty(mut self, ship: Ship, bounty: i32) -> Self {
        if self.ships.len() <= ship.index() {
            self.ships.resize(ship.index() + 1, ShipConfig::default());
        }
        self.ships[ship.index()].initial_bounty = bounty;
        self
    }

    /// Bounty floor of a ship
    pub fn initial_bounty(&self, ship: Ship) -> i32 {
        self.ships.get(ship.index()).map_or(0, |s| s.initial_bounty)
    }

    /// Delay before a scheduled ship reset fires
    pub fn ship_reset_delay(&self) -> u32 {
        self.kill.enter_delay.saturating_sub(50).max(1) as u32
    }
}
