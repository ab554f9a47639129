// src/controller/features.rs
//! Logging feature toggles

use crate::utils::config::FeatureDefaults;
use crate::utils::errors::{Result, TelemetryError};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Toggleable logging feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Positions,
    Deaths,
    Spawns,
    Wool,

    /// Every feature at once
    All,
}

impl Feature {
    pub const INDIVIDUAL: [Feature; 4] = [
        Feature::Positions,
        Feature::Deaths,
        Feature::Spawns,
        Feature::Wool,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Positions => "positions",
            Feature::Deaths => "deaths",
            Feature::Spawns => "spawns",
            Feature::Wool => "wool",
            Feature::All => "all",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positions" | "pos" => Ok(Feature::Positions),
            "deaths" | "death" => Ok(Feature::Deaths),
            "spawns" | "spawn" => Ok(Feature::Spawns),
            "wool" | "wools" => Ok(Feature::Wool),
            "all" => Ok(Feature::All),
            other => Err(TelemetryError::Configuration(format!(
                "Unknown feature '{}' (expected positions, deaths, spawns, wool or all)",
                other
            ))),
        }
    }
}

/// Point-in-time toggle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureState {
    pub positions: bool,
    pub deaths: bool,
    pub spawns: bool,
    pub wool: bool,
}

impl FeatureState {
    pub fn get(&self, feature: Feature) -> bool {
        match feature {
            Feature::Positions => self.positions,
            Feature::Deaths => self.deaths,
            Feature::Spawns => self.spawns,
            Feature::Wool => self.wool,
            Feature::All => self.positions && self.deaths && self.spawns && self.wool,
        }
    }
}

/// Independent on/off switches, safe to flip from any thread
#[derive(Debug)]
pub struct FeatureToggles {
    positions: AtomicBool,
    deaths: AtomicBool,
    spawns: AtomicBool,
    wool: AtomicBool,
}

impl FeatureToggles {
    pub fn new(defaults: FeatureDefaults) -> Self {
        Self {
            positions: AtomicBool::new(defaults.positions),
            deaths: AtomicBool::new(defaults.deaths),
            spawns: AtomicBool::new(defaults.spawns),
            wool: AtomicBool::new(defaults.wool),
        }
    }

    fn flag(&self, feature: Feature) -> Option<&AtomicBool> {
        match feature {
            Feature::Positions => Some(&self.positions),
            Feature::Deaths => Some(&self.deaths),
            Feature::Spawns => Some(&self.spawns),
            Feature::Wool => Some(&self.wool),
            Feature::All => None,
        }
    }

    /// `All` is enabled only when every feature is
    pub fn is_enabled(&self, feature: Feature) -> bool {
        match self.flag(feature) {
            Some(flag) => flag.load(Ordering::Relaxed),
            None => self.state().get(Feature::All),
        }
    }

    pub fn set_enabled(&self, feature: Feature, enabled: bool) {
        match self.flag(feature) {
            Some(flag) => flag.store(enabled, Ordering::Relaxed),
            None => {
                for feature in Feature::INDIVIDUAL {
                    self.set_enabled(feature, enabled);
                }
            }
        }
    }

    /// Flip a feature and return its new state.
    ///
    /// `All` turns everything off when everything is on, otherwise turns
    /// everything on.
    pub fn toggle(&self, feature: Feature) -> bool {
        match self.flag(feature) {
            Some(flag) => !flag.fetch_xor(true, Ordering::Relaxed),
            None => {
                let enabled = !self.is_enabled(Feature::All);
                self.set_enabled(Feature::All, enabled);
                enabled
            }
        }
    }

    pub fn state(&self) -> FeatureState {
        FeatureState {
            positions: self.positions.load(Ordering::Relaxed),
            deaths: self.deaths.load(Ordering::Relaxed),
            spawns: self.spawns.load(Ordering::Relaxed),
            wool: self.wool.load(Ordering::Relaxed),
        }
    }
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self::new(FeatureDefaults::default())
    }
}
