//! Round configuration.
//!
//! Every parameter the engine, the beacon lifecycle and the bot
//! protocol read lives here. `validate()` runs at setup, before the
//! maze generator or any bot process is started.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Generator kinds the external maze generator understands.
pub const GENERATORS: &[&str] = &[
    "arena", "divided", "eller", "icey", "cellular", "uniform", "digger", "rogue",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArenaConfig {
    pub width: usize,
    pub height: usize,
    pub generator: String,
    pub seed: u64,
    pub max_ticks: u64,
    pub vis_radius: i32,
    pub max_beacons: usize,
    /// Probability per tick that a beacon spawns.
    pub beacon_spawn: f64,
    pub beacon_ttl: u64,
    /// Decay radius of the beacon field.
    pub beacon_radius: f64,
    pub beacon_cutoff: f64,
    pub beacon_noise: f64,
    /// Number of discrete level buckets; 0 disables quantization.
    pub beacon_quantization: u32,
    /// Ticks of linear fade-in and fade-out; 0 disables the envelope.
    pub beacon_fade: u64,
    pub swap_bots: bool,
    pub cache: bool,
    pub rounds: usize,
    pub profile: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 19,
            height: 19,
            generator: "cellular".into(),
            seed: 0,
            max_ticks: 1000,
            vis_radius: 5,
            max_beacons: 1,
            beacon_spawn: 0.05,
            beacon_ttl: 300,
            beacon_radius: 10.0,
            beacon_cutoff: 0.0,
            beacon_noise: 0.0,
            beacon_quantization: 0,
            beacon_fade: 0,
            swap_bots: false,
            cache: false,
            rounds: 1,
            profile: false,
        }
    }
}

impl ArenaConfig {
    /// Load from a JSON file. Fields missing from the file take defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: ArenaConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Small, busy arena for unit and integration tests.
    pub fn default_test() -> Self {
        Self {
            width: 9,
            height: 9,
            seed: 42,
            max_ticks: 50,
            vis_radius: 4,
            max_beacons: 2,
            beacon_spawn: 0.5,
            beacon_ttl: 20,
            beacon_radius: 4.0,
            ..Self::default()
        }
    }

    /// Reject configurations the engine cannot run.
    pub fn validate(&self) -> SimResult<()> {
        let fail = |msg: String| Err(SimError::Config(msg));

        if self.width == 0 || self.height == 0 {
            return fail(format!("arena must be at least 1x1, got {}x{}", self.width, self.height));
        }
        if self.width > i32::MAX as usize || self.height > i32::MAX as usize {
            return fail(format!("arena {}x{} is too large", self.width, self.height));
        }
        if !GENERATORS.contains(&self.generator.as_str()) {
            return fail(format!(
                "unknown generator '{}' (expected one of: {})",
                self.generator,
                GENERATORS.join(", ")
            ));
        }
        if self.max_ticks == 0 {
            return fail("max_ticks must be at least 1".into());
        }
        if self.vis_radius < 0 {
            return fail(format!("vis_radius must not be negative, got {}", self.vis_radius));
        }
        if !self.beacon_radius.is_finite() || self.beacon_radius <= 0.0 {
            return fail(format!("beacon_radius must be positive, got {}", self.beacon_radius));
        }
        if !(0.0..=1.0).contains(&self.beacon_spawn) {
            return fail(format!("beacon_spawn must be in [0, 1], got {}", self.beacon_spawn));
        }
        if !(0.0..=1.0).contains(&self.beacon_cutoff) {
            return fail(format!("beacon_cutoff must be in [0, 1], got {}", self.beacon_cutoff));
        }
        if !(0.0..=1.0).contains(&self.beacon_noise) {
            return fail(format!("beacon_noise must be in [0, 1], got {}", self.beacon_noise));
        }
        if self.beacon_ttl == 0 {
            return fail("beacon_ttl must be at least 1".into());
        }
        if self.rounds == 0 {
            return fail("rounds must be at least 1".into());
        }
        Ok(())
    }
}
