//! Engine ⇄ bot wire format: one JSON object per line in each direction.
//!
//! Engine→bot is the typed `Observation`. Bot→engine is a single line
//! whose first whitespace-delimited token is a command; anything that
//! does not parse is a no-op for that tick.

use crate::{
    config::ArenaConfig,
    error::SimResult,
    rng::derive_seed,
    types::{Direction, Tick, Tile},
};
use serde::{Deserialize, Serialize};

/// Bumped whenever a field is added, renamed or retyped.
pub const PROTOCOL_VERSION: u32 = 1;

/// Round parameters, sent once with the tick-0 observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigBlock {
    pub protocol: u32,
    pub width: usize,
    pub height: usize,
    pub generator: String,
    pub max_ticks: u64,
    pub vis_radius: i32,
    pub max_beacons: usize,
    pub beacon_spawn: f64,
    pub beacon_ttl: u64,
    pub beacon_radius: f64,
    pub beacon_cutoff: f64,
    pub beacon_noise: f64,
    pub beacon_quantization: u32,
    pub beacon_fade: u64,
    pub bot_seed: u32,
}

impl ConfigBlock {
    pub fn from_config(config: &ArenaConfig) -> Self {
        Self {
            protocol: PROTOCOL_VERSION,
            width: config.width,
            height: config.height,
            generator: config.generator.clone(),
            max_ticks: config.max_ticks,
            vis_radius: config.vis_radius,
            max_beacons: config.max_beacons,
            beacon_spawn: config.beacon_spawn,
            beacon_ttl: config.beacon_ttl,
            beacon_radius: config.beacon_radius,
            beacon_cutoff: config.beacon_cutoff,
            beacon_noise: config.beacon_noise,
            beacon_quantization: config.beacon_quantization,
            beacon_fade: config.beacon_fade,
            bot_seed: derive_seed(config.seed, "bot"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibleBeacon {
    pub position: Tile,
    pub ttl: u64,
}

/// What one bot is told at the start of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigBlock>,
    pub tick: Tick,
    pub bot: Tile,
    pub wall: Vec<Tile>,
    pub floor: Vec<Tile>,
    pub initiative: bool,
    pub visible_beacons: Vec<VisibleBeacon>,
    /// Sum of observed beacon levels at the bot's tile, rounded to 6 decimals.
    pub beacon_level: f64,
}

impl Observation {
    /// Serialize as one newline-free JSON line.
    pub fn to_line(&self) -> SimResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotCommand {
    Move(Direction),
    Wait,
}

impl BotCommand {
    /// Parse a response line. `None` means the line carried no valid
    /// command and the bot stays put.
    pub fn parse(line: &str) -> Option<Self> {
        match line.split_whitespace().next()? {
            "N" => Some(Self::Move(Direction::N)),
            "S" => Some(Self::Move(Direction::S)),
            "E" => Some(Self::Move(Direction::E)),
            "W" => Some(Self::Move(Direction::W)),
            "WAIT" => Some(Self::Wait),
            _ => None,
        }
    }
}

pub fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_token_only() {
        assert_eq!(BotCommand::parse("N"), Some(BotCommand::Move(Direction::N)));
        assert_eq!(BotCommand::parse("  W because beacon\n"), Some(BotCommand::Move(Direction::W)));
        assert_eq!(BotCommand::parse("WAIT"), Some(BotCommand::Wait));
    }

    #[test]
    fn garbage_is_not_a_command() {
        for line in ["", "   ", "n", "NORTH", "{\"move\":\"N\"}", "WAIT!"] {
            assert_eq!(BotCommand::parse(line), None, "{line:?} should not parse");
        }
    }

    #[test]
    fn config_block_only_when_present() {
        let mut obs = Observation {
            config: None,
            tick: 3,
            bot: Tile::new(1, 2),
            wall: vec![Tile::new(0, 2)],
            floor: vec![Tile::new(1, 2)],
            initiative: true,
            visible_beacons: vec![VisibleBeacon { position: Tile::new(1, 1), ttl: 7 }],
            beacon_level: 0.5,
        };
        let v: serde_json::Value = serde_json::from_str(&obs.to_line().unwrap()).unwrap();
        assert!(v.get("config").is_none());
        assert_eq!(v["bot"], serde_json::json!([1, 2]));
        assert_eq!(v["visible_beacons"][0]["position"], serde_json::json!([1, 1]));
        assert_eq!(v["visible_beacons"][0]["ttl"], 7);

        obs.config = Some(ConfigBlock::from_config(&ArenaConfig::default_test()));
        let v: serde_json::Value = serde_json::from_str(&obs.to_line().unwrap()).unwrap();
        assert_eq!(v["config"]["protocol"], PROTOCOL_VERSION);
        assert_eq!(v["config"]["width"], 9);
        assert!(v["config"]["bot_seed"].is_u64());
    }

    #[test]
    fn bot_seed_depends_only_on_round_seed() {
        let a = ConfigBlock::from_config(&ArenaConfig { seed: 5, ..ArenaConfig::default() });
        let b = ConfigBlock::from_config(&ArenaConfig { seed: 5, width: 40, ..ArenaConfig::default() });
        let c = ConfigBlock::from_config(&ArenaConfig { seed: 6, ..ArenaConfig::default() });
        assert_eq!(a.bot_seed, b.bot_seed);
        assert_ne!(a.bot_seed, c.bot_seed);
    }

    #[test]
    fn rounds_to_six_decimals() {
        assert_eq!(round6(0.123_456_789), 0.123_457);
        assert_eq!(round6(1.5), 1.5);
        assert_eq!(round6(0.0), 0.0);
    }
}
