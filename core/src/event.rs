//! The round timeline: every observable state change, in order.
//!
//! RULE: two rounds with the same grid, seed and bot responses produce
//! byte-identical serialized timelines. The determinism tests compare
//! exactly that.

use crate::types::{BotIndex, Tick, Tile};
use serde::{Deserialize, Serialize};

/// Every event emitted during a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Engine events ──────────────────────────────
    RoundInitialized {
        seed: u64,
        grid_hash: String,
        spawn_points: Vec<Tile>,
    },
    TickStarted {
        tick: Tick,
    },
    TickCompleted {
        tick: Tick,
    },

    // ── Bot events ─────────────────────────────────
    BotMoved {
        tick: Tick,
        bot: BotIndex,
        from: Tile,
        to: Tile,
    },
    BotBlocked {
        tick: Tick,
        bot: BotIndex,
        at: Tile,
    },
    InvalidCommand {
        tick: Tick,
        bot: BotIndex,
        line: String,
    },

    // ── Beacon events ──────────────────────────────
    BeaconSpawned {
        tick: Tick,
        position: Tile,
        ttl: u64,
    },
    BeaconCaptured {
        tick: Tick,
        bot: BotIndex,
        position: Tile,
        reward: u64,
    },
    BeaconExpired {
        tick: Tick,
        position: Tile,
    },
}

impl SimEvent {
    /// Stable short name, used in log lines.
    pub fn type_name(&self) -> &'static str {
        match self {
            SimEvent::RoundInitialized { .. } => "round_initialized",
            SimEvent::TickStarted { .. }      => "tick_started",
            SimEvent::TickCompleted { .. }    => "tick_completed",
            SimEvent::BotMoved { .. }         => "bot_moved",
            SimEvent::BotBlocked { .. }       => "bot_blocked",
            SimEvent::InvalidCommand { .. }   => "invalid_command",
            SimEvent::BeaconSpawned { .. }    => "beacon_spawned",
            SimEvent::BeaconCaptured { .. }   => "beacon_captured",
            SimEvent::BeaconExpired { .. }    => "beacon_expired",
        }
    }
}
