//! Mutable per-round state: bots, beacons, revealed tiles, counters.
//!
//! Lists are never index-deleted while iterating; removals are
//! `retain` passes with an explicit keep predicate.

use crate::{
    beacon::Beacon,
    clock::SimClock,
    grid::Grid,
    types::{BotIndex, Direction, Tick, Tile},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bot {
    pub position: Tile,
    pub score: u64,
}

/// A beacon removed because a bot stood on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    pub bot: BotIndex,
    pub position: Tile,
    pub reward: u64,
}

#[derive(Debug, Clone)]
pub struct SimulationState {
    pub clock: SimClock,
    pub bots: Vec<Bot>,
    pub beacons: Vec<Beacon>,
    /// Every tile bot 0 has had in view at the start of some tick.
    pub revealed: HashSet<Tile>,
    pub first_capture: Option<Tick>,
    /// Sum of the ttl of every beacon ever spawned.
    pub spawned_ttl: u64,
}

impl SimulationState {
    pub fn new(max_ticks: Tick) -> Self {
        Self {
            clock: SimClock::new(max_ticks),
            bots: Vec::new(),
            beacons: Vec::new(),
            revealed: HashSet::new(),
            first_capture: None,
            spawned_ttl: 0,
        }
    }

    pub fn tick(&self) -> Tick {
        self.clock.current_tick
    }

    /// The bot whose captures resolve first this tick. Alternates every
    /// tick; `swapped` shifts the alternation by one.
    pub fn initiative(&self, swapped: bool) -> BotIndex {
        if self.bots.is_empty() {
            return 0;
        }
        ((self.tick() + swapped as u64) % self.bots.len() as u64) as BotIndex
    }

    pub fn is_occupied(&self, tile: Tile) -> bool {
        self.bots.iter().any(|b| b.position == tile) || self.beacons.iter().any(|b| b.position == tile)
    }

    /// Move bot `i` one step if the destination is in bounds and floor.
    /// Returns `(from, to)` on success, `None` when blocked.
    pub fn try_move(&mut self, i: BotIndex, dir: Direction, grid: &Grid) -> Option<(Tile, Tile)> {
        let bot = self.bots.get_mut(i)?;
        let from = bot.position;
        let to = from.step(dir);
        if !grid.is_floor(to) {
            return None;
        }
        bot.position = to;
        Some((from, to))
    }

    /// Each beacon goes to the first bot standing on it, scanning from
    /// `first` onward. A captured beacon is removed immediately, so it
    /// can never pay out twice.
    pub fn resolve_captures(&mut self, first: BotIndex) -> Vec<Capture> {
        let n = self.bots.len();
        let order: Vec<BotIndex> = (0..n).map(|k| (k + first) % n).collect();
        let bots = &mut self.bots;
        let mut captures = Vec::new();
        self.beacons.retain(|beacon| {
            match order.iter().copied().find(|&k| bots[k].position == beacon.position) {
                Some(k) => {
                    bots[k].score += beacon.ttl;
                    captures.push(Capture { bot: k, position: beacon.position, reward: beacon.ttl });
                    false
                }
                None => true,
            }
        });
        if !captures.is_empty() && self.first_capture.is_none() {
            self.first_capture = Some(self.tick());
        }
        captures
    }

    /// Decrement every beacon's ttl and drop the ones that hit zero.
    /// Returns the positions of expired beacons.
    pub fn age_beacons(&mut self) -> Vec<Tile> {
        let mut expired = Vec::new();
        self.beacons.retain_mut(|beacon| {
            beacon.ttl = beacon.ttl.saturating_sub(1);
            if beacon.ttl == 0 {
                expired.push(beacon.position);
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn add_beacon(&mut self, beacon: Beacon) {
        self.spawned_ttl += beacon.ttl;
        self.beacons.push(beacon);
    }

    pub fn reveal(&mut self, tiles: &[Tile]) {
        self.revealed.extend(tiles.iter().copied());
    }
}
