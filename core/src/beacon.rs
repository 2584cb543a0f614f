//! Beacons and their signal fields.
//!
//! A beacon's field is computed once, at spawn, by a breadth-first
//! wavefront through floor tiles. Walls stop the wave completely; there
//! is no line-of-sight involved. What bots actually sense each tick is
//! the *observed* field: the stored one after optional jitter and the
//! fade envelope.

use crate::{config::ArenaConfig, grid::Grid, rng::ArenaRng, types::Tile};
use std::collections::{btree_map::Entry, BTreeMap};

/// Per-tile signal levels in `[0, 1]`, keyed in `Tile` order so that
/// jitter draws happen in a stable sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeaconField {
    levels: BTreeMap<Tile, f64>,
}

impl BeaconField {
    /// Diffuse from `origin` over 4-connected floor tiles.
    ///
    /// Ring `d` gets `exp(-d / decay_radius)`, then quantized to
    /// `floor(level * steps) / steps` when `steps > 0`, then snapped to 0
    /// below `cutoff`. The origin is exactly 1.0. First arrival wins, so
    /// each tile is assigned once. Unreachable tiles are absent.
    pub fn diffuse(
        grid: &Grid,
        origin: Tile,
        decay_radius: f64,
        quantization_steps: u32,
        cutoff: f64,
    ) -> Self {
        let mut levels = BTreeMap::new();
        if !grid.is_floor(origin) {
            return Self { levels };
        }
        levels.insert(origin, 1.0);

        let mut wavefront = vec![origin];
        let mut distance: u32 = 0;
        while !wavefront.is_empty() {
            distance += 1;
            let level = ring_level(distance, decay_radius, quantization_steps, cutoff);
            let mut next = Vec::new();
            for &p in &wavefront {
                for n in grid.open_neighbors(p) {
                    if let Entry::Vacant(slot) = levels.entry(n) {
                        slot.insert(level);
                        next.push(n);
                    }
                }
            }
            wavefront = next;
        }
        Self { levels }
    }

    pub fn level_at(&self, tile: Tile) -> Option<f64> {
        self.levels.get(&tile).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tile, f64)> + '_ {
        self.levels.iter().map(|(t, l)| (*t, *l))
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    fn map(&self, mut f: impl FnMut(f64) -> f64) -> Self {
        Self {
            levels: self.levels.iter().map(|(t, l)| (*t, f(*l))).collect(),
        }
    }
}

fn ring_level(distance: u32, decay_radius: f64, steps: u32, cutoff: f64) -> f64 {
    let mut level = (-(distance as f64) / decay_radius).exp();
    if steps > 0 {
        level = (level * steps as f64).floor() / steps as f64;
    }
    if level < cutoff {
        level = 0.0;
    }
    level.clamp(0.0, 1.0)
}

/// Fade envelope: ramps in over the first `fade` ticks of a beacon's life
/// and out over the last `fade`. 1.0 in between, or when `fade == 0`.
pub fn fade_factor(beacon_ttl: u64, ttl: u64, fade: u64) -> f64 {
    if fade == 0 {
        return 1.0;
    }
    let age = beacon_ttl.saturating_sub(ttl);
    let t = if age < fade {
        (age + 1) as f64 / fade as f64
    } else if age >= beacon_ttl.saturating_sub(fade) {
        beacon_ttl.saturating_sub(age) as f64 / fade as f64
    } else {
        1.0
    };
    t.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Beacon {
    pub position: Tile,
    pub ttl: u64,
    pub field: BeaconField,
}

impl Beacon {
    pub fn spawn(grid: &Grid, position: Tile, config: &ArenaConfig) -> Self {
        Self {
            position,
            ttl: config.beacon_ttl,
            field: BeaconField::diffuse(
                grid,
                position,
                config.beacon_radius,
                config.beacon_quantization,
                config.beacon_cutoff,
            ),
        }
    }

    /// The field as bots sense it this tick.
    ///
    /// Draws one jitter sample per tile (in tile order) when noise is on;
    /// draws nothing otherwise.
    pub fn observe(&self, config: &ArenaConfig, rng: &mut ArenaRng) -> BeaconField {
        let mut observed = if config.beacon_noise > 0.0 {
            self.field
                .map(|l| (l + rng.jitter(config.beacon_noise)).clamp(0.0, 1.0))
        } else {
            self.field.clone()
        };
        let t = fade_factor(config.beacon_ttl, self.ttl, config.beacon_fade);
        if t < 1.0 {
            observed = observed.map(|l| l * t);
        }
        observed
    }
}
