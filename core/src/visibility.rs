//! Precomputed visibility for every floor tile of a grid.
//!
//! Built once per (grid, radius) and shared read-only for the round.
//! Floor-to-floor sight is reciprocal: the raw angular test can see A→B
//! while missing B→A, so after the per-origin pass every floor pair seen
//! in either direction is recorded in both.

use crate::{
    error::{SimError, SimResult},
    fov,
    grid::Grid,
    types::Tile,
};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityIndex {
    radius: i32,
    entries: HashMap<Tile, Vec<Tile>>,
}

impl VisibilityIndex {
    pub fn build(grid: &Grid, radius: i32) -> Self {
        let mut sets: HashMap<Tile, BTreeSet<Tile>> = grid
            .floor_tiles()
            .into_iter()
            .map(|origin| (origin, fov::visible(grid, origin, radius, |t| grid.is_wall(t))))
            .collect();

        let mut reverse: Vec<(Tile, Tile)> = Vec::new();
        for (&a, seen) in &sets {
            for &b in seen {
                if b != a && grid.is_floor(b) {
                    reverse.push((b, a));
                }
            }
        }
        for (from, to) in reverse {
            if let Some(set) = sets.get_mut(&from) {
                set.insert(to);
            }
        }

        let entries = sets
            .into_iter()
            .map(|(origin, set)| (origin, set.into_iter().collect()))
            .collect();
        log::debug!("visibility index built: radius={radius} origins={}", grid.floor_tiles().len());
        Self { radius, entries }
    }

    /// Rebuild from stored entries, rejecting anything that does not fit
    /// `grid`: a missing floor origin, an origin that is not floor, an
    /// out-of-bounds tile, or a list that omits its own origin.
    pub fn from_entries(
        grid: &Grid,
        radius: i32,
        entries: HashMap<Tile, Vec<Tile>>,
    ) -> SimResult<Self> {
        let corrupt = |msg: String| Err(SimError::CorruptCache(msg));

        let floor = grid.floor_tiles();
        if entries.len() != floor.len() {
            return corrupt(format!(
                "index has {} origins, grid has {} floor tiles",
                entries.len(),
                floor.len()
            ));
        }
        let mut sorted = HashMap::with_capacity(entries.len());
        for (origin, mut seen) in entries {
            if !grid.is_floor(origin) {
                return corrupt(format!("origin {origin} is not a floor tile"));
            }
            if let Some(bad) = seen.iter().find(|t| !grid.in_bounds(**t)) {
                return corrupt(format!("tile {bad} seen from {origin} is out of bounds"));
            }
            seen.sort_unstable();
            seen.dedup();
            if seen.binary_search(&origin).is_err() {
                return corrupt(format!("origin {origin} missing from its own visible set"));
            }
            sorted.insert(origin, seen);
        }
        Ok(Self { radius, entries: sorted })
    }

    pub fn radius(&self) -> i32 {
        self.radius
    }

    /// Tiles visible from `origin`, sorted. Empty for walls and
    /// out-of-bounds tiles.
    pub fn visible_from(&self, origin: Tile) -> &[Tile] {
        self.entries.get(&origin).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn can_see(&self, from: Tile, to: Tile) -> bool {
        self.visible_from(from).binary_search(&to).is_ok()
    }

    pub fn origins(&self) -> impl Iterator<Item = (&Tile, &Vec<Tile>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
