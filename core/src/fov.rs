//! Angular-occlusion field of view.
//!
//! Every tile is treated as a unit square. Seen from the origin, a tile
//! subtends an angular interval; it is visible unless nearer opaque
//! tiles already cover that whole interval. Candidates are classified
//! ring by ring (exact squared distance), and a ring's opaque tiles only
//! start blocking once the whole ring has been classified, so tiles at
//! equal distance never hide each other.

use crate::{grid::Grid, types::Tile};
use std::collections::BTreeSet;
use std::f64::consts::TAU;

/// Merge/cover tolerance against floating-point jitter.
pub const EPS: f64 = 1e-12;

/// Compute the set of tiles visible from `origin` within a Euclidean
/// `radius` (strict: squared distance `< radius²`).
///
/// `is_opaque` is queried for visible candidates only and must be pure.
/// An out-of-bounds origin sees nothing; a non-positive radius sees only
/// the origin.
pub fn visible<F>(grid: &Grid, origin: Tile, radius: i32, is_opaque: F) -> BTreeSet<Tile>
where
    F: Fn(Tile) -> bool,
{
    let mut vis = BTreeSet::new();
    if !grid.in_bounds(origin) {
        return vis;
    }
    vis.insert(origin);
    if radius <= 0 {
        return vis;
    }

    let w = grid.width() as i32;
    let h = grid.height() as i32;
    let r2 = radius as i64 * radius as i64;

    let min_dx = -origin.x.min(radius);
    let max_dx = (w - 1 - origin.x).min(radius);
    let min_dy = -origin.y.min(radius);
    let max_dy = (h - 1 - origin.y).min(radius);

    let mut cells: Vec<(i32, i32, i64)> = Vec::new();
    for dy in min_dy..=max_dy {
        for dx in min_dx..=max_dx {
            if dx == 0 && dy == 0 {
                continue;
            }
            let d2 = dx as i64 * dx as i64 + dy as i64 * dy as i64;
            if d2 < r2 {
                cells.push((dx, dy, d2));
            }
        }
    }
    cells.sort_by_key(|&(_, _, d2)| d2);

    let mut blocked = AngleUnion::new();
    let mut pending: Vec<(f64, f64)> = Vec::new();

    for ring in cells.chunk_by(|a, b| a.2 == b.2) {
        for &(dx, dy, _) in ring {
            let tile = origin.offset(dx, dy);
            let spans = tile_spans(dx, dy);
            if spans.iter().any(|&(s, e)| !blocked.covered(s, e)) {
                vis.insert(tile);
                if is_opaque(tile) {
                    pending.extend_from_slice(&spans);
                }
            }
        }
        for (s, e) in pending.drain(..) {
            blocked.add(s, e);
        }
    }

    vis
}

/// Angular coverage of the tile centred at `(dx, dy)`: one interval, or
/// two when it straddles angle 0. Intervals never wrap.
pub fn tile_spans(dx: i32, dy: i32) -> Vec<(f64, f64)> {
    let (fx, fy) = (dx as f64, dy as f64);
    let mut ang = [
        norm_angle((fy - 0.5).atan2(fx - 0.5)),
        norm_angle((fy - 0.5).atan2(fx + 0.5)),
        norm_angle((fy + 0.5).atan2(fx + 0.5)),
        norm_angle((fy + 0.5).atan2(fx - 0.5)),
    ];
    ang.sort_by(f64::total_cmp);

    // The tile covers everything except the largest gap between corners.
    let mut imax = 0;
    let mut best = f64::NEG_INFINITY;
    for i in 0..4 {
        let mut gap = ang[(i + 1) % 4] - ang[i];
        if gap < 0.0 {
            gap += TAU;
        }
        if gap > best {
            best = gap;
            imax = i;
        }
    }
    let start = ang[(imax + 1) % 4];
    let mut finish = ang[imax];
    if finish < start {
        finish += TAU;
    }
    if finish >= TAU {
        vec![(start, TAU), (0.0, finish - TAU)]
    } else {
        vec![(start, finish)]
    }
}

pub fn norm_angle(a: f64) -> f64 {
    let a = a.rem_euclid(TAU);
    if a >= TAU { 0.0 } else { a }
}

/// Union of disjoint angular intervals on `[0, TAU)`, kept sorted by start.
#[derive(Debug, Default, Clone)]
pub struct AngleUnion {
    iv: Vec<(f64, f64)>,
}

impl AngleUnion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intervals(&self) -> &[(f64, f64)] {
        &self.iv
    }

    /// Add a non-wrapping interval, merging anything it touches.
    pub fn add(&mut self, s: f64, e: f64) {
        let mut i = 0;
        while i < self.iv.len() && self.iv[i].1 < s - EPS {
            i += 1;
        }
        let (mut ns, mut ne) = (s, e);
        while i < self.iv.len() && self.iv[i].0 <= ne + EPS {
            ns = ns.min(self.iv[i].0);
            ne = ne.max(self.iv[i].1);
            self.iv.remove(i);
        }
        self.iv.insert(i, (ns, ne));
    }

    /// Is `[s, e]` entirely inside the union? `s > e` wraps through 0.
    pub fn covered(&self, s: f64, e: f64) -> bool {
        if s > e {
            return self.covered(s, TAU) && self.covered(0.0, e);
        }

        let mut i = 0;
        while i < self.iv.len() && self.iv[i].1 < s - EPS {
            i += 1;
        }
        if i >= self.iv.len() || self.iv[i].0 > s + EPS {
            return false;
        }

        let mut cover = self.iv[i].1;
        if cover >= e - EPS {
            return true;
        }
        i += 1;
        while i < self.iv.len() && self.iv[i].0 <= cover + EPS {
            cover = cover.max(self.iv[i].1);
            if cover >= e - EPS {
                return true;
            }
            i += 1;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn open(w: usize, h: usize) -> Grid {
        Grid::from_rows(vec![vec![false; w]; h]).unwrap()
    }

    #[test]
    fn union_merges_overlapping_and_adjacent() {
        let mut u = AngleUnion::new();
        u.add(0.1, 0.3);
        u.add(0.5, 0.7);
        assert_eq!(u.intervals().len(), 2);
        u.add(0.3, 0.5);
        assert_eq!(u.intervals(), &[(0.1, 0.7)]);
        assert!(u.covered(0.2, 0.6));
        assert!(!u.covered(0.05, 0.6));
        assert!(!u.covered(0.2, 0.8));
    }

    #[test]
    fn wrapping_query_needs_both_ends() {
        // The east neighbour blocks [-45°, 45°], stored as two pieces.
        let mut u = AngleUnion::new();
        for (s, e) in tile_spans(1, 0) {
            u.add(s, e);
        }
        assert!(u.covered(TAU - 0.1, 0.1));
        assert!(!u.covered(TAU - 1.0, 0.1));

        let mut only_high = AngleUnion::new();
        only_high.add(TAU - 0.2, TAU);
        assert!(!only_high.covered(TAU - 0.1, 0.1));
    }

    #[test]
    fn tile_east_of_origin_splits_at_zero() {
        let spans = tile_spans(1, 0);
        assert_eq!(spans.len(), 2);
        let (s0, e0) = spans[0];
        let (s1, e1) = spans[1];
        assert!((e0 - TAU).abs() < 1e-12 && s0 > PI);
        assert_eq!(s1, 0.0);
        assert!((e1 - (0.5f64).atan2(0.5)).abs() < 1e-12);
    }

    #[test]
    fn tile_south_of_origin_is_one_span() {
        // +y is down the grid, which atan2 sees as positive angle.
        let spans = tile_spans(0, 2);
        assert_eq!(spans.len(), 1);
        let (s, e) = spans[0];
        assert!(s < FRAC_PI_2 && e > FRAC_PI_2);
    }

    #[test]
    fn open_room_sees_strict_disc() {
        let grid = open(5, 5);
        let origin = Tile::new(2, 2);
        let vis = visible(&grid, origin, 2, |t| grid.is_wall(t));
        let expected: BTreeSet<Tile> = grid.tiles().filter(|&t| t.dist2(origin) < 4).collect();
        assert_eq!(vis, expected);
        assert_eq!(vis.len(), 9);
    }

    #[test]
    fn non_positive_radius_sees_only_origin() {
        let grid = open(3, 3);
        let origin = Tile::new(1, 1);
        for r in [0, -3] {
            let vis = visible(&grid, origin, r, |_| false);
            assert_eq!(vis.into_iter().collect::<Vec<_>>(), vec![origin]);
        }
    }

    #[test]
    fn out_of_bounds_origin_sees_nothing() {
        let grid = open(3, 3);
        assert!(visible(&grid, Tile::new(5, 1), 3, |_| false).is_empty());
        assert!(visible(&grid, Tile::new(-1, 0), 3, |_| false).is_empty());
    }

    #[test]
    fn wall_hides_tiles_behind_it_but_is_itself_seen() {
        // .....
        // ..#..
        // .....
        let grid = Grid::parse(".......\n...#...\n.......\n").unwrap();
        let origin = Tile::new(3, 2);
        let vis = visible(&grid, origin, 3, |t| grid.is_wall(t));
        assert!(vis.contains(&Tile::new(3, 1)), "the wall itself is visible");
        assert!(!vis.contains(&Tile::new(3, 0)), "directly behind the wall is hidden");
        assert!(vis.contains(&Tile::new(1, 2)));
    }

    #[test]
    fn same_ring_tiles_do_not_block_each_other() {
        // Origin at a corridor mouth: both diagonal walls sit at the same
        // distance and must both be seen, as must the corridor itself.
        let grid = Grid::parse("#.#\n...\n").unwrap();
        let origin = Tile::new(1, 1);
        let vis = visible(&grid, origin, 2, |t| grid.is_wall(t));
        assert!(vis.contains(&Tile::new(0, 0)));
        assert!(vis.contains(&Tile::new(2, 0)));
        assert!(vis.contains(&Tile::new(1, 0)));
    }
}
