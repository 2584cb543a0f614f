//! The static wall/floor matrix.
//!
//! A Grid is produced once per round by the maze generator and never
//! mutated afterwards. Its identity for caching is the SHA-256 of its
//! JSON form (array of rows of booleans, `true` = wall).

use crate::{
    error::{SimError, SimResult},
    types::{Direction, Tile},
};
use sha2::{Digest, Sha256};

pub const WALL: char = '#';
pub const FLOOR: char = '.';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    walls: Vec<bool>,
}

impl Grid {
    /// Build from rows of wall flags. Rows must be non-empty and equally long.
    pub fn from_rows(rows: Vec<Vec<bool>>) -> SimResult<Self> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(SimError::MalformedGrid("grid is empty".into()));
        }
        if let Some((y, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(SimError::MalformedGrid(format!(
                "row {y} has width {}, expected {width}",
                row.len()
            )));
        }
        Ok(Self {
            width,
            height,
            walls: rows.into_iter().flatten().collect(),
        })
    }

    /// Parse generator text. Lines that are not made purely of `#` and `.`
    /// are noise and get dropped; what remains must be rectangular.
    pub fn parse(text: &str) -> SimResult<Self> {
        let rows: Vec<Vec<bool>> = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty() && line.chars().all(|c| c == WALL || c == FLOOR))
            .map(|line| line.chars().map(|c| c == WALL).collect())
            .collect();
        Self::from_rows(rows)
    }

    /// Parse and insist on the requested dimensions.
    pub fn parse_sized(text: &str, width: usize, height: usize) -> SimResult<Self> {
        let grid = Self::parse(text)?;
        if grid.width != width || grid.height != height {
            return Err(SimError::MalformedGrid(format!(
                "expected {width}x{height}, generator produced {}x{}",
                grid.width, grid.height
            )));
        }
        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn in_bounds(&self, t: Tile) -> bool {
        t.x >= 0 && t.y >= 0 && (t.x as usize) < self.width && (t.y as usize) < self.height
    }

    /// Out-of-bounds tiles count as walls.
    pub fn is_wall(&self, t: Tile) -> bool {
        !self.in_bounds(t) || self.walls[t.y as usize * self.width + t.x as usize]
    }

    pub fn is_floor(&self, t: Tile) -> bool {
        !self.is_wall(t)
    }

    /// All tiles in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        (0..self.height as i32).flat_map(move |y| (0..self.width as i32).map(move |x| Tile::new(x, y)))
    }

    /// Floor tiles in row-major order.
    pub fn floor_tiles(&self) -> Vec<Tile> {
        self.tiles().filter(|&t| self.is_floor(t)).collect()
    }

    /// In-bounds floor neighbours in N, S, E, W order.
    pub fn open_neighbors(&self, t: Tile) -> impl Iterator<Item = Tile> + '_ {
        Direction::ALL
            .into_iter()
            .map(move |d| t.step(d))
            .filter(move |&n| self.is_floor(n))
    }

    pub fn rows(&self) -> Vec<Vec<bool>> {
        self.walls.chunks(self.width).map(<[bool]>::to_vec).collect()
    }

    /// Hex SHA-256 of the JSON row form.
    pub fn content_hash(&self) -> String {
        let json = serde_json::to_string(&self.rows()).unwrap_or_default();
        Sha256::digest(json.as_bytes())
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for row in self.walls.chunks(self.width) {
            out.extend(row.iter().map(|&w| if w { WALL } else { FLOOR }));
            out.push('\n');
        }
        out
    }
}
