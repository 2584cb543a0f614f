//! Content-addressed, gzip-compressed visibility cache.
//!
//! RULE: the cache is an optimisation only. Every failure path (missing
//! file, unreadable gzip, bad JSON, an index that does not fit the grid)
//! degrades to recomputation with a warning; nothing here may abort a
//! round.
//!
//! File layout: `<dir>/<sha256-of-grid>-r<radius>.json.gz`, holding
//! `{"x/y": ["x/y", ...], ...}`.

use crate::{
    error::{SimError, SimResult},
    grid::Grid,
    types::Tile,
    visibility::VisibilityIndex,
};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_CACHE_DIR: &str = "cache";

#[derive(Debug, Clone)]
pub struct VisibilityCache {
    dir: PathBuf,
}

impl VisibilityCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, grid_hash: &str, radius: i32) -> PathBuf {
        self.dir.join(format!("{grid_hash}-r{radius}.json.gz"))
    }

    /// Fetch the index for `grid`, or `None` on a miss or a bad entry.
    pub fn load(&self, grid: &Grid, radius: i32) -> Option<VisibilityIndex> {
        let path = self.path_for(&grid.content_hash(), radius);
        if !path.exists() {
            log::debug!("visibility cache miss: {}", path.display());
            return None;
        }
        match Self::read_entry(&path, grid, radius) {
            Ok(index) => {
                log::debug!("visibility cache hit: {}", path.display());
                Some(index)
            }
            Err(e) => {
                log::warn!("ignoring visibility cache entry {}: {e}", path.display());
                None
            }
        }
    }

    /// Persist `index` for `grid`. Written to a temporary file and renamed
    /// into place so an interrupted write never leaves a truncated entry.
    pub fn store(&self, grid: &Grid, index: &VisibilityIndex) -> SimResult<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&grid.content_hash(), index.radius());
        let tmp = path.with_extension(format!("tmp-{}", std::process::id()));

        let payload: BTreeMap<String, Vec<String>> = index
            .origins()
            .map(|(origin, seen)| (origin.key(), seen.iter().map(|t| t.key()).collect()))
            .collect();

        let write = || -> SimResult<()> {
            let file = File::create(&tmp)?;
            let mut gz = GzEncoder::new(BufWriter::new(file), Compression::default());
            serde_json::to_writer(&mut gz, &payload)?;
            let mut out = gz.finish()?;
            out.flush()?;
            drop(out);
            fs::rename(&tmp, &path)?;
            Ok(())
        };
        let result = write();
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        } else {
            log::debug!("visibility cache stored: {}", path.display());
        }
        result
    }

    /// Cache-aware build: load if possible, otherwise compute and store.
    /// Store failures are logged, never returned.
    pub fn load_or_build(cache: Option<&Self>, grid: &Grid, radius: i32) -> VisibilityIndex {
        if let Some(index) = cache.and_then(|c| c.load(grid, radius)) {
            return index;
        }
        let index = VisibilityIndex::build(grid, radius);
        if let Some(c) = cache {
            if let Err(e) = c.store(grid, &index) {
                log::warn!("could not write visibility cache in {}: {e}", c.dir.display());
            }
        }
        index
    }

    fn read_entry(path: &Path, grid: &Grid, radius: i32) -> SimResult<VisibilityIndex> {
        let file = File::open(path)?;
        let raw: HashMap<String, Vec<String>> =
            serde_json::from_reader(GzDecoder::new(BufReader::new(file)))?;

        let mut entries = HashMap::with_capacity(raw.len());
        for (key, seen) in raw {
            let origin = parse_tile(&key)?;
            let seen = seen.iter().map(|s| parse_tile(s)).collect::<SimResult<Vec<_>>>()?;
            entries.insert(origin, seen);
        }
        VisibilityIndex::from_entries(grid, radius, entries)
    }
}

fn parse_tile(s: &str) -> SimResult<Tile> {
    Tile::parse_key(s).ok_or_else(|| SimError::CorruptCache(format!("bad tile key '{s}'")))
}
