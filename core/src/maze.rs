//! Maze sources.
//!
//! The generator is an external program; the engine only sees the grid
//! it prints. Its output is not assumed reproducible across versions, and
//! output that does not parse into the requested size rejects the round.

use crate::{
    config::ArenaConfig,
    error::{SimError, SimResult},
    grid::{Grid, FLOOR, WALL},
};
use std::process::Command;

pub trait MazeSource {
    fn generate(&self, config: &ArenaConfig) -> SimResult<Grid>;
}

/// Runs the external generator and parses what it prints.
#[derive(Debug, Clone)]
pub struct ProcessMazeGenerator {
    program: String,
    args: Vec<String>,
}

impl Default for ProcessMazeGenerator {
    fn default() -> Self {
        Self::new("node include/maze.js")
    }
}

impl ProcessMazeGenerator {
    /// `command_line` is split on whitespace: program first, then fixed
    /// leading arguments. Size, kind, seed and markers are appended.
    pub fn new(command_line: &str) -> Self {
        let mut parts = command_line.split_whitespace().map(String::from);
        Self {
            program: parts.next().unwrap_or_default(),
            args: parts.collect(),
        }
    }

    fn command(&self, config: &ArenaConfig) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).args([
            "--width".to_string(),
            config.width.to_string(),
            "--height".to_string(),
            config.height.to_string(),
            "--generator".to_string(),
            config.generator.clone(),
            "--seed".to_string(),
            config.seed.to_string(),
            "--wall".to_string(),
            WALL.to_string(),
            "--floor".to_string(),
            FLOOR.to_string(),
        ]);
        cmd
    }
}

impl MazeSource for ProcessMazeGenerator {
    fn generate(&self, config: &ArenaConfig) -> SimResult<Grid> {
        if self.program.is_empty() {
            return Err(SimError::MazeGeneration("empty generator command".into()));
        }
        let output = self
            .command(config)
            .output()
            .map_err(|e| SimError::MazeGeneration(format!("cannot run '{}': {e}", self.program)))?;
        if !output.status.success() {
            return Err(SimError::MazeGeneration(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Grid::parse_sized(&text, config.width, config.height)
    }
}

/// A fixed grid, for tests and replays of a recorded maze.
#[derive(Debug, Clone)]
pub struct StaticMaze(pub Grid);

impl StaticMaze {
    pub fn parse(text: &str) -> SimResult<Self> {
        Ok(Self(Grid::parse(text)?))
    }
}

impl MazeSource for StaticMaze {
    fn generate(&self, _config: &ArenaConfig) -> SimResult<Grid> {
        Ok(self.0.clone())
    }
}
