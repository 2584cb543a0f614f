use crate::types::BotIndex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Maze generator failed: {0}")]
    MazeGeneration(String),

    #[error("Malformed grid: {0}")]
    MalformedGrid(String),

    #[error("Failed to start bot '{program}': {source}")]
    BotSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt visibility cache entry: {0}")]
    CorruptCache(String),

    #[error("Bot {bot} disconnected: {reason}")]
    BotDisconnected { bot: BotIndex, reason: String },

    #[error("Engine is in phase {actual}, expected {expected}")]
    InvalidPhase {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Round cancelled at tick {tick}")]
    Cancelled { tick: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;
