//! Error taxonomy for the terrain engine.
//!
//! Configuration problems are fatal at startup; queue submission
//! failures are transient and retried on a later tick.

use thiserror::Error;

/// Invalid terrain configuration. Detected by validation before any
/// generation work is dispatched; never recoverable at runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("at least one LOD level is required")]
    NoLodLevels,

    #[error("LOD index {lod} exceeds the supported maximum of {max}")]
    LodIndexOutOfRange { lod: u32, max: u32 },

    #[error("LOD distance thresholds must be strictly ascending (level {index})")]
    ThresholdsNotAscending { index: usize },

    #[error("collider LOD index {index} is out of range for {levels} LOD levels")]
    ColliderLodOutOfRange { index: usize, levels: usize },

    #[error("chunk size index {index} exceeds the supported maximum of {max}")]
    ChunkSizeIndexOutOfRange { index: usize, max: usize },

    #[error("LOD stride {stride} does not evenly divide the {interior}-sample interior extent")]
    UnsupportedStride { stride: usize, interior: usize },

    #[error("noise scale must be positive, got {scale}")]
    NonPositiveScale { scale: f32 },
}

/// A compute submission was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Too many submissions are outstanding. Back-pressure: retry next
    /// tick.
    #[error("compute queue is at capacity")]
    QueueFull,
}
