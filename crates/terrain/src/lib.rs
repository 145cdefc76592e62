//! Chunked terrain streaming: LOD selection, async generation, and
//! visibility management over the procgen pipeline.

pub mod chunk;
pub mod manager;
pub mod preview;
pub mod settings;

pub use chunk::*;
pub use manager::*;
pub use preview::*;
pub use settings::*;
