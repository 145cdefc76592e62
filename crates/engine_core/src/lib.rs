//! Core types shared across the terrain engine:
//! - Background compute dispatch (worker pool + owner-thread delivery)
//! - Frame timing
//! - Error taxonomy

pub mod dispatch;
pub mod error;
pub mod time;

pub use dispatch::*;
pub use error::*;
pub use time::*;
