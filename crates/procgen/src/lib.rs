//! Procedural terrain generation: octave noise fields, height maps,
//! LOD mesh tessellation, and preview textures.

pub mod heightmap;
pub mod mesh;
pub mod noise_field;
pub mod textures;

pub use heightmap::*;
pub use mesh::*;
pub use noise_field::*;
pub use textures::*;
