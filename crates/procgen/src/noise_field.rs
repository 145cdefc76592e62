//! Octave-summed Perlin noise maps.
//!
//! **Seed-based determinism:** everything is derived from
//! `NoiseSettings::seed`, so the same settings and sample center
//! produce bit-identical maps at every world position, regardless of
//! chunk generation order.

use glam::Vec2;
use noise::{NoiseFn, Perlin};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// How a generated noise map is normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizeMode {
    /// Remap into [0, 1] using the map's own observed min/max. Only
    /// fit for single-map previews: each map normalizes independently,
    /// so adjacent chunks would disagree along their shared border.
    Local,
    /// Divide by the theoretical maximum octave sum so absolute height
    /// is comparable across chunks generated in isolation.
    #[default]
    Global,
}

/// Settings for fractal noise sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseSettings {
    pub seed: u64,
    /// Zoom factor; larger is smoother. Floored at 0.01 so sampling
    /// never collapses onto the integer noise lattice.
    pub scale: f32,
    pub octave_count: u32,
    /// Amplitude multiplier per octave, clamped to [0, 1].
    pub persistence: f32,
    /// Frequency multiplier per octave, at least 1.
    pub lacunarity: f32,
    /// User-controlled scroll offset in noise space.
    pub offset: Vec2,
    pub normalize_mode: NormalizeMode,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            scale: 50.0,
            octave_count: 6,
            persistence: 0.6,
            lacunarity: 2.0,
            offset: Vec2::ZERO,
            normalize_mode: NormalizeMode::Global,
        }
    }
}

impl NoiseSettings {
    /// Copy with every field clamped into its supported range.
    pub fn validated(&self) -> Self {
        Self {
            scale: self.scale.max(0.01),
            octave_count: self.octave_count.max(1),
            persistence: self.persistence.clamp(0.0, 1.0),
            lacunarity: self.lacunarity.max(1.0),
            ..self.clone()
        }
    }
}

/// A row-major grid of noise samples.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseMap {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl NoiseMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            values: vec![0.0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.values[y * self.width + x] = value;
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// Derive a deterministic u32 Perlin seed from the world seed.
/// Same seed always gives the same permutation table.
#[inline]
fn perlin_seed(seed: u64) -> u32 {
    (seed
        .wrapping_mul(0x9e3779b97f4a7c15_u64)
        .wrapping_add(0x6c078965_u64)
        >> 32) as u32
}

/// Generate a `width` x `height` noise map centered on `sample_center`
/// (in noise-space units).
///
/// Each octave samples from its own deterministic offset so the layers
/// decorrelate; the y offset is negated so scrolling the sample center
/// moves the two axes in independent directions. Sampling is centered
/// on the grid midpoint so changing `scale` zooms around the center
/// rather than a corner.
pub fn generate_noise_map(
    width: usize,
    height: usize,
    settings: &NoiseSettings,
    sample_center: Vec2,
) -> NoiseMap {
    let settings = settings.validated();
    let perlin = Perlin::new(perlin_seed(settings.seed));
    let mut rng = StdRng::seed_from_u64(settings.seed);

    // One offset per octave. Offsets much larger than this push Perlin
    // into visibly repeating territory.
    let mut octave_offsets = Vec::with_capacity(settings.octave_count as usize);
    let mut max_possible_height = 0.0_f32;
    let mut amplitude = 1.0_f32;
    for _ in 0..settings.octave_count {
        let offset_x = rng.gen_range(-100_000.0..100_000.0) + settings.offset.x + sample_center.x;
        let offset_y = rng.gen_range(-100_000.0..100_000.0) - settings.offset.y - sample_center.y;
        octave_offsets.push(Vec2::new(offset_x, offset_y));
        max_possible_height += amplitude;
        amplitude *= settings.persistence;
    }

    let mut map = NoiseMap::new(width, height);
    let mut min_height = f32::MAX;
    let mut max_height = f32::MIN;
    let mid_x = width as f32 / 2.0;
    let mid_y = height as f32 / 2.0;

    for y in 0..height {
        for x in 0..width {
            let mut amplitude = 1.0_f32;
            let mut frequency = 1.0_f32;
            let mut noise_height = 0.0_f32;

            for offset in &octave_offsets {
                let sample_x = (x as f32 - mid_x + offset.x) / settings.scale * frequency;
                let sample_y = (y as f32 - mid_y + offset.y) / settings.scale * frequency;

                // Perlin output is nominally [-1, 1]; clamp the tails
                // so the octave sum stays within the amplitude budget
                // used for global normalization.
                let sample = (perlin.get([sample_x as f64, sample_y as f64]) as f32)
                    .clamp(-1.0, 1.0);

                noise_height += sample * amplitude;
                amplitude *= settings.persistence;
                frequency *= settings.lacunarity;
            }

            min_height = min_height.min(noise_height);
            max_height = max_height.max(noise_height);

            let value = match settings.normalize_mode {
                // Comparable across chunks: scale by the largest sum
                // the octaves could reach, with headroom, and clamp
                // only the lower bound.
                NormalizeMode::Global => {
                    ((noise_height + 1.0) / (max_possible_height / 0.9)).max(0.0)
                }
                NormalizeMode::Local => noise_height,
            };
            map.set(x, y, value);
        }
    }

    // Local mode: remap the whole grid into [0, 1] by its own range.
    if settings.normalize_mode == NormalizeMode::Local && max_height > min_height {
        let span = max_height - min_height;
        for value in &mut map.values {
            *value = (*value - min_height) / span;
        }
    }

    map
}
