//! Height maps: noise maps shaped by a falloff mask, a height curve,
//! and a world-space multiplier, with the observed value range
//! recorded for downstream texture/color mapping.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::noise_field::{generate_noise_map, NoiseMap, NoiseSettings};

/// Monotone piecewise-linear curve over [0, 1].
///
/// Shapes normalized noise before the height multiplier is applied,
/// e.g. flattening valleys while keeping peaks steep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightCurve {
    /// `(input, output)` control points, ascending by input.
    points: Vec<(f32, f32)>,
}

impl Default for HeightCurve {
    fn default() -> Self {
        Self::identity()
    }
}

impl HeightCurve {
    pub fn identity() -> Self {
        Self {
            points: vec![(0.0, 0.0), (1.0, 1.0)],
        }
    }

    /// Build a curve from control points; points are sorted by input.
    pub fn from_points(mut points: Vec<(f32, f32)>) -> Self {
        if points.is_empty() {
            return Self::identity();
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { points }
    }

    /// Evaluate the curve, clamping outside the control-point range.
    pub fn evaluate(&self, t: f32) -> f32 {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];
        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }
        for pair in self.points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            if t <= x1 {
                let span = x1 - x0;
                if span <= f32::EPSILON {
                    return y1;
                }
                let f = (t - x0) / span;
                return y0 + (y1 - y0) * f;
            }
        }
        last.1
    }
}

/// Settings for building a height map from noise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightMapSettings {
    pub noise: NoiseSettings,
    /// World-space height of a fully-raised sample.
    pub height_multiplier: f32,
    pub height_curve: HeightCurve,
    /// Subtract an island-shaped falloff mask before shaping.
    pub use_falloff: bool,
}

impl Default for HeightMapSettings {
    fn default() -> Self {
        Self {
            noise: NoiseSettings::default(),
            height_multiplier: 25.0,
            height_curve: HeightCurve::identity(),
            use_falloff: false,
        }
    }
}

impl HeightMapSettings {
    /// Smallest height this configuration can produce.
    pub fn min_height(&self) -> f32 {
        self.height_multiplier * self.height_curve.evaluate(0.0)
    }

    /// Largest height this configuration can produce.
    pub fn max_height(&self) -> f32 {
        self.height_multiplier * self.height_curve.evaluate(1.0)
    }
}

/// A shaped height field plus its observed value range. Immutable once
/// produced; chunks share it by `Arc` for re-tessellation at other
/// LODs.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightMap {
    pub values: NoiseMap,
    pub min_value: f32,
    pub max_value: f32,
}

/// Generate a `width` x `height` height map centered on
/// `sample_center` (noise-space units).
pub fn generate_height_map(
    width: usize,
    height: usize,
    settings: &HeightMapSettings,
    sample_center: Vec2,
) -> HeightMap {
    let mut values = generate_noise_map(width, height, &settings.noise, sample_center);

    let falloff = if settings.use_falloff {
        debug_assert_eq!(width, height, "falloff masks are square");
        Some(generate_falloff_map(width))
    } else {
        None
    };

    let mut min_value = f32::MAX;
    let mut max_value = f32::MIN;

    for y in 0..height {
        for x in 0..width {
            let mut sample = values.get(x, y);
            if let Some(falloff) = &falloff {
                sample = (sample - falloff.get(x, y)).clamp(0.0, 1.0);
            }
            let shaped = settings.height_curve.evaluate(sample) * settings.height_multiplier;
            min_value = min_value.min(shaped);
            max_value = max_value.max(shaped);
            values.set(x, y, shaped);
        }
    }

    HeightMap {
        values,
        min_value,
        max_value,
    }
}

/// Island falloff mask: 0 at the center rising to 1 at the borders.
pub fn generate_falloff_map(size: usize) -> NoiseMap {
    let mut map = NoiseMap::new(size, size);
    for y in 0..size {
        for x in 0..size {
            // Centered coordinates in [-1, 1]; square distance metric.
            let cx = x as f32 / size as f32 * 2.0 - 1.0;
            let cy = y as f32 / size as f32 * 2.0 - 1.0;
            let value = cx.abs().max(cy.abs());
            map.set(x, y, falloff_shape(value));
        }
    }
    map
}

/// Sigmoid-like shaping so the falloff hugs the map border instead of
/// eating the playable middle.
fn falloff_shape(value: f32) -> f32 {
    const A: f32 = 3.0;
    const B: f32 = 2.2;
    let v = value.powf(A);
    v / (v + (B - B * value).powf(A))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise_field::NormalizeMode;

    #[test]
    fn curve_evaluates_and_clamps() {
        let curve = HeightCurve::from_points(vec![(0.0, 0.0), (0.5, 0.1), (1.0, 1.0)]);
        assert_eq!(curve.evaluate(-1.0), 0.0);
        assert_eq!(curve.evaluate(0.25), 0.05);
        assert_eq!(curve.evaluate(0.5), 0.1);
        assert!((curve.evaluate(0.75) - 0.55).abs() < 1e-6);
        assert_eq!(curve.evaluate(2.0), 1.0);
    }

    #[test]
    fn records_observed_range() {
        let settings = HeightMapSettings {
            noise: NoiseSettings {
                normalize_mode: NormalizeMode::Local,
                ..NoiseSettings::default()
            },
            height_multiplier: 10.0,
            ..HeightMapSettings::default()
        };
        let map = generate_height_map(24, 24, &settings, Vec2::ZERO);

        let min = map.values.values().iter().cloned().fold(f32::MAX, f32::min);
        let max = map.values.values().iter().cloned().fold(f32::MIN, f32::max);
        assert_eq!(map.min_value, min);
        assert_eq!(map.max_value, max);
        // Local-normalized noise spans [0, 1] exactly, so the identity
        // curve times the multiplier spans [0, 10].
        assert_eq!(map.min_value, 0.0);
        assert_eq!(map.max_value, 10.0);
    }

    #[test]
    fn multiplier_scales_heights() {
        let base = HeightMapSettings::default();
        let doubled = HeightMapSettings {
            height_multiplier: base.height_multiplier * 2.0,
            ..base.clone()
        };
        let a = generate_height_map(12, 12, &base, Vec2::ZERO);
        let b = generate_height_map(12, 12, &doubled, Vec2::ZERO);
        for (&va, &vb) in a.values.values().iter().zip(b.values.values()) {
            assert!((vb - va * 2.0).abs() < 1e-4);
        }
    }

    #[test]
    fn falloff_is_low_center_high_border() {
        let map = generate_falloff_map(33);
        assert!(map.get(16, 16) < 0.05, "center should be near zero");
        assert!(map.get(0, 0) > 0.95, "corner should be near one");
        assert!(map.get(32, 0) > 0.95);
        assert!(map.values().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn falloff_flattens_map_borders() {
        let settings = HeightMapSettings {
            use_falloff: true,
            ..HeightMapSettings::default()
        };
        let map = generate_height_map(33, 33, &settings, Vec2::ZERO);
        // Corners sit fully inside the mask.
        assert_eq!(map.values.get(0, 0), 0.0);
        assert_eq!(map.values.get(32, 32), 0.0);
    }

    #[test]
    fn settings_report_height_bounds() {
        let settings = HeightMapSettings {
            height_multiplier: 40.0,
            height_curve: HeightCurve::from_points(vec![(0.0, 0.1), (1.0, 0.9)]),
            ..HeightMapSettings::default()
        };
        assert!((settings.min_height() - 4.0).abs() < 1e-6);
        assert!((settings.max_height() - 36.0).abs() < 1e-6);
    }
}
