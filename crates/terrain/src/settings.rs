//! Terrain streaming settings. Loaded from `terrain.ron` at startup;
//! a missing or invalid file falls back to defaults.

use engine_core::SettingsError;
use procgen::{HeightMapSettings, MeshSettings, MAX_LOD_COUNT};
use serde::{Deserialize, Serialize};

/// One level-of-detail tier: chunks closer than the threshold (and
/// farther than the previous tier's) render at this LOD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodLevel {
    pub lod: u32,
    pub visible_distance_threshold: f32,
}

impl LodLevel {
    pub fn sqr_visible_distance_threshold(&self) -> f32 {
        self.visible_distance_threshold * self.visible_distance_threshold
    }
}

/// Select the LOD level index for a viewer distance: the first level
/// whose threshold covers the distance, ties toward the finer level.
pub fn select_lod(levels: &[LodLevel], distance: f32) -> usize {
    let mut lod_index = 0;
    for (i, level) in levels.iter().enumerate().take(levels.len().saturating_sub(1)) {
        if distance > level.visible_distance_threshold {
            lod_index = i + 1;
        } else {
            break;
        }
    }
    lod_index
}

fn default_lod_levels() -> Vec<LodLevel> {
    vec![
        LodLevel { lod: 0, visible_distance_threshold: 150.0 },
        LodLevel { lod: 1, visible_distance_threshold: 300.0 },
        LodLevel { lod: 2, visible_distance_threshold: 450.0 },
    ]
}

/// Everything the streaming layer needs to generate and select chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainSettings {
    #[serde(default)]
    pub mesh: MeshSettings,
    #[serde(default)]
    pub height_map: HeightMapSettings,
    /// Ascending by threshold; the last entry defines the maximum
    /// simulation distance.
    #[serde(default = "default_lod_levels")]
    pub lod_levels: Vec<LodLevel>,
    /// Which LOD level doubles as the collision mesh.
    #[serde(default)]
    pub collider_lod_index: usize,
    /// Bumped by `touch()`; consumers poll it instead of subscribing
    /// to change events, so re-registration bugs cannot exist.
    #[serde(skip)]
    revision: u64,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            mesh: MeshSettings::default(),
            height_map: HeightMapSettings::default(),
            lod_levels: default_lod_levels(),
            collider_lod_index: 0,
            revision: 0,
        }
    }
}

impl TerrainSettings {
    /// Viewer distance beyond which no chunk is visible.
    pub fn max_view_distance(&self) -> f32 {
        self.lod_levels
            .last()
            .map(|level| level.visible_distance_threshold)
            .unwrap_or(0.0)
    }

    /// Fail-fast configuration check, run once at startup.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.mesh.validate()?;

        if self.lod_levels.is_empty() {
            return Err(SettingsError::NoLodLevels);
        }
        for (index, level) in self.lod_levels.iter().enumerate() {
            if level.lod >= MAX_LOD_COUNT {
                return Err(SettingsError::LodIndexOutOfRange {
                    lod: level.lod,
                    max: MAX_LOD_COUNT - 1,
                });
            }
            if index > 0
                && level.visible_distance_threshold
                    <= self.lod_levels[index - 1].visible_distance_threshold
            {
                return Err(SettingsError::ThresholdsNotAscending { index });
            }
        }
        if self.collider_lod_index >= self.lod_levels.len() {
            return Err(SettingsError::ColliderLodOutOfRange {
                index: self.collider_lod_index,
                levels: self.lod_levels.len(),
            });
        }
        if self.height_map.noise.scale <= 0.0 {
            return Err(SettingsError::NonPositiveScale {
                scale: self.height_map.noise.scale,
            });
        }
        Ok(())
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Record that a field changed so polling consumers regenerate.
    pub fn touch(&mut self) {
        self.revision += 1;
    }

    /// Load settings from `terrain.ron`. Missing or invalid files fall
    /// back to defaults with a warning.
    pub fn load() -> Self {
        let path = settings_path();
        if let Ok(data) = std::fs::read_to_string(&path) {
            match ron::from_str(&data) {
                Ok(settings) => return settings,
                Err(e) => log::warn!("Invalid settings at {:?}: {}, using defaults", path, e),
            }
        }
        Self::default()
    }

    /// Save current settings to `terrain.ron`. Logs on error.
    pub fn save(&self) {
        let path = settings_path();
        if let Ok(s) = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default()) {
            if let Err(e) = std::fs::write(&path, s) {
                log::warn!("Could not write settings to {:?}: {}", path, e);
            }
        }
    }
}

fn settings_path() -> std::path::PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| std::path::PathBuf::from("."))
        .join("terrain.ron")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_levels() -> Vec<LodLevel> {
        vec![
            LodLevel { lod: 0, visible_distance_threshold: 100.0 },
            LodLevel { lod: 1, visible_distance_threshold: 200.0 },
            LodLevel { lod: 2, visible_distance_threshold: 400.0 },
        ]
    }

    #[test]
    fn lod_selection_scans_ascending_thresholds() {
        let levels = scenario_levels();
        assert_eq!(select_lod(&levels, 50.0), 0);
        assert_eq!(select_lod(&levels, 150.0), 1);
        // Ties go to the finer level.
        assert_eq!(select_lod(&levels, 100.0), 0);
        assert_eq!(select_lod(&levels, 350.0), 2);
        // Beyond every threshold the scan saturates at the last level;
        // visibility is a separate check against max_view_distance.
        assert_eq!(select_lod(&levels, 1000.0), 2);
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(TerrainSettings::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_configurations() {
        let mut empty = TerrainSettings::default();
        empty.lod_levels.clear();
        assert_eq!(empty.validate(), Err(SettingsError::NoLodLevels));

        let mut unsorted = TerrainSettings::default();
        unsorted.lod_levels = vec![
            LodLevel { lod: 0, visible_distance_threshold: 200.0 },
            LodLevel { lod: 1, visible_distance_threshold: 100.0 },
        ];
        assert_eq!(
            unsorted.validate(),
            Err(SettingsError::ThresholdsNotAscending { index: 1 })
        );

        let mut bad_collider = TerrainSettings::default();
        bad_collider.collider_lod_index = 7;
        assert!(matches!(
            bad_collider.validate(),
            Err(SettingsError::ColliderLodOutOfRange { index: 7, .. })
        ));

        let mut bad_lod = TerrainSettings::default();
        bad_lod.lod_levels = vec![LodLevel { lod: 9, visible_distance_threshold: 100.0 }];
        assert!(matches!(
            bad_lod.validate(),
            Err(SettingsError::LodIndexOutOfRange { lod: 9, .. })
        ));
    }

    #[test]
    fn revision_advances_on_touch() {
        let mut settings = TerrainSettings::default();
        let before = settings.revision();
        settings.touch();
        assert_eq!(settings.revision(), before + 1);
    }

    #[test]
    fn ron_round_trip_preserves_levels() {
        let settings = TerrainSettings::default();
        let text = ron::ser::to_string_pretty(&settings, ron::ser::PrettyConfig::default())
            .expect("serialize");
        let parsed: TerrainSettings = ron::from_str(&text).expect("deserialize");
        assert_eq!(parsed.lod_levels, settings.lod_levels);
        assert_eq!(parsed.collider_lod_index, settings.collider_lod_index);
    }
}
