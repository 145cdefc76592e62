//! Single-chunk preview of the generation pipeline. Polls the settings
//! revision and regenerates only when something changed.

use glam::Vec2;
use procgen::{
    generate_falloff_map, generate_height_map, generate_terrain_mesh, texture_from_height_map,
    HeightMap, MeshData, TextureData,
};

use crate::settings::TerrainSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    #[default]
    NoiseMap,
    Mesh,
    FalloffMap,
}

pub enum PreviewOutput {
    Texture(TextureData),
    Mesh(MeshData),
}

pub struct MapPreview {
    pub draw_mode: DrawMode,
    pub preview_lod: u32,
    last_revision: Option<u64>,
}

impl MapPreview {
    pub fn new(draw_mode: DrawMode, preview_lod: u32) -> Self {
        Self { draw_mode, preview_lod, last_revision: None }
    }

    /// Regenerate the preview if the settings revision moved since the
    /// last call. Returns `None` when nothing changed.
    pub fn render_if_changed(&mut self, settings: &TerrainSettings) -> Option<PreviewOutput> {
        if self.last_revision == Some(settings.revision()) {
            return None;
        }
        self.last_revision = Some(settings.revision());
        Some(self.render(settings))
    }

    /// Generate the preview for a single chunk centered at the origin.
    pub fn render(&self, settings: &TerrainSettings) -> PreviewOutput {
        let n = settings.mesh.vertices_per_line();
        match self.draw_mode {
            DrawMode::NoiseMap => {
                let height_map =
                    generate_height_map(n, n, &settings.height_map, Vec2::ZERO);
                PreviewOutput::Texture(texture_from_height_map(&height_map))
            }
            DrawMode::Mesh => {
                let height_map =
                    generate_height_map(n, n, &settings.height_map, Vec2::ZERO);
                PreviewOutput::Mesh(generate_terrain_mesh(
                    &height_map,
                    &settings.mesh,
                    self.preview_lod,
                ))
            }
            DrawMode::FalloffMap => {
                let height_map = HeightMap {
                    values: generate_falloff_map(n),
                    min_value: 0.0,
                    max_value: 1.0,
                };
                PreviewOutput::Texture(texture_from_height_map(&height_map))
            }
        }
    }
}
