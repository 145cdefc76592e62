//! A single streamed terrain chunk: owns its height map, one mesh per
//! LOD level, and the collider state. Generation runs on the compute
//! queue; completions re-enter through `Arc<Mutex<TerrainChunk>>`
//! handles so results always land on the owner thread's drain.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use engine_core::{ComputeQueue, SubmitError};
use glam::Vec2;
use procgen::{generate_height_map, generate_terrain_mesh, HeightMap, MeshData};

use crate::settings::{select_lod, TerrainSettings};

/// Colliders are only baked once the viewer is nearly on top of the
/// chunk; before that the collider LOD mesh may not even be requested.
pub const COLLIDER_GENERATION_DISTANCE_THRESHOLD: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Shared state every chunk needs to schedule work and report
/// visibility flips. Cloned into completion closures.
#[derive(Clone)]
pub struct ChunkContext {
    pub settings: Arc<TerrainSettings>,
    pub queue: Arc<ComputeQueue>,
    pub viewer: Arc<Mutex<Vec2>>,
    pub visible: Arc<Mutex<Vec<ChunkCoord>>>,
}

#[derive(Debug, Default)]
pub struct LodMesh {
    pub lod: u32,
    requested: bool,
    mesh: Option<Arc<MeshData>>,
}

impl LodMesh {
    pub fn mesh(&self) -> Option<&Arc<MeshData>> {
        self.mesh.as_ref()
    }

    pub fn has_mesh(&self) -> bool {
        self.mesh.is_some()
    }
}

pub struct TerrainChunk {
    coord: ChunkCoord,
    /// Chunk center in noise-sample space (world position divided by
    /// mesh scale).
    sample_center: Vec2,
    /// Chunk center in world units.
    position: Vec2,
    half_size: f32,
    height_map: Option<Arc<HeightMap>>,
    height_map_requested: bool,
    lod_meshes: Vec<LodMesh>,
    previous_lod: Option<usize>,
    visible: bool,
    has_collider: bool,
}

impl TerrainChunk {
    pub fn new(coord: ChunkCoord, settings: &TerrainSettings) -> Self {
        let world_size = settings.mesh.mesh_world_size();
        let position = Vec2::new(coord.x as f32, coord.y as f32) * world_size;
        let sample_center = position / settings.mesh.mesh_scale;
        let lod_meshes = settings
            .lod_levels
            .iter()
            .map(|level| LodMesh { lod: level.lod, requested: false, mesh: None })
            .collect();
        Self {
            coord,
            sample_center,
            position,
            half_size: world_size / 2.0,
            height_map: None,
            height_map_requested: false,
            lod_meshes,
            previous_lod: None,
            visible: false,
            has_collider: false,
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn has_collider(&self) -> bool {
        self.has_collider
    }

    pub fn has_height_map(&self) -> bool {
        self.height_map.is_some()
    }

    pub fn height_map_requested(&self) -> bool {
        self.height_map_requested
    }

    pub fn current_lod(&self) -> Option<usize> {
        self.previous_lod
    }

    pub fn lod_mesh(&self, lod_index: usize) -> Option<&LodMesh> {
        self.lod_meshes.get(lod_index)
    }

    /// Active render mesh, if the current LOD has finished generating.
    pub fn render_mesh(&self) -> Option<&Arc<MeshData>> {
        self.previous_lod
            .and_then(|i| self.lod_meshes.get(i))
            .and_then(|slot| slot.mesh())
    }

    /// Squared distance from a point to the chunk's bounding square.
    /// Zero when the point is inside the chunk.
    pub fn sqr_distance_from(&self, point: Vec2) -> f32 {
        let dx = (point.x - self.position.x).abs() - self.half_size;
        let dy = (point.y - self.position.y).abs() - self.half_size;
        let dx = dx.max(0.0);
        let dy = dy.max(0.0);
        dx * dx + dy * dy
    }

    /// Re-evaluate visibility and LOD against the viewer position.
    /// Returns `Some(now_visible)` when the visible flag flipped so the
    /// caller can update the shared visible list after dropping the
    /// chunk lock. No-op until the height map has arrived.
    pub fn update_visibility(
        &mut self,
        viewer: Vec2,
        ctx: &ChunkContext,
        handle: &Arc<Mutex<TerrainChunk>>,
    ) -> Option<bool> {
        if self.height_map.is_none() {
            return None;
        }

        let sqr_distance = self.sqr_distance_from(viewer);
        let max_view = ctx.settings.max_view_distance();
        let was_visible = self.visible;
        let visible = sqr_distance <= max_view * max_view;

        if visible {
            let distance = sqr_distance.sqrt();
            let lod_index = select_lod(&ctx.settings.lod_levels, distance);

            if self.previous_lod != Some(lod_index) {
                if self.lod_meshes[lod_index].has_mesh() {
                    self.previous_lod = Some(lod_index);
                } else if !self.lod_meshes[lod_index].requested {
                    self.request_mesh(lod_index, ctx, handle);
                }
            }
        }

        self.visible = visible;
        if visible != was_visible {
            Some(visible)
        } else {
            None
        }
    }

    /// Kick off mesh generation for one LOD level. The completion
    /// stores the mesh, re-runs visibility (the viewer may have moved),
    /// and refreshes the collider when this is the collider LOD.
    fn request_mesh(&mut self, lod_index: usize, ctx: &ChunkContext, handle: &Arc<Mutex<TerrainChunk>>) {
        let Some(height_map) = self.height_map.clone() else {
            return;
        };
        let lod = self.lod_meshes[lod_index].lod;
        let mesh_settings = ctx.settings.mesh.clone();

        let ctx_done = ctx.clone();
        let handle_done = Arc::clone(handle);
        let coord = self.coord;
        let submitted = ctx.queue.submit(
            move || generate_terrain_mesh(&height_map, &mesh_settings, lod),
            move |mesh| {
                let viewer = *ctx_done.viewer.lock().unwrap();
                let change = {
                    let mut chunk = handle_done.lock().unwrap();
                    chunk.lod_meshes[lod_index].mesh = Some(Arc::new(mesh));
                    let change = chunk.update_visibility(viewer, &ctx_done, &handle_done);
                    if lod_index == ctx_done.settings.collider_lod_index {
                        chunk.update_collider(viewer, &ctx_done, &handle_done);
                    }
                    change
                };
                if let Some(now_visible) = change {
                    apply_visibility_change(&ctx_done.visible, coord, now_visible);
                }
            },
        );
        match submitted {
            Ok(()) => self.lod_meshes[lod_index].requested = true,
            // Left unrequested; the next visibility pass retries.
            Err(SubmitError::QueueFull) => {
                log::debug!("mesh request deferred for {:?} lod {}", coord, lod)
            }
        }
    }

    /// Step the collider toward being baked: request the collider LOD
    /// mesh once the viewer enters its distance band, and mark the
    /// collider built once the viewer is inside the generation radius
    /// and the mesh exists.
    pub fn update_collider(
        &mut self,
        viewer: Vec2,
        ctx: &ChunkContext,
        handle: &Arc<Mutex<TerrainChunk>>,
    ) {
        if self.has_collider || self.height_map.is_none() {
            return;
        }
        let sqr_distance = self.sqr_distance_from(viewer);
        let collider_index = ctx.settings.collider_lod_index;

        let request_band = ctx.settings.lod_levels[collider_index].sqr_visible_distance_threshold();
        if sqr_distance < request_band && !self.lod_meshes[collider_index].requested {
            self.request_mesh(collider_index, ctx, handle);
        }

        let bake_radius =
            COLLIDER_GENERATION_DISTANCE_THRESHOLD * COLLIDER_GENERATION_DISTANCE_THRESHOLD;
        if sqr_distance < bake_radius && self.lod_meshes[collider_index].has_mesh() {
            self.has_collider = true;
            log::debug!("collider baked for {:?}", self.coord);
        }
    }
}

/// Request the chunk's height map on the compute queue. The completion
/// stores it and immediately runs a visibility pass so the first mesh
/// request goes out without waiting for the next manager update.
pub fn request_height_map(chunk: &Arc<Mutex<TerrainChunk>>, ctx: &ChunkContext) {
    let (sample_center, vertices_per_line) = {
        let chunk = chunk.lock().unwrap();
        if chunk.height_map.is_some() || chunk.height_map_requested {
            return;
        }
        (chunk.sample_center, ctx.settings.mesh.vertices_per_line())
    };
    let hm_settings = ctx.settings.height_map.clone();

    let ctx_done = ctx.clone();
    let handle_done = Arc::clone(chunk);
    let submitted = ctx.queue.submit(
        move || {
            generate_height_map(vertices_per_line, vertices_per_line, &hm_settings, sample_center)
        },
        move |height_map| {
            let viewer = *ctx_done.viewer.lock().unwrap();
            let (coord, change) = {
                let mut chunk = handle_done.lock().unwrap();
                chunk.height_map = Some(Arc::new(height_map));
                let change = chunk.update_visibility(viewer, &ctx_done, &handle_done);
                (chunk.coord, change)
            };
            if let Some(now_visible) = change {
                apply_visibility_change(&ctx_done.visible, coord, now_visible);
            }
        },
    );
    match submitted {
        Ok(()) => chunk.lock().unwrap().height_map_requested = true,
        Err(SubmitError::QueueFull) => {
            // Stays unrequested; the manager retries on its next update.
            log::debug!("height map request deferred");
        }
    }
}

/// Maintain the shared visible-coordinate list after a chunk's visible
/// flag flips. Must be called without holding that chunk's lock.
pub(crate) fn apply_visibility_change(
    visible: &Arc<Mutex<Vec<ChunkCoord>>>,
    coord: ChunkCoord,
    now_visible: bool,
) {
    let mut visible = visible.lock().unwrap();
    if now_visible {
        if !visible.contains(&coord) {
            visible.push(coord);
        }
    } else {
        visible.retain(|c| *c != coord);
    }
}

/// Convenience for tests and the manager: shared chunk registry type.
pub type ChunkMap = HashMap<ChunkCoord, Arc<Mutex<TerrainChunk>>>;
