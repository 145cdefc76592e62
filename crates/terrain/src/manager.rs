//! Chunk streaming around a moving viewer: spawns chunks entering the
//! view window, re-evaluates visibility when the viewer has moved far
//! enough, and steps colliders every update.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use engine_core::{ComputeQueue, SettingsError};
use glam::Vec2;

use crate::chunk::{
    apply_visibility_change, request_height_map, ChunkContext, ChunkCoord, ChunkMap, TerrainChunk,
};
use crate::settings::TerrainSettings;

/// Full visibility passes only run after the viewer has moved this far
/// since the last one. Collider checks run every update regardless.
pub const VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE: f32 = 25.0;

pub struct TerrainManager {
    ctx: ChunkContext,
    chunks: ChunkMap,
    chunks_visible_in_view_distance: i32,
    viewer_at_last_update: Option<Vec2>,
}

impl TerrainManager {
    pub fn new(
        settings: Arc<TerrainSettings>,
        queue: Arc<ComputeQueue>,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        let chunks_visible_in_view_distance =
            (settings.max_view_distance() / settings.mesh.mesh_world_size()).round() as i32;
        let ctx = ChunkContext {
            settings,
            queue,
            viewer: Arc::new(Mutex::new(Vec2::ZERO)),
            visible: Arc::new(Mutex::new(Vec::new())),
        };
        Ok(Self {
            ctx,
            chunks: ChunkMap::new(),
            chunks_visible_in_view_distance,
            viewer_at_last_update: None,
        })
    }

    pub fn settings(&self) -> &Arc<TerrainSettings> {
        &self.ctx.settings
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn visible_count(&self) -> usize {
        self.ctx.visible.lock().unwrap().len()
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Arc<Mutex<TerrainChunk>>> {
        self.chunks.get(&coord)
    }

    /// Advance streaming for the new viewer position. Call once per
    /// tick from the owner thread, before draining the compute queue.
    pub fn update(&mut self, viewer: Vec2) {
        *self.ctx.viewer.lock().unwrap() = viewer;

        if self.viewer_at_last_update.map_or(false, |last| last != viewer) {
            let snapshot: Vec<ChunkCoord> = self.ctx.visible.lock().unwrap().clone();
            for coord in snapshot {
                if let Some(chunk) = self.chunks.get(&coord) {
                    let handle = Arc::clone(chunk);
                    handle.lock().unwrap().update_collider(viewer, &self.ctx, &handle);
                }
            }
        }

        let sqr_move_threshold =
            VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE * VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE;
        let moved_far_enough = self
            .viewer_at_last_update
            .map_or(true, |last| last.distance_squared(viewer) > sqr_move_threshold);
        if moved_far_enough {
            self.viewer_at_last_update = Some(viewer);
            self.update_visible_chunks(viewer);
        }
    }

    fn update_visible_chunks(&mut self, viewer: Vec2) {
        let mut updated: HashSet<ChunkCoord> = HashSet::new();

        // Walk the visible list back to front so chunks leaving view
        // are re-evaluated before the window scan repopulates.
        let snapshot: Vec<ChunkCoord> = self.ctx.visible.lock().unwrap().clone();
        for coord in snapshot.into_iter().rev() {
            updated.insert(coord);
            self.update_chunk(coord, viewer);
        }

        let world_size = self.ctx.settings.mesh.mesh_world_size();
        let current_x = (viewer.x / world_size).round() as i32;
        let current_y = (viewer.y / world_size).round() as i32;
        let k = self.chunks_visible_in_view_distance;

        for y_offset in -k..=k {
            for x_offset in -k..=k {
                let coord = ChunkCoord::new(current_x + x_offset, current_y + y_offset);
                if updated.contains(&coord) {
                    continue;
                }
                if self.chunks.contains_key(&coord) {
                    self.update_chunk(coord, viewer);
                } else {
                    let chunk = Arc::new(Mutex::new(TerrainChunk::new(coord, &self.ctx.settings)));
                    request_height_map(&chunk, &self.ctx);
                    self.chunks.insert(coord, chunk);
                }
            }
        }
    }

    fn update_chunk(&self, coord: ChunkCoord, viewer: Vec2) {
        let Some(chunk) = self.chunks.get(&coord) else {
            return;
        };
        let handle = Arc::clone(chunk);
        // Height map requests can be deferred by a full queue; retry
        // before evaluating visibility.
        if !handle.lock().unwrap().height_map_requested() {
            request_height_map(&handle, &self.ctx);
        }
        let change = handle.lock().unwrap().update_visibility(viewer, &self.ctx, &handle);
        if let Some(now_visible) = change {
            apply_visibility_change(&self.ctx.visible, coord, now_visible);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::LodLevel;
    use std::time::Duration;

    fn manager_with(thresholds: &[f32]) -> TerrainManager {
        let mut settings = TerrainSettings::default();
        settings.lod_levels = thresholds
            .iter()
            .enumerate()
            .map(|(i, &t)| LodLevel { lod: i as u32, visible_distance_threshold: t })
            .collect();
        let queue = Arc::new(ComputeQueue::new(2, 256));
        TerrainManager::new(Arc::new(settings), queue).expect("valid settings")
    }

    fn drain_until_idle(manager: &TerrainManager) {
        loop {
            manager.ctx.queue.drain();
            if manager.ctx.queue.in_flight() == 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn rejects_invalid_settings() {
        let mut settings = TerrainSettings::default();
        settings.lod_levels.clear();
        let queue = Arc::new(ComputeQueue::new(1, 8));
        assert!(matches!(
            TerrainManager::new(Arc::new(settings), queue),
            Err(SettingsError::NoLodLevels)
        ));
    }

    #[test]
    fn first_update_spawns_the_view_window() {
        let mut manager = manager_with(&[150.0, 300.0, 450.0]);
        manager.update(Vec2::ZERO);
        drain_until_idle(&manager);
        manager.update(Vec2::new(0.1, 0.0));
        drain_until_idle(&manager);

        let k = manager.chunks_visible_in_view_distance;
        let side = (2 * k + 1) as usize;
        assert_eq!(manager.chunk_count(), side * side);
        // The chunk under the viewer is visible once its mesh arrived.
        let origin = manager.chunk(ChunkCoord::new(0, 0)).expect("origin chunk");
        assert!(origin.lock().unwrap().is_visible());
        assert!(manager.visible_count() > 0);
    }

    #[test]
    fn distance_picks_the_matching_lod_level() {
        let mut manager = manager_with(&[100.0, 200.0, 400.0]);
        manager.update(Vec2::ZERO);
        drain_until_idle(&manager);
        manager.update(Vec2::new(0.1, 0.0));
        drain_until_idle(&manager);

        // With the default 125-unit chunks, the chunk two steps out has
        // its near edge at 187.5: inside the second band (100..=200).
        let target = ChunkCoord::new(2, 0);
        let chunk = manager.chunk(target).expect("chunk in window");
        let distance = chunk.lock().unwrap().sqr_distance_from(Vec2::ZERO).sqrt();
        assert!(distance > 100.0 && distance <= 200.0, "distance {}", distance);
        assert_eq!(chunk.lock().unwrap().current_lod(), Some(1));
    }

    #[test]
    fn chunks_left_behind_become_invisible() {
        let mut manager = manager_with(&[150.0]);
        manager.update(Vec2::ZERO);
        drain_until_idle(&manager);
        manager.update(Vec2::new(0.1, 0.0));
        drain_until_idle(&manager);
        assert!(manager
            .chunk(ChunkCoord::new(0, 0))
            .unwrap()
            .lock()
            .unwrap()
            .is_visible());

        // March far enough that the origin chunk leaves view entirely.
        let world_size = manager.settings().mesh.mesh_world_size();
        let far = Vec2::new(world_size * 10.0, 0.0);
        manager.update(far);
        drain_until_idle(&manager);

        let origin = manager.chunk(ChunkCoord::new(0, 0)).unwrap();
        assert!(!origin.lock().unwrap().is_visible());
        assert!(!manager
            .ctx
            .visible
            .lock()
            .unwrap()
            .contains(&ChunkCoord::new(0, 0)));
    }

    #[test]
    fn small_moves_skip_the_full_pass() {
        let mut manager = manager_with(&[150.0]);
        manager.update(Vec2::ZERO);
        drain_until_idle(&manager);
        let count = manager.chunk_count();

        // Under the 25-unit threshold: no new chunks spawn even though
        // the window center would not change anyway.
        manager.update(Vec2::new(10.0, 0.0));
        assert_eq!(manager.chunk_count(), count);
    }
}
