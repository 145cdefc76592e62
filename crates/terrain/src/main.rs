//! Headless landmass demo: streams terrain chunks around a scripted
//! viewer marching across the world and reports streaming stats.

use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use engine_core::{ComputeQueue, Time};
use glam::Vec2;
use terrain::{TerrainManager, TerrainSettings};

const TICKS: u32 = 600;
const VIEWER_SPEED: f32 = 8.0;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = TerrainSettings::load();
    settings
        .validate()
        .context("terrain settings failed validation")?;
    let settings = Arc::new(settings);

    let workers = thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(2);
    let queue = Arc::new(ComputeQueue::new(workers, 256));
    let mut manager = TerrainManager::new(Arc::clone(&settings), Arc::clone(&queue))
        .context("could not start terrain manager")?;

    log::info!(
        "streaming terrain: {} workers, view distance {}, chunk size {}",
        workers,
        settings.max_view_distance(),
        settings.mesh.mesh_world_size(),
    );

    let mut time = Time::new();
    let mut viewer = Vec2::ZERO;

    for tick in 0..TICKS {
        time.update();

        // March the viewer diagonally so the window keeps shifting.
        viewer += Vec2::new(1.0, 0.35).normalize() * VIEWER_SPEED * time.delta_seconds().max(1.0 / 60.0);

        manager.update(viewer);
        let delivered = queue.drain();

        if tick % 100 == 0 {
            log::info!(
                "tick {:4}: viewer ({:6.1}, {:6.1}), {} chunks, {} visible, {} delivered, {} in flight",
                tick,
                viewer.x,
                viewer.y,
                manager.chunk_count(),
                manager.visible_count(),
                delivered,
                queue.in_flight(),
            );
        }
    }

    // Let outstanding generation finish before reporting.
    while queue.in_flight() > 0 {
        queue.drain();
        thread::sleep(std::time::Duration::from_millis(2));
    }
    queue.drain();

    log::info!(
        "done after {:.1}s: {} chunks generated, {} visible at the end",
        time.elapsed_seconds(),
        manager.chunk_count(),
        manager.visible_count(),
    );
    Ok(())
}
