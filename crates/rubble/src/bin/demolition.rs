//! # Demolition
//!
//! Headless run of the whole pipeline:
//!
//! Spawn → Shoot → Expose → Flood Fill → Collapse → Debris → Settle
//!
//! ```text
//! demolition [config.toml] [bake.json]
//! ```
//!
//! Without a bake file the scene is a lattice wall plus a pillar. The pillar
//! gets a band shot out of it so everything above the band falls.
//! `RUST_LOG` controls verbosity (default `info`).

use std::process::ExitCode;
use std::time::Instant;

use rubble::{DemolitionLoop, LoopConfig, QueuedImpact};
use rubble_core::{Transform, Vec3};
use rubble_destruction::{
    BakeData, DestructibleId, DestructibleWorld, DestructionConfig, DestructionResult,
    LatticeBaker, Viewer,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

const FRAME_DT: f32 = 1.0 / 60.0;
const MAX_FRAMES: u64 = 10_000;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();
}

/// A shot at the `z = depth` plane of a destructible, fired along +Z.
fn frontal_shot(target: DestructibleId, x: f32, y: f32, depth: f32, radius: f32) -> QueuedImpact {
    let point = Vec3::new(x, y, depth);
    QueuedImpact {
        target,
        point,
        radius,
        viewer: Viewer::new(Vec3::new(x, y, -3.0), Vec3::Z),
    }
}

/// Wall at the origin and a pillar beside it, both standing on y = 0.
fn spawn_scene(world: &mut DestructibleWorld) -> DestructionResult<Vec<QueuedImpact>> {
    let wall = world.spawn(LatticeBaker::new([12, 6, 1]).bake_box(|[_, y, _]| y == 0))?;
    let pillar = world.spawn(
        LatticeBaker::new([2, 8, 2])
            .transform(Transform::from_position(Vec3::new(16.0, 0.0, 0.0)))
            .color([180, 170, 150, 255])
            .bake_box(|[_, y, _]| y == 0),
    )?;

    let mut shots = Vec::new();

    // Pepper the wall
    for x in (1..12).step_by(2) {
        for y in (1..6).step_by(2) {
            shots.push(frontal_shot(wall, x as f32 + 0.5, y as f32 + 0.5, 0.0, 0.4));
        }
    }

    // Cut a band through the pillar at y = 3: front row, then back row
    for depth in [0.0, 1.0] {
        for x in [16.5, 17.5] {
            shots.push(frontal_shot(pillar, x, 3.5, depth, 0.3));
        }
    }

    Ok(shots)
}

/// Peppers a loaded bake along its bounds, front face only.
fn spawn_baked(world: &mut DestructibleWorld, bake: BakeData) -> DestructionResult<Vec<QueuedImpact>> {
    let id = world.spawn(bake)?;
    let Some(bounds) = world.get(id).map(|d| d.grid().bounds()) else {
        return Ok(Vec::new());
    };

    let steps = 6;
    let mut shots = Vec::with_capacity(steps * steps);
    for i in 0..steps {
        for j in 0..steps {
            let u = (i as f32 + 0.5) / steps as f32;
            let v = (j as f32 + 0.5) / steps as f32;
            let x = bounds.min.x + (bounds.max.x - bounds.min.x) * u;
            let y = bounds.min.y + (bounds.max.y - bounds.min.y) * v;
            shots.push(frontal_shot(id, x, y, bounds.min.z, 0.4));
        }
    }
    Ok(shots)
}

fn run() -> DestructionResult<()> {
    let mut args = std::env::args().skip(1);

    let config = match args.next() {
        Some(path) => {
            info!("Loading settings from {}", path);
            DestructionConfig::load(path)?
        }
        None => DestructionConfig::default(),
    };

    let mut world = DestructibleWorld::new(config)?;
    let shots = match args.next() {
        Some(path) => {
            info!("Loading bake data from {}", path);
            let bake = BakeData::load_json(path)?;
            spawn_baked(&mut world, bake)?
        }
        None => spawn_scene(&mut world)?,
    };

    for destructible in world.iter() {
        info!(
            "{:?}: {} voxels, {} anchors, {} triangles",
            destructible.id(),
            destructible.grid().len(),
            destructible.grid().anchors().len(),
            destructible.mesh().triangles().len() / 3
        );
    }

    let mut demolition = DemolitionLoop::new(
        world,
        LoopConfig {
            enable_timing_logs: true,
            ..LoopConfig::default()
        },
    );

    info!("Queueing {} impacts", shots.len());
    for shot in shots {
        demolition.queue_impact(shot);
    }

    let start = Instant::now();
    let frames = demolition.run_until_settled(FRAME_DT, MAX_FRAMES);
    info!(
        "Settled after {} frames ({:.1} ms wall clock)",
        frames,
        start.elapsed().as_secs_f64() * 1000.0
    );

    for destructible in demolition.world().iter() {
        info!(
            "{:?}: {:?}, {} of {} voxels remain, mesh revision {}",
            destructible.id(),
            destructible.state(),
            destructible.remaining(),
            destructible.grid().len(),
            destructible.mesh().revision()
        );
    }
    demolition.stats().log_summary();

    Ok(())
}

fn main() -> ExitCode {
    init_logging();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Demolition failed: {}", err);
            ExitCode::FAILURE
        }
    }
}
