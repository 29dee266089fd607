//! Integration tests for whole damage passes through `DestructibleWorld`.

use rubble_core::Vec3;
use rubble_destruction::{
    DamageOutcome, DamageProcessor, DamageReport, Destructible, DestructibleId,
    DestructibleState, DestructibleWorld, DestructionConfig, DestructionEvent, Face, Impact,
    LatticeBaker, LayerMask, ProbeCollider, ProxyHit, ProxyLink, ProxyPools, Viewer, VoxelId,
    VoxelProbe,
};

/// Hits the voxel column at (`x`, `z`) from straight above, landing on `top_y`.
fn hit_from_above(
    world: &mut DestructibleWorld,
    id: DestructibleId,
    x: f32,
    z: f32,
    top_y: f32,
) -> DamageOutcome {
    let point = Vec3::new(x + 0.5, top_y, z + 0.5);
    let viewer = Viewer::looking_at(point + Vec3::new(0.0, 4.0, 0.0), point);
    world.take_damage_probed(id, point, 0.1, viewer).unwrap()
}

fn applied(outcome: &DamageOutcome) -> &DamageReport {
    outcome.report().expect("impact should resolve a contact")
}

/// Index buffer length implied by the grid's face bits.
fn expected_indices(destructible: &Destructible) -> usize {
    destructible
        .grid()
        .iter()
        .filter(|(_, v)| v.is_rendered())
        .map(|(_, v)| v.draw_faces.count() as usize * 6)
        .sum()
}

#[test]
fn test_center_hit_on_flat_slab() {
    let mut world = DestructibleWorld::new(DestructionConfig::default()).unwrap();
    // 3x3 slab lying flat, anchored along z = 0: min_voxel_count = 6
    let id = world
        .spawn(LatticeBaker::new([3, 1, 3]).bake_box(|[_, _, z]| z == 0))
        .unwrap();
    assert_eq!(world.pools().visible().active_count(), 9);

    let outcome = hit_from_above(&mut world, id, 1.0, 1.0, 1.0);
    let report = applied(&outcome);
    assert_eq!(report.voxels_hit, 1);
    assert_eq!(report.voxels_exposed, 0);
    assert_eq!(report.floating_separated, 0);
    assert!(!report.collapsed);

    let slab = world.get(id).unwrap();
    let grid = slab.grid();
    assert_eq!(slab.remaining(), 8);
    assert_eq!(slab.state(), DestructibleState::Damaged);
    assert!(grid[VoxelId::new(4)].is_separated);

    // Every horizontal neighbor now draws the face that touched the center
    assert!(grid[VoxelId::new(3)].draw_faces.contains(Face::Right));
    assert!(grid[VoxelId::new(5)].draw_faces.contains(Face::Left));
    assert!(grid[VoxelId::new(1)].draw_faces.contains(Face::Back));
    assert!(grid[VoxelId::new(7)].draw_faces.contains(Face::Front));
    assert!(grid.face_visibility_holds());

    assert_eq!(slab.mesh().triangles().len(), expected_indices(slab));
    assert_eq!(world.pools().visible().active_count(), 8);
    assert_eq!(world.pools().debris().active_count(), 1);
}

#[test]
fn test_hidden_core_is_exposed_by_top_hit() {
    let mut world = DestructibleWorld::new(DestructionConfig::default()).unwrap();
    let events = world.events();
    let id = world
        .spawn(LatticeBaker::new([3, 3, 3]).bake_box(|[_, y, _]| y == 0))
        .unwrap();
    let core = VoxelId::new(13);
    assert!(!world.get(id).unwrap().grid()[core].is_exposed);

    let outcome = hit_from_above(&mut world, id, 1.0, 1.0, 3.0);
    let report = applied(&outcome);
    assert_eq!(report.voxels_hit, 1);
    assert_eq!(report.voxels_exposed, 1);

    let cube = world.get(id).unwrap();
    let voxel = &cube.grid()[core];
    assert!(voxel.is_exposed);
    assert!(voxel.draw_faces.contains(Face::Top));
    assert!(matches!(voxel.proxy, Some(ProxyLink::Visible(_))));
    assert_eq!(cube.remaining(), 26);

    let drained = events.drain();
    assert!(drained.contains(&DestructionEvent::VoxelExposed {
        destructible: id,
        voxel: core,
    }));
    assert!(drained
        .iter()
        .any(|e| matches!(e, DestructionEvent::MeshRebuilt { destructible, .. } if *destructible == id)));
}

#[test]
fn test_collapse_when_connected_count_drops_below_threshold() {
    let mut world = DestructibleWorld::new(DestructionConfig::default()).unwrap();
    let events = world.events();
    // 10 voxels, 2 anchors, margin 2.0: min_voxel_count = 4
    let id = world
        .spawn(LatticeBaker::new([10, 1, 1]).bake_box(|[x, _, _]| x < 2))
        .unwrap();
    assert_eq!(world.get(id).unwrap().min_voxel_count(), 4);

    for x in (4..10).rev() {
        let outcome = hit_from_above(&mut world, id, x as f32, 0.0, 1.0);
        assert!(!applied(&outcome).collapsed);
        assert_eq!(world.get(id).unwrap().remaining(), x);
    }

    // 4 -> 3 crosses the threshold
    let outcome = hit_from_above(&mut world, id, 3.0, 0.0, 1.0);
    let report = applied(&outcome);
    assert!(report.collapsed);
    assert!(report.destroyed);
    assert!(world.get(id).is_none());
    assert_eq!(world.pools().visible().active_count(), 0);
    assert_eq!(world.pools().debris().active_count(), 10);

    let drained = events.drain();
    assert!(drained.contains(&DestructionEvent::Collapsed {
        destructible: id,
        voxels_launched: 3,
    }));
    assert!(drained.contains(&DestructionEvent::Destroyed { destructible: id }));
}

#[test]
fn test_cut_bridge_drops_far_cluster_in_one_pass() {
    let mut world = DestructibleWorld::new(DestructionConfig::default()).unwrap();
    // Anchored cluster x = 0..=2, bridge x = 3..=4, loose cluster x = 5..=7
    let id = world
        .spawn(LatticeBaker::new([8, 1, 1]).bake_box(|[x, _, _]| x == 0))
        .unwrap();

    let outcome = hit_from_above(&mut world, id, 3.0, 0.0, 1.0);
    let report = applied(&outcome);
    assert_eq!(report.voxels_hit, 1);
    assert_eq!(report.floating_separated, 4);
    assert_eq!(report.floating_islands, 1);
    assert_eq!(report.debris_launched, 5);
    assert!(!report.collapsed);

    let row = world.get(id).unwrap();
    assert_eq!(row.remaining(), 3);
    for x in 3..8 {
        assert!(row.grid()[VoxelId::new(x)].is_separated);
    }
    assert!(row.grid()[VoxelId::new(2)].draw_faces.contains(Face::Right));
    assert!(row.grid().face_visibility_holds());
    assert_eq!(row.grid().bounds().max.x, 3.0);
}

#[test]
fn test_missed_impact_changes_nothing() {
    let mut world = DestructibleWorld::new(DestructionConfig::default()).unwrap();
    let events = world.events();
    let id = world
        .spawn(LatticeBaker::new([3, 1, 3]).bake_box(|[_, _, z]| z == 0))
        .unwrap();
    events.drain();

    let before = world.get(id).unwrap();
    let revision = before.mesh().revision();
    let triangles = before.mesh().triangles().to_vec();
    let faces: Vec<_> = before.grid().iter().map(|(_, v)| v.draw_faces).collect();

    let far = Vec3::new(100.0, 100.0, 100.0);
    let viewer = Viewer::new(far - Vec3::Z * 2.0, Vec3::Z);
    for _ in 0..2 {
        let outcome = world.take_damage_probed(id, far, 1.0, viewer).unwrap();
        assert_eq!(outcome, DamageOutcome::NoContact);
    }

    let after = world.get(id).unwrap();
    assert_eq!(after.mesh().revision(), revision);
    assert_eq!(after.mesh().triangles(), triangles.as_slice());
    assert_eq!(after.remaining(), 9);
    assert_eq!(after.state(), DestructibleState::Intact);
    assert_eq!(
        after.grid().iter().map(|(_, v)| v.draw_faces).collect::<Vec<_>>(),
        faces
    );
    assert_eq!(world.pools().visible().active_count(), 9);
    assert_eq!(world.pools().debris().active_count(), 0);
    assert!(!events.has_events());
}

#[test]
fn test_debris_settles_and_unlinks() {
    let config = DestructionConfig::default();
    let lifetime = config.debris_lifetime_secs;
    let mut world = DestructibleWorld::new(config).unwrap();
    let events = world.events();
    let id = world
        .spawn(LatticeBaker::new([3, 1, 3]).bake_box(|[_, _, z]| z == 0))
        .unwrap();

    hit_from_above(&mut world, id, 1.0, 1.0, 1.0);
    let center = VoxelId::new(4);
    assert!(matches!(
        world.get(id).unwrap().grid()[center].proxy,
        Some(ProxyLink::Debris(_))
    ));

    assert_eq!(world.tick(lifetime * 0.5), 0);
    assert_eq!(world.tick(lifetime), 1);
    assert_eq!(world.get(id).unwrap().grid()[center].proxy, None);
    assert_eq!(world.pools().debris().active_count(), 0);
    assert!(events.drain().contains(&DestructionEvent::DebrisSettled {
        destructible: id,
        voxel: center,
    }));
}

#[test]
fn test_same_seed_same_debris() {
    let run = || {
        let mut world = DestructibleWorld::new(DestructionConfig::default()).unwrap();
        let events = world.events();
        let id = world
            .spawn(LatticeBaker::new([8, 1, 1]).bake_box(|[x, _, _]| x == 0))
            .unwrap();
        hit_from_above(&mut world, id, 3.0, 0.0, 1.0);
        events
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                DestructionEvent::DebrisLaunched { impulse, .. } => Some(impulse),
                _ => None,
            })
            .collect::<Vec<_>>()
    };

    let first = run();
    assert_eq!(first.len(), 5);
    assert_eq!(first, run());
}

#[test]
fn test_exhausted_pools_keep_grid_consistent() {
    let config = DestructionConfig::default();
    let bake = LatticeBaker::new([3, 3, 3]).bake_box(|[_, y, _]| y == 0);
    let mut cube = Destructible::new(DestructibleId::new(0), bake, &config).unwrap();
    let mut pools = ProxyPools::new(0, 0, 1.0);
    let mut processor = DamageProcessor::new(&config);

    let mut probe = VoxelProbe::new();
    for (voxel, v) in cube.grid().iter() {
        if v.is_rendered() {
            probe.insert(ProbeCollider {
                aabb: cube.grid().voxel_aabb(voxel).unwrap(),
                layers: LayerMask::ALL,
                hit: ProxyHit {
                    destructible: cube.id(),
                    voxel,
                },
            });
        }
    }

    let point = Vec3::new(1.5, 3.0, 1.5);
    let impact = Impact {
        point,
        radius: 0.1,
        viewer: Viewer::looking_at(point + Vec3::Y * 4.0, point),
    };
    let outcome = cube.take_damage(&impact, &probe, &mut processor, &mut pools, None);
    let report = applied(&outcome);

    // One visible checkout for the core, one debris checkout for the hit
    assert_eq!(report.pool_misses, 2);
    assert_eq!(report.debris_launched, 0);
    assert_eq!(cube.remaining(), 26);
    assert!(cube.grid()[VoxelId::new(13)].is_exposed);
    assert_eq!(cube.grid()[VoxelId::new(13)].proxy, None);
    assert!(cube.grid().face_visibility_holds());
    assert_eq!(cube.mesh().triangles().len(), expected_indices(&cube));
}

#[test]
fn test_core_exposed_into_full_pool_is_still_hittable() {
    // Exactly enough visible proxies for the 26 surface voxels
    let config = DestructionConfig {
        visible_pool_capacity: 26,
        ..DestructionConfig::default()
    };
    let mut world = DestructibleWorld::new(config).unwrap();
    let id = world
        .spawn(LatticeBaker::new([3, 3, 3]).bake_box(|[_, y, _]| y == 0))
        .unwrap();
    assert_eq!(world.pools().visible().free_count(), 0);
    let core = VoxelId::new(13);

    // The core is exposed before the top voxel gives its slot back
    let outcome = hit_from_above(&mut world, id, 1.0, 1.0, 3.0);
    let report = applied(&outcome);
    assert_eq!(report.voxels_hit, 1);
    assert_eq!(report.voxels_exposed, 1);
    assert_eq!(report.pool_misses, 1);
    assert_eq!(report.proxies_rebound, 1);

    let cube = world.get(id).unwrap();
    assert!(cube.grid()[core].is_exposed);
    assert!(matches!(cube.grid()[core].proxy, Some(ProxyLink::Visible(_))));
    assert!(!cube.has_unbound_voxels());
    assert_eq!(world.pools().visible().active_count(), 26);

    // Through the hole, straight onto the core
    let outcome = hit_from_above(&mut world, id, 1.0, 1.0, 2.0);
    assert_eq!(applied(&outcome).voxels_hit, 1);
    let cube = world.get(id).unwrap();
    assert!(cube.grid()[core].is_separated);
    assert_eq!(cube.remaining(), 25);
}

#[test]
fn test_freed_slots_go_to_other_destructibles() {
    let config = DestructionConfig {
        visible_pool_capacity: 27,
        ..DestructionConfig::default()
    };
    let mut world = DestructibleWorld::new(config).unwrap();
    let cube = world
        .spawn(LatticeBaker::new([3, 3, 3]).bake_box(|[_, y, _]| y == 0))
        .unwrap();
    let bar = world
        .spawn(LatticeBaker::new([2, 1, 1]).bake_box(|_| true))
        .unwrap();
    assert!(world.get(bar).unwrap().has_unbound_voxels());
    assert_eq!(world.pools().visible().active_count(), 27);

    assert!(world.remove(cube).is_some());
    let bar = world.get(bar).unwrap();
    assert!(!bar.has_unbound_voxels());
    assert!(bar
        .grid()
        .iter()
        .all(|(_, v)| matches!(v.proxy, Some(ProxyLink::Visible(_)))));
    assert_eq!(world.pools().visible().active_count(), 2);
}

#[test]
fn test_unsubscribed_world_never_fills_the_bus() {
    let config = DestructionConfig {
        event_capacity: 1,
        ..DestructionConfig::default()
    };
    let mut world = DestructibleWorld::new(config).unwrap();
    let id = world
        .spawn(LatticeBaker::new([3, 1, 3]).bake_box(|[_, _, z]| z == 0))
        .unwrap();

    hit_from_above(&mut world, id, 1.0, 1.0, 1.0);
    world.tick(60.0);
    assert_eq!(world.dropped_events(), 0);

    // Once subscribed, a single-slot bus overflows on the next pass
    let events = world.events();
    hit_from_above(&mut world, id, 0.0, 2.0, 1.0);
    assert_eq!(events.drain().len(), 1);
    assert!(world.dropped_events() > 0);
}
