//! # Visibility Tests
//!
//! Hand-placed instances at known distances from a synthetic camera, resolved
//! through the CPU classification device.
//!
//! Setup shared by most tests: 90 degree vertical fov (projection `[1][1]` is
//! 1), unit cube mesh (bounding radius `sqrt(0.75)`), screen sizes
//! `[0.5, 0.25, 0.1]` giving squared thresholds `[0.0625, 0.015625, 0.0025]`.
//! An instance at distance `d` has metric `(0.433 / d)^2`:
//!
//! - d = 1.5 → 0.0833 → LOD0
//! - d = 3.0 → 0.0208 → LOD1
//! - d = 8.0 → 0.0029 → LOD2

use canopy_procedural::{
    bake, InstanceArrays, InstanceDataset, PlacementConfig, SpawnRule, SplatMap, Terrain,
};
use canopy_rendering::{
    Camera, CpuClassificationDevice, FrameParams, LodLevel, MeshMetadata, Plane, ResolverConfig,
    ShadowRegionPlanes, SubmeshRange, SyncOutcome, VisibilityResolver,
};
use canopy_shared::glam::{Quat, Vec3};
use canopy_shared::pack_scale;

fn unit_cube_mesh() -> MeshMetadata {
    MeshMetadata::new(
        Vec3::ZERO,
        Vec3::splat(0.5),
        vec![
            LodLevel::new(0.5, vec![SubmeshRange::new(36, 0, 0), SubmeshRange::new(12, 36, 0)]),
            LodLevel::new(0.25, vec![SubmeshRange::new(24, 48, 24)]).with_motion_vectors(true),
            LodLevel::new(0.1, vec![SubmeshRange::new(6, 72, 40)]).with_shadows(false),
        ],
    )
    .unwrap()
}

fn camera() -> Camera {
    Camera::default()
        .with_fov(90.0)
        .with_viewport(1024, 1024)
        .with_clip(0.3, 500.0)
}

fn dataset_at(positions: &[Vec3]) -> InstanceDataset {
    let packed = pack_scale(Vec3::ONE).unwrap();
    let arrays = InstanceArrays::new(
        positions.iter().map(|p| [p.x, p.y, p.z, packed]).collect(),
        vec![[0.0, 0.0, 0.0, 1.0]; positions.len()],
        None,
    )
    .unwrap();
    InstanceDataset::with_arrays("hand placed", arrays)
}

fn resolver(config: ResolverConfig) -> VisibilityResolver<CpuClassificationDevice> {
    VisibilityResolver::new(CpuClassificationDevice::with_workers(2), unit_cube_mesh(), config).unwrap()
}

/// Test: three instances land in LOD0, LOD1 and LOD2 and every argument block
/// of a level carries that level's count.
#[test]
fn test_hand_placed_lod_counts() {
    let mut dataset = dataset_at(&[
        Vec3::new(0.0, 0.0, 1.5),
        Vec3::new(0.0, 0.0, 3.0),
        Vec3::new(0.0, 0.0, 8.0),
        // too small to reach LOD2
        Vec3::new(0.0, 0.0, 40.0),
        // behind the camera
        Vec3::new(0.0, 0.0, -4.0),
    ]);
    let mut resolver = resolver(ResolverConfig::default());
    assert_eq!(
        resolver.sync_instances(&mut dataset),
        SyncOutcome::FullUpload { instances: 5 }
    );
    assert!(!dataset.is_dirty());

    let draws = resolver.resolve_frame(&FrameParams::new(camera()));
    let counts: Vec<u32> = draws.main.iter().map(|d| d.args.instance_count).collect();
    println!("main blocks: {counts:?}");

    // LOD0 has two submeshes, both drawing the same instance
    assert_eq!(counts, vec![1, 1, 1, 1]);
    assert_eq!(draws.main[1].submesh, 1);
    assert_eq!(draws.main[1].args.index_count_per_instance, 12);
    assert_eq!(draws.main[3].args.start_index, 72);
    assert_eq!(draws.main[3].args.base_vertex, 40);

    let device = resolver.device();
    assert_eq!(device.main_instances(0), vec![0]);
    assert_eq!(device.main_instances(1), vec![1]);
    assert_eq!(device.main_instances(2), vec![2]);

    let stats = resolver.stats();
    assert_eq!(stats.instances, 5);
    assert_eq!(stats.visible(), 3);
    assert_eq!(stats.culled(), 2);
    assert_eq!(stats.workgroups, 1);
}

/// Test: shadow pass mirrors visible casters and skips non-casting LODs.
#[test]
fn test_shadow_pass_follows_lod_flags() {
    let mut dataset = dataset_at(&[
        Vec3::new(0.0, 0.0, 1.5),
        Vec3::new(0.0, 0.0, 3.0),
        Vec3::new(0.0, 0.0, 8.0),
        Vec3::new(0.0, 0.0, -3.0),
    ]);
    let mut resolver = resolver(ResolverConfig::default());
    resolver.sync_instances(&mut dataset);

    let region = ShadowRegionPlanes::new(&[Plane::from_normal_point(Vec3::Y, Vec3::new(0.0, -1.0, 0.0))]).unwrap();
    let draws = resolver.resolve_frame(&FrameParams::new(camera()).with_shadow_region(region));

    // LOD2 does not cast shadows, so only LOD0 and LOD1 blocks exist
    assert_eq!(draws.shadow.len(), 3);
    assert_eq!(draws.shadow_instances(0), 1);
    assert_eq!(draws.shadow_instances(1), 1);
    assert_eq!(draws.shadow_instances(2), 0);
    // culled instance ignored while the flag is off
    assert_eq!(resolver.device().shadow_instances(1), vec![1]);
}

/// Test: with cast_shadow_if_culled, frustum-culled instances inside the
/// shadow region cast at their distance LOD.
#[test]
fn test_shadow_pass_keeps_culled_casters() {
    let mut dataset = dataset_at(&[Vec3::new(0.0, 0.0, 1.5), Vec3::new(0.0, 0.0, -3.0), Vec3::new(0.0, -9.0, -3.0)]);
    let config = ResolverConfig {
        cast_shadow_if_culled: true,
        ..ResolverConfig::default()
    };
    let mut resolver = resolver(config);
    resolver.sync_instances(&mut dataset);

    let region = ShadowRegionPlanes::new(&[Plane::from_normal_point(Vec3::Y, Vec3::new(0.0, -1.0, 0.0))]).unwrap();
    let draws = resolver.resolve_frame(&FrameParams::new(camera()).with_shadow_region(region));

    assert_eq!(draws.main_instances(0), 1);
    assert_eq!(draws.main_instances(1), 0);
    assert_eq!(draws.shadow_instances(0), 1);
    assert_eq!(draws.shadow_instances(1), 1, "instance behind the camera still casts");
    assert_eq!(resolver.device().shadow_instances(1), vec![1]);

    // an empty region admits nothing extra
    let draws = resolver.resolve_frame(&FrameParams::new(camera()));
    assert_eq!(draws.shadow_instances(1), 0);
}

/// Test: no shadow dispatch when LOD0 does not cast shadows.
#[test]
fn test_shadow_pass_skipped_without_lod0_casters() {
    let mesh = MeshMetadata::new(
        Vec3::ZERO,
        Vec3::splat(0.5),
        vec![LodLevel::new(0.5, vec![SubmeshRange::new(36, 0, 0)]).with_shadows(false)],
    )
    .unwrap();
    let mut resolver =
        VisibilityResolver::new(CpuClassificationDevice::with_workers(1), mesh, ResolverConfig::default()).unwrap();
    let mut dataset = dataset_at(&[Vec3::new(0.0, 0.0, 1.5)]);
    resolver.sync_instances(&mut dataset);

    let draws = resolver.resolve_frame(&FrameParams::new(camera()));
    assert_eq!(draws.main_instances(0), 1);
    assert!(draws.shadow.is_empty());
    assert_eq!(resolver.stats().counters.shadow_total(), 0);
}

/// Test: scale edits travel as a patch and move the instance to a finer LOD.
#[test]
fn test_modified_instances_are_patched() {
    let mut dataset = dataset_at(&[Vec3::new(0.0, 0.0, 1.5), Vec3::new(0.0, 0.0, 8.0)]);
    let mut resolver = resolver(ResolverConfig::default());
    resolver.sync_instances(&mut dataset);
    assert_eq!(resolver.sync_instances(&mut dataset), SyncOutcome::Unchanged);

    let before = resolver.resolve_frame(&FrameParams::new(camera()));
    assert_eq!(before.main_instances(2), 1);

    // radius x3 at d = 8: metric (1.3 / 8)^2 = 0.026 → LOD1
    dataset.modify_scale(1, Vec3::splat(3.0)).unwrap();
    assert_eq!(
        resolver.sync_instances(&mut dataset),
        SyncOutcome::Patched { instances: 1 }
    );
    assert!(dataset.modified().is_empty());

    let after = resolver.resolve_frame(&FrameParams::new(camera()));
    assert_eq!(after.main_instances(1), 1);
    assert_eq!(after.main_instances(2), 0);
    assert_eq!(resolver.device().instance_uploads(), 1);
    assert_eq!(resolver.stats().patched_instances, 1);
}

/// Test: a dirty dataset is re-uploaded in full even with pending edits.
#[test]
fn test_dirty_dataset_reuploads() {
    let mut dataset = dataset_at(&[Vec3::new(0.0, 0.0, 1.5)]);
    let mut resolver = resolver(ResolverConfig::default());
    resolver.sync_instances(&mut dataset);

    dataset.mark_modified(0).unwrap();
    dataset.mark_dirty();
    assert_eq!(
        resolver.sync_instances(&mut dataset),
        SyncOutcome::FullUpload { instances: 1 }
    );
    assert!(dataset.modified().is_empty());
    assert_eq!(resolver.device().instance_uploads(), 2);
}

/// Test: exactly one frame of view-projection history.
#[test]
fn test_previous_view_projection() {
    let mut resolver = resolver(ResolverConfig::default());
    let first_camera = camera();
    let second_camera = Camera::new(Vec3::new(0.0, 0.0, -1.0), Quat::IDENTITY)
        .with_fov(90.0)
        .with_viewport(1024, 1024)
        .with_clip(0.3, 500.0);
    let third_camera = Camera::new(Vec3::new(2.0, 0.0, -1.0), Quat::IDENTITY)
        .with_fov(90.0)
        .with_viewport(1024, 1024)
        .with_clip(0.3, 500.0);

    let first = resolver.resolve_frame(&FrameParams::new(first_camera));
    assert_eq!(first.previous_view_projection, first.view_projection);

    let second = resolver.resolve_frame(&FrameParams::new(second_camera));
    assert_eq!(second.previous_view_projection, first.view_projection);

    let third = resolver.resolve_frame(&FrameParams::new(third_camera));
    assert_eq!(third.previous_view_projection, second.view_projection);
    assert_ne!(third.previous_view_projection, first.view_projection);
}

/// Test: motion-vector draws exist only for LODs that request them and share
/// the main counts.
#[test]
fn test_motion_vector_draws() {
    let mut dataset = dataset_at(&[Vec3::new(0.0, 0.0, 3.0), Vec3::new(0.1, 0.0, 3.0)]);
    let mut resolver = resolver(ResolverConfig::default());
    resolver.sync_instances(&mut dataset);

    let draws = resolver.resolve_frame(&FrameParams::new(camera()));
    assert_eq!(draws.motion_vectors.len(), 1);
    assert_eq!(draws.motion_vectors[0].lod, 1);
    assert_eq!(draws.motion_vectors[0].args.instance_count, 2);
}

/// Test: a baked grid population resolves with every instance accounted for.
#[test]
fn test_baked_population_end_to_end() {
    let terrain = Terrain::new(
        Vec3::new(-50.0, 0.0, 0.0),
        Vec3::new(100.0, 10.0, 100.0),
        SplatMap::uniform(17, 17, [1.0, 0.0, 0.0, 0.0]),
    );
    let mut config = PlacementConfig::grid("meadow", vec![SpawnRule::new(0, 4.0, 0.5)]);
    config.seed = Some(11);
    let mut dataset = bake(&config, Some(&terrain)).unwrap();
    let total = dataset.instance_count();
    assert!(total > 256, "needs several workgroups, got {total}");

    let mut resolver = resolver(ResolverConfig::default());
    resolver.sync_instances(&mut dataset);
    let eye = Camera::new(Vec3::new(0.0, 2.0, -5.0), Quat::IDENTITY)
        .with_fov(60.0)
        .with_viewport(1920, 1080)
        .with_clip(0.3, 80.0);
    let draws = resolver.resolve_frame(&FrameParams::new(eye));

    let stats = resolver.stats();
    println!(
        "{} instances, {} visible, main per LOD {:?}",
        total,
        stats.visible(),
        stats.counters.main
    );
    assert_eq!(stats.instances as usize, total);
    assert_eq!(stats.workgroups as usize, total.div_ceil(256));
    assert!(stats.visible() > 0);
    assert!(stats.visible() < total as u32, "far clip and side planes cull part of the field");
    assert_eq!(
        draws.main_instances(0) + draws.main_instances(1) + draws.main_instances(2),
        stats.visible()
    );
}
