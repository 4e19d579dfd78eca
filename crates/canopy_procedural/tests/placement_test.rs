//! # Placement Tests
//!
//! End-to-end properties of the two placement strategies and the bake
//! pipeline, exercised through the public API only.

use canopy_procedural::{
    bake, place_grid, place_scatter, CustomDataRanges, InstanceAttributes, InstanceDataset,
    PlacementConfig, PlacementContext, PlacementError, ScaleMode, ScaleSpec, ScatterExtent,
    ScatterSettings, SpawnRule, SplatMap, Terrain,
};
use canopy_shared::glam::Vec3;
use canopy_shared::unpack_scale;

fn square_terrain(size: f32, weights: [f32; 4]) -> Terrain {
    Terrain::new(
        Vec3::ZERO,
        Vec3::new(size, 50.0, size),
        SplatMap::uniform(33, 33, weights),
    )
}

/// Test: grid count is exactly ceil(sqrt(S*S*D/100))^2 with no jitter on any layer.
#[test]
fn test_grid_count_formula() {
    for (size, density) in [(64.0f32, 1.0f32), (100.0, 3.0), (250.0, 0.37), (10.0, 12.0)] {
        let terrain = square_terrain(size, [1.0, 0.0, 0.0, 0.0]);
        let mut ctx = PlacementContext::seeded(Some(&terrain), 1);
        let (arrays, report) = place_grid(
            &mut ctx,
            &[SpawnRule::new(SpawnRule::ANY_LAYER, density, 0.0)],
            &InstanceAttributes::default(),
        )
        .unwrap();

        let n = f64::from(size * size * density / 100.0).sqrt().ceil() as usize;
        println!("S={size} D={density}: expected {}x{n}, got {}", n, arrays.len());
        assert_eq!(arrays.len(), n * n);
        assert_eq!(report.accepted, n * n);
        assert_eq!(report.out_of_bounds, 0);
    }
}

/// Test: every jittered grid point stays within step * size * 0.5 * jitter of its corner.
#[test]
fn test_grid_jitter_bound() {
    let size = 120.0f32;
    let density = 2.0f32;
    let jitter = 0.6f32;
    let terrain = square_terrain(size, [1.0, 0.0, 0.0, 0.0]);
    let mut ctx = PlacementContext::seeded(Some(&terrain), 2);

    let (arrays, _) = place_grid(
        &mut ctx,
        &[SpawnRule::new(SpawnRule::ANY_LAYER, density, jitter)],
        &InstanceAttributes::default(),
    )
    .unwrap();

    let n = SpawnRule::new(-1, density, jitter).cells_per_axis(terrain.size);
    let step = 1.0 / n as f32;
    let bound = step * size * 0.5 * jitter + 1e-3;
    let mut max_seen = 0.0f32;

    for (i, p) in arrays.positions().iter().enumerate() {
        let corner_x = (i / n) as f32 * step * size;
        let corner_z = (i % n) as f32 * step * size;
        let dx = (p[0] - corner_x).abs();
        let dz = (p[2] - corner_z).abs();
        max_seen = max_seen.max(dx).max(dz);
        assert!(dx <= bound && dz <= bound, "instance {i} wandered ({dx}, {dz}) > {bound}");
        assert_eq!(p[1], 0.0);
    }
    println!("max jitter seen {max_seen:.3} of allowed {bound:.3}");
    assert!(max_seen > bound * 0.5, "jitter should actually spread points");
}

/// Test: LockXZ scale decodes with x == z exactly.
#[test]
fn test_lock_xz_survives_packing() {
    let terrain = square_terrain(50.0, [1.0, 0.0, 0.0, 0.0]);
    let mut ctx = PlacementContext::seeded(Some(&terrain), 3);
    let attributes = InstanceAttributes {
        scale: ScaleSpec {
            mode: ScaleMode::LockXz,
            min: [0.5, 1.0, 0.5],
            max: [2.5, 4.0, 2.5],
        },
        ..InstanceAttributes::default()
    };

    let (arrays, _) = place_grid(&mut ctx, &[SpawnRule::new(-1, 4.0, 0.5)], &attributes).unwrap();
    assert!(!arrays.is_empty());

    for p in arrays.positions() {
        let s = unpack_scale(p[3]);
        // x sits on the snapped low digit, z on an exact digit: compare levels
        assert!((s.x - s.z).abs() <= 7.0 / 255.0 * 4.0 + 1e-4, "x={} z={}", s.x, s.z);
        assert!(s.y >= 0.9 && s.y <= 4.05, "y={}", s.y);
    }
}

/// Test: scatter on a layer that never dominates stops at the attempt budget.
#[test]
fn test_scatter_exhausts_budget() {
    let terrain = square_terrain(100.0, [1.0, 0.2, 0.0, 0.0]);
    let mut ctx = PlacementContext::seeded(Some(&terrain), 4);
    let settings = ScatterSettings {
        target_count: 10,
        layer: 1,
        extent: None,
        attempt_budget: Some(5_000),
    };

    let err = place_scatter(&mut ctx, &settings, &InstanceAttributes::default()).unwrap_err();
    match err {
        PlacementError::ExhaustedAttempts {
            accepted,
            target,
            attempts,
        } => {
            assert_eq!(accepted, 0);
            assert_eq!(target, 10);
            assert_eq!(attempts, 5_000);
        }
        other => panic!("expected ExhaustedAttempts, got {other:?}"),
    }
}

/// Test: an invalid layer selector is reported, not clamped.
#[test]
fn test_invalid_layer_reported() {
    let terrain = square_terrain(10.0, [1.0, 0.0, 0.0, 0.0]);
    let mut ctx = PlacementContext::seeded(Some(&terrain), 5);
    let result = place_grid(&mut ctx, &[SpawnRule::new(7, 1.0, 0.0)], &InstanceAttributes::default());
    assert!(matches!(result, Err(PlacementError::InvalidLayer(7))));
}

/// Test: inverted attribute ranges are reported by both strategies instead of
/// reaching the random stream.
#[test]
fn test_inverted_attribute_ranges_rejected() {
    let terrain = square_terrain(20.0, [1.0, 0.0, 0.0, 0.0]);
    let mut ctx = PlacementContext::seeded(Some(&terrain), 8);
    let inverted_scale = InstanceAttributes {
        scale: ScaleSpec {
            mode: ScaleMode::Freeform,
            min: [2.0; 3],
            max: [1.0; 3],
        },
        ..InstanceAttributes::default()
    };

    let grid = place_grid(&mut ctx, &[SpawnRule::new(-1, 1.0, 0.0)], &inverted_scale);
    assert!(matches!(grid, Err(PlacementError::InvalidRange { what: "scale", axis: 0, .. })));

    let scatter = place_scatter(&mut ctx, &ScatterSettings::default(), &inverted_scale);
    assert!(matches!(scatter, Err(PlacementError::InvalidRange { what: "scale", .. })));

    let inverted_tint = InstanceAttributes {
        custom_data: Some(CustomDataRanges {
            g: [0.9, 0.1],
            ..CustomDataRanges::default()
        }),
        ..InstanceAttributes::default()
    };
    let grid = place_grid(&mut ctx, &[SpawnRule::new(-1, 1.0, 0.0)], &inverted_tint);
    assert!(matches!(
        grid,
        Err(PlacementError::InvalidRange { what: "custom data", axis: 1, .. })
    ));
}

/// Test: an inverted scatter extent is an error, not an empty sampling range.
#[test]
fn test_inverted_scatter_extent_rejected() {
    let terrain = square_terrain(20.0, [1.0, 0.0, 0.0, 0.0]);
    let mut ctx = PlacementContext::seeded(Some(&terrain), 9);
    let settings = ScatterSettings {
        target_count: 4,
        extent: Some(ScatterExtent {
            min: [5.0, 5.0],
            max: [1.0, 1.0],
        }),
        ..ScatterSettings::default()
    };

    let result = place_scatter(&mut ctx, &settings, &InstanceAttributes::default());
    assert!(matches!(
        result,
        Err(PlacementError::InvalidRange { what: "scatter extent", axis: 0, .. })
    ));
}

/// Test: a rule dense enough to blow past the grid cap fails instead of allocating.
#[test]
fn test_overdense_rule_rejected() {
    let terrain = square_terrain(1_000.0, [1.0, 0.0, 0.0, 0.0]);
    let mut ctx = PlacementContext::seeded(Some(&terrain), 10);
    let result = place_grid(
        &mut ctx,
        &[SpawnRule::new(-1, 1.0e6, 0.0)],
        &InstanceAttributes::default(),
    );
    assert!(matches!(result, Err(PlacementError::GridTooDense { .. })));
}

/// Test: a scale range above the codec ceiling fails the bake.
#[test]
fn test_oversized_scale_fails_bake() {
    let terrain = square_terrain(10.0, [1.0, 0.0, 0.0, 0.0]);
    let mut config = PlacementConfig::grid("giants", vec![SpawnRule::new(-1, 5.0, 0.0)]);
    config.seed = Some(6);
    config.scale = ScaleSpec {
        mode: ScaleMode::Uniform,
        min: [8.0; 3],
        max: [9.0; 3],
    };

    assert!(matches!(bake(&config, Some(&terrain)), Err(PlacementError::Codec(_))));
}

/// Test: a TOML-driven bake saves and loads back verbatim.
#[test]
fn test_bake_save_load() {
    let terrain = Terrain::new(
        Vec3::new(-40.0, 0.0, -40.0),
        Vec3::new(80.0, 20.0, 80.0),
        SplatMap::from_noise(64, 64, 3.0, canopy_procedural::NoiseSeed::new(11)),
    );
    let config = PlacementConfig::from_toml_str(
        r#"
        name = "meadow"
        seed = 21
        use_custom_data = true

        [scale]
        mode = "freeform"
        min = [0.5, 0.5, 0.5]
        max = [1.5, 2.0, 1.5]

        [[rules]]
        layer = 0
        density = 6.0
        jitter = 0.9

        [[rules]]
        layer = 1
        density = 2.0
        jitter = 0.4
        "#,
    )
    .unwrap();

    let dataset = bake(&config, Some(&terrain)).unwrap();
    println!("meadow: {} instances", dataset.instance_count());
    assert!(dataset.instance_count() > 0);
    assert!(dataset.has_custom_data());

    let path = std::env::temp_dir().join(format!("canopy_meadow_{}.cnpy", std::process::id()));
    dataset.save(&path).unwrap();
    let loaded = InstanceDataset::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded.name(), "meadow");
    assert_eq!(loaded.arrays(), dataset.arrays());
    assert_eq!(loaded.is_dirty(), dataset.is_dirty());
}
