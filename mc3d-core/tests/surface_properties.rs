//! End-to-end properties of the metaball and terrain surfaces

use std::collections::HashMap;

use approx::assert_relative_eq;
use mc3d_core::{
    Lattice, Metaball, MutableField, NoiseField, NoiseSettings, Ray, SphereField, SurfaceConfig,
    Terrain, TerrainConfig, TriangleSoup,
};
use nalgebra::{Point3, Vector3};

fn key(p: &Point3<f32>) -> [u32; 3] {
    [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
}

/// Count how many triangles use each undirected edge, skipping triangles
/// collapsed to a line or point
fn edge_usage(soup: &TriangleSoup) -> HashMap<([u32; 3], [u32; 3]), usize> {
    let mut edges = HashMap::new();
    for tri in soup.positions.chunks_exact(3) {
        let keys = [key(&tri[0]), key(&tri[1]), key(&tri[2])];
        if keys[0] == keys[1] || keys[1] == keys[2] || keys[0] == keys[2] {
            continue;
        }
        for (a, b) in [(0, 1), (1, 2), (2, 0)] {
            let edge = if keys[a] < keys[b] {
                (keys[a], keys[b])
            } else {
                (keys[b], keys[a])
            };
            *edges.entry(edge).or_insert(0) += 1;
        }
    }
    edges
}

fn sphere(size: f32, grid_size: f32, threshold: f32) -> Metaball {
    Metaball::with_config(
        SphereField::default(),
        SurfaceConfig {
            size,
            grid_size,
            threshold,
        },
    )
    .unwrap()
}

#[test]
fn metaball_is_closed_and_on_radius() {
    let metaball = sphere(1.3, 0.2, 1.0);
    let soup = metaball.surface().soup();
    assert!(soup.triangle_count() > 100);

    for position in &soup.positions {
        let r = nalgebra::distance(position, &Point3::origin());
        assert!((r - 1.0).abs() <= 0.2, "vertex at radius {}", r);
    }

    let edges = edge_usage(soup);
    assert!(!edges.is_empty());
    for (edge, count) in &edges {
        assert_eq!(*count, 2, "edge {:?} used {} times", edge, count);
    }
}

#[test]
fn metaball_normals_are_flat_per_triangle() {
    let metaball = sphere(1.3, 0.2, 1.0);
    let soup = metaball.surface().soup();
    assert_eq!(soup.positions.len(), soup.normals.len());
    for (positions, normals) in soup.positions.chunks_exact(3).zip(soup.normals.chunks_exact(3)) {
        let expected = (positions[1] - positions[0]).cross(&(positions[2] - positions[0]));
        assert!(normals.iter().all(|n| *n == expected));
    }
}

#[test]
fn metaball_default_grid() {
    let metaball = Metaball::new(1.2).unwrap();
    let surface = metaball.surface();
    assert_relative_eq!(surface.grid_size(), 0.1);
    assert_relative_eq!(surface.threshold(), 1.0);
    assert_eq!(metaball.center(), Point3::origin());
    for position in &surface.soup().positions {
        let r = nalgebra::distance(position, &Point3::origin());
        assert!((r - 1.0).abs() <= 0.1);
    }
}

#[test]
fn negative_threshold_yields_nothing() {
    // Distances are never negative, so no corner is ever inside
    let metaball = sphere(1.0, 0.25, -0.5);
    assert!(metaball.surface().soup().is_empty());
    assert!(metaball.surface().mesh().is_empty());
    assert!(metaball.surface().triangles().is_empty());
}

#[test]
fn regeneration_twice_is_identical() {
    let mut terrain = Terrain::new(TerrainConfig::default()).unwrap();
    let first = terrain.surface().soup().clone();
    terrain.surface_mut().regenerate().unwrap();
    assert_eq!(terrain.surface().soup(), &first);
}

#[test]
fn brush_changes_only_lattice_points_in_radius() {
    let lattice = Lattice::from_extent(10.0, 1.0).unwrap();
    let mut field = NoiseField::new(lattice, NoiseSettings::default());
    let before = field.values().to_vec();
    let center = Point3::new(5.0, 4.5, 5.0);
    let (radius, strength) = (2.0, -1.5);

    let changed = field.mutate(&center, radius, strength);
    assert!(changed > 0);

    for k in 0..10 {
        for j in 0..10 {
            for i in 0..10 {
                let index = lattice.flatten(i, j, k);
                let delta = field.values()[index] - before[index];
                if nalgebra::distance(&lattice.point(i, j, k), &center) <= radius {
                    assert_relative_eq!(delta, strength, epsilon = 1e-5);
                } else {
                    assert_eq!(delta, 0.0);
                }
            }
        }
    }
}

#[test]
fn terrain_edit_rebuilds_from_hit_point() {
    let mut terrain = Terrain::new(TerrainConfig {
        noise: NoiseSettings {
            amplitude: 0.0,
            ..NoiseSettings::default()
        },
        ..TerrainConfig::default()
    })
    .unwrap();
    terrain.set_strength(-3.0);
    let before = terrain.field().values().to_vec();

    let ray = Ray::new(Point3::new(4.2, 30.0, 4.7), Vector3::new(0.0, -1.0, 0.0));
    let expected_hit = terrain.surface().nearest_hit(&ray).unwrap().point;
    let outcome = terrain.update_weights(&ray).unwrap().unwrap();
    assert_eq!(outcome.hit_point, expected_hit);
    assert_eq!(outcome.triangles, terrain.surface().soup().triangle_count());
    assert_eq!(terrain.surface().mesh().triangle_count(), outcome.triangles);

    let lattice = *terrain.field().lattice();
    let mut changed = 0;
    for (index, (&after, &prior)) in terrain.field().values().iter().zip(&before).enumerate() {
        if after != prior {
            changed += 1;
            let i = index % 10;
            let j = (index / 10) % 10;
            let k = index / 100;
            let distance = nalgebra::distance(&lattice.point(i, j, k), &outcome.hit_point);
            assert!(distance <= terrain.brush_size());
        }
    }
    assert_eq!(changed, outcome.changed);
}

#[test]
fn terrain_config_from_json() {
    let config: TerrainConfig = serde_json::from_str(
        r#"{ "size": 6.0, "strength": -2.0, "noise": { "octaves": 3 } }"#,
    )
    .unwrap();
    assert_eq!(config.size, 6.0);
    assert_eq!(config.strength, -2.0);
    assert_eq!(config.noise.octaves, 3);
    assert_eq!(config.noise.frequency, 0.02);
    assert_eq!(config.grid_size, 1.0);
    assert!(!config.is_edit);

    let terrain = Terrain::new(config).unwrap();
    assert_eq!(terrain.field().lattice().dim(), 6);
    assert_eq!(terrain.config(), config);
}

#[test]
fn invalid_terrain_grid_is_an_error() {
    let config = TerrainConfig {
        grid_size: 0.0,
        ..TerrainConfig::default()
    };
    assert!(Terrain::new(config).is_err());
}
