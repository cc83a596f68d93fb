//! Skinning tests
//!
//! Tests for:
//! - Partition blending: identity map, first partition wins, missing bones
//! - Flat bone-weight blending
//! - Skin instance reading and skinned meshes inside a scene

use glam::{Mat3, Vec3};
use nifview::assets::{Block, BlockGraph, BlockId, Compound, FileVersion, Value};
use nifview::renderer::NullTextureCache;
use nifview::scene::skin::{blend_bone_weights, blend_partitions};
use nifview::scene::{BoneWeights, BoundSphere, Scene, SkinPartition, Transform, VertexStreams, VertexWeight, ViewerSettings};

const EPSILON: f32 = 1e-4;

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    a.abs_diff_eq(b, EPSILON)
}

fn grid(n: usize) -> VertexStreams {
    VertexStreams {
        positions: (0..n).map(|i| Vec3::new(i as f32, (i % 7) as f32, 1.0)).collect(),
        normals: vec![Vec3::Z; n],
        tangents: Vec::new(),
        bitangents: Vec::new(),
    }
}

fn single_bone_partition(vertex_map: Vec<u32>, bone: u32) -> SkinPartition {
    let n = vertex_map.len();
    SkinPartition {
        weights_per_vertex: 1,
        vertex_map,
        bone_map: vec![bone],
        weights: vec![(0, 1.0); n],
        ..SkinPartition::default()
    }
}

// ============================================================================
// Partitions
// ============================================================================

#[test]
fn identity_partition_reproduces_input() {
    let input = grid(100);
    let part = single_bone_partition((0..100).collect(), 0);
    let out = blend_partitions(&input, &[part], &[Transform::IDENTITY], Transform::IDENTITY);

    assert_eq!(out.positions.len(), 100);
    for (a, b) in out.positions.iter().zip(&input.positions) {
        assert!(vec3_approx(*a, *b));
    }
    for n in &out.normals {
        assert!((n.length() - 1.0).abs() < EPSILON);
    }
    assert!(out.tangents.is_empty());

    let skinned = BoundSphere::from_points(&out.positions);
    let source = BoundSphere::from_points(&input.positions);
    assert!(vec3_approx(skinned.center, source.center));
    assert!((skinned.radius - source.radius).abs() < EPSILON);
}

#[test]
fn first_partition_wins_per_vertex() {
    let input = grid(4);
    let first = single_bone_partition(vec![0, 1], 0);
    let second = single_bone_partition(vec![1, 2, 3], 1);
    let bones = [
        Transform::from_translation(Vec3::new(10.0, 0.0, 0.0)),
        Transform::from_translation(Vec3::new(0.0, 10.0, 0.0)),
    ];
    let out = blend_partitions(&input, &[first, second], &bones, Transform::IDENTITY);

    assert!(vec3_approx(out.positions[1], input.positions[1] + Vec3::new(10.0, 0.0, 0.0)));
    assert!(vec3_approx(out.positions[2], input.positions[2] + Vec3::new(0.0, 10.0, 0.0)));
}

#[test]
fn bone_past_the_list_uses_fallback() {
    let input = grid(2);
    let part = single_bone_partition(vec![0, 1], 5);
    let fallback = Transform::from_translation(Vec3::new(0.0, 0.0, -3.0));
    let out = blend_partitions(&input, &[part], &[Transform::IDENTITY], fallback);
    assert!(vec3_approx(out.positions[0], input.positions[0] + Vec3::new(0.0, 0.0, -3.0)));
}

#[test]
fn vertex_map_past_vertex_count_ends_partition() {
    let input = grid(3);
    let part = single_bone_partition(vec![0, 9, 1], 0);
    let out = blend_partitions(&input, &[part], &[Transform::IDENTITY], Transform::IDENTITY);
    assert!(vec3_approx(out.positions[0], input.positions[0]));
    // never reached
    assert!(vec3_approx(out.positions[1], Vec3::ZERO));
}

#[test]
fn rotated_bone_keeps_unit_normals() {
    let input = grid(10);
    let part = single_bone_partition((0..10).collect(), 0);
    let bone = Transform::new(Mat3::from_rotation_x(0.9), Vec3::ZERO, 3.0);
    let out = blend_partitions(&input, &[part], &[bone], Transform::IDENTITY);
    for n in &out.normals {
        assert!((n.length() - 1.0).abs() < EPSILON);
    }
}

// ============================================================================
// Flat weights
// ============================================================================

fn weights(bone: Option<BlockId>, list: &[(u32, f32)]) -> BoneWeights {
    BoneWeights {
        bone,
        trans: Transform::IDENTITY,
        center: Vec3::ZERO,
        radius: 0.0,
        tcenter: Vec3::ZERO,
        weights: list.iter().map(|&(vertex, weight)| VertexWeight { vertex, weight }).collect(),
    }
}

#[test]
fn flat_weights_blend_between_bones() {
    let input = grid(1);
    let bones = [weights(None, &[(0, 0.5)]), weights(None, &[(0, 0.5)])];
    let trans = [
        Transform::from_translation(Vec3::new(2.0, 0.0, 0.0)),
        Transform::from_translation(Vec3::new(-2.0, 0.0, 0.0)),
    ];
    let out = blend_bone_weights(&input, &bones, &trans);
    assert!(vec3_approx(out.positions[0], input.positions[0]));
}

#[test]
fn flat_weight_out_of_range_stops_the_list() {
    let input = grid(2);
    let bones = [weights(None, &[(0, 1.0), (7, 1.0), (1, 1.0)])];
    let out = blend_bone_weights(&input, &bones, &[Transform::IDENTITY]);
    assert!(vec3_approx(out.positions[0], input.positions[0]));
    assert!(vec3_approx(out.positions[1], Vec3::ZERO));
}

// ============================================================================
// Skinned mesh in a scene
// ============================================================================

/// Root node with a bone child and a skinned shape; the bone is moved up by
/// `lift` and every vertex is fully weighted to it.
fn skinned_graph(lift: f32) -> (BlockGraph, BlockId) {
    skinned_graph_with(lift, Vec3::ZERO, true)
}

/// One bone skinning a triangle. `bind` is the bone's bind translation; the
/// bone node is only placed under the skeleton root when `bone_in_tree` is set.
fn skinned_graph_with(lift: f32, bind: Vec3, bone_in_tree: bool) -> (BlockGraph, BlockId) {
    let mut g = BlockGraph::new(FileVersion::new(0x1400_0005, 0, 0));

    let data = g.add(Block::new("NiTriShapeData").with(
        "Vertices",
        Value::Array(vec![
            Value::Vector3(Vec3::ZERO),
            Value::Vector3(Vec3::X),
            Value::Vector3(Vec3::Y),
        ]),
    ));
    let bone = g.add(
        Block::new("NiNode")
            .with("Name", Value::String("Bone".into()))
            .with("Translation", Value::Vector3(Vec3::new(0.0, lift, 0.0))),
    );
    let entry = Compound::new()
        .with("Translation", Value::Vector3(bind))
        .with(
            "Bounding Sphere",
            Value::Compound(
                Compound::new()
                    .with("Center", Value::Vector3(Vec3::X))
                    .with("Radius", Value::Float(1.0)),
            ),
        )
        .with(
            "Vertex Weights",
            Value::Array(
                (0..3)
                    .map(|i| {
                        Value::Compound(
                            Compound::new()
                                .with("Index", Value::Count(i))
                                .with("Weight", Value::Float(1.0)),
                        )
                    })
                    .collect(),
            ),
        );
    let skin_data = g.add(
        Block::new("NiSkinData")
            .with("Has Vertex Weights", Value::Bool(true))
            .with("Bone List", Value::Array(vec![Value::Compound(entry)])),
    );
    let root = g.add(Block::new("NiNode").with("Name", Value::String("Root".into())));
    let skin = g.add(
        Block::new("NiSkinInstance")
            .with("Data", Value::Link(Some(skin_data)))
            .with("Skeleton Root", Value::Ptr(Some(root)))
            .with("Bones", Value::Array(vec![Value::Ptr(Some(bone))])),
    );
    let shape = g.add(
        Block::new("NiTriShape")
            .with("Data", Value::Link(Some(data)))
            .with("Skin Instance", Value::Link(Some(skin))),
    );
    let children = if bone_in_tree { vec![bone, shape] } else { vec![shape] };
    g.set(
        root,
        "Children",
        Value::Array(children.into_iter().map(|c| Value::Link(Some(c))).collect()),
    )
    .expect("root exists");
    g.add_root(root);
    (g, shape)
}

#[test]
fn skinned_mesh_follows_its_bone() {
    let (g, shape) = skinned_graph(5.0);
    let mut scene = Scene::from_settings(&ViewerSettings::default(), Box::new(NullTextureCache));
    scene.make(&g);
    scene.transform(Transform::IDENTITY, 0.0);

    let key = scene.node_for_block(shape).expect("shape node");
    let mesh = scene.node(key).and_then(|n| n.mesh()).expect("mesh");
    assert!(!mesh.is_rigid());
    assert!(vec3_approx(mesh.transformed().positions[1], Vec3::new(1.0, 5.0, 0.0)));
}

#[test]
fn skinning_can_be_switched_off() {
    let (g, shape) = skinned_graph(5.0);
    let mut settings = ViewerSettings::default();
    settings.options.remove(nifview::SceneOptions::DO_SKINNING);
    let mut scene = Scene::from_settings(&settings, Box::new(NullTextureCache));
    scene.make(&g);
    scene.transform(Transform::IDENTITY, 0.0);

    let key = scene.node_for_block(shape).expect("shape node");
    let mesh = scene.node(key).and_then(|n| n.mesh()).expect("mesh");
    assert!(mesh.is_rigid());
    assert!(vec3_approx(mesh.transformed().positions[1], Vec3::X));
}

#[test]
fn skinned_bound_is_in_mesh_space() {
    let (g, shape) = skinned_graph(5.0);
    let mut scene = Scene::from_settings(&ViewerSettings::default(), Box::new(NullTextureCache));
    scene.make(&g);
    let view = Transform::from_translation(Vec3::new(0.0, 0.0, -20.0));
    scene.transform(view, 0.0);

    let key = scene.node_for_block(shape).expect("shape node");
    let mesh = scene.node(key).and_then(|n| n.mesh()).expect("mesh");
    let bound = mesh.local_bound();
    // the view offset is removed again
    assert!((bound.center.z).abs() < EPSILON);
    assert!((bound.center.y - (5.0 + 1.0 / 3.0)).abs() < EPSILON);
}

#[test]
fn bone_outside_skeleton_ignores_bind() {
    let (g, shape) = skinned_graph_with(5.0, Vec3::new(0.0, 0.0, 7.0), false);
    let mut scene = Scene::from_settings(&ViewerSettings::default(), Box::new(NullTextureCache));
    scene.make(&g);
    scene.transform(Transform::IDENTITY, 0.0);

    let key = scene.node_for_block(shape).expect("shape node");
    let mesh = scene.node(key).and_then(|n| n.mesh()).expect("mesh");
    assert!(!mesh.is_rigid());
    assert!(vec3_approx(mesh.transformed().positions[1], Vec3::X));

    let skin = mesh.skin_binding().expect("skin");
    assert!(vec3_approx(skin.weights[0].tcenter, Vec3::ZERO));
}

#[test]
fn bone_center_follows_the_bone_node() {
    let (g, shape) = skinned_graph_with(5.0, Vec3::new(0.0, 0.0, 7.0), true);
    let mut scene = Scene::from_settings(&ViewerSettings::default(), Box::new(NullTextureCache));
    scene.make(&g);
    scene.transform(Transform::IDENTITY, 0.0);

    let key = scene.node_for_block(shape).expect("shape node");
    let mesh = scene.node(key).and_then(|n| n.mesh()).expect("mesh");
    assert!(vec3_approx(mesh.transformed().positions[1], Vec3::new(1.0, 5.0, 7.0)));

    // the bind transform is not applied to the bone's own center
    let skin = mesh.skin_binding().expect("skin");
    assert!(vec3_approx(skin.weights[0].tcenter, Vec3::new(1.0, 5.0, 0.0)));
}
