//! Renderer tests
//!
//! Tests for:
//! - Program loading: parse errors, link failures, missing shaders
//! - Program selection: conditions, hint order, fixed-function fallback
//! - Sampler units and texcoord channels for the chosen program
//! - Fixed-function texture stages

use glam::{Vec2, Vec3};
use nifview::assets::{Block, BlockGraph, BlockId, Compound, FileVersion, MemoryMaterialProvider, Value};
use nifview::renderer::recording::{BackendCall, MemoryTextureCache, RecordingBackend, TexCoordKind};
use nifview::renderer::{Combine, ProgramSelection, Renderer, ShaderStage, UniformValue};
use nifview::properties::TexFilter;
use nifview::scene::{Scene, SceneOptions, Transform, ViewerSettings, VisMode};

const VERT: &str = "default.vert";
const FRAG: &str = "default.frag";

// ============================================================================
// Fixtures
// ============================================================================

/// A root node holding one triangle shape with the given property blocks.
fn mesh_graph(with_uv: bool, props: impl FnOnce(&mut BlockGraph) -> Vec<BlockId>) -> (BlockGraph, BlockId) {
    let mut g = BlockGraph::new(FileVersion::new(0x1400_0005, 0, 0));

    let mut data = Block::new("NiTriShapeData")
        .with(
            "Vertices",
            Value::Array(vec![
                Value::Vector3(Vec3::ZERO),
                Value::Vector3(Vec3::X),
                Value::Vector3(Vec3::Y),
            ]),
        )
        .with("Triangles", Value::Array(vec![Value::Triangle([0, 1, 2])]));
    if with_uv {
        let uv = Value::Array(vec![
            Value::Vector2(Vec2::ZERO),
            Value::Vector2(Vec2::X),
            Value::Vector2(Vec2::Y),
        ]);
        data = data.with("UV Sets", Value::Array(vec![uv]));
    }
    let data = g.add(data);

    let prop_links = props(&mut g).into_iter().map(|b| Value::Link(Some(b))).collect();
    let shape = g.add(
        Block::new("NiTriShape")
            .with("Name", Value::String("Shape".into()))
            .with("Data", Value::Link(Some(data)))
            .with("Properties", Value::Array(prop_links)),
    );
    let root = g.add(Block::new("NiNode").with("Children", Value::Array(vec![Value::Link(Some(shape))])));
    g.add_root(root);
    (g, shape)
}

fn texturing(g: &mut BlockGraph, file: &str) -> BlockId {
    let source = g.add(Block::new("NiSourceTexture").with("File Name", Value::String(file.into())));
    let base = Compound::new()
        .with("Source", Value::Link(Some(source)))
        .with("UV Set", Value::Count(0))
        .with("Filter Mode", Value::Count(2))
        .with("Clamp Mode", Value::Count(3));
    g.add(Block::new("NiTexturingProperty").with("Base Texture", Value::Compound(base)))
}

fn scene_for(g: &BlockGraph, cache: MemoryTextureCache, settings: &ViewerSettings) -> Scene {
    let mut scene = Scene::new(settings, Box::new(MemoryMaterialProvider::new()), Box::new(cache));
    scene.make(g);
    scene.transform(Transform::IDENTITY, 0.0);
    scene
}

fn renderer_with(backend: RecordingBackend, programs: &[(&str, &str)]) -> Renderer<RecordingBackend> {
    let mut r = Renderer::new(backend, true);
    r.load_shader(VERT, ShaderStage::Vertex, "void main() {}").unwrap();
    r.load_shader(FRAG, ShaderStage::Fragment, "void main() {}").unwrap();
    for (name, text) in programs {
        r.load_program(name, text).unwrap();
    }
    r
}

fn prog(body: &str) -> String {
    format!("shaders {VERT} {FRAG}\n{body}")
}

fn select(r: &mut Renderer<RecordingBackend>, g: &BlockGraph, scene: &Scene, shape: BlockId, hint: Option<&str>) -> ProgramSelection {
    let key = scene.node_for_block(shape).expect("shape node");
    r.setup_program(g, scene, key, hint)
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn parse_error_leaves_program_unregistered() {
    let mut r = renderer_with(RecordingBackend::new(), &[]);
    assert!(r.load_program("bad.prog", "checkgroup end").is_err());
    assert!(r.program("bad.prog").is_none());
}

#[test]
fn link_failure_registers_unusable_program() {
    let mut backend = RecordingBackend::new();
    backend.fail_link("broken.prog");
    let mut r = renderer_with(backend, &[]);

    assert!(r.load_program("broken.prog", &prog("")).is_err());
    let p = r.program("broken.prog").expect("registered");
    assert!(!p.is_usable());
}

#[test]
fn missing_or_failed_shader_makes_program_unusable() {
    let mut backend = RecordingBackend::new();
    backend.fail_shader("bad.frag");
    let mut r = renderer_with(backend, &[]);

    assert!(r.load_shader("bad.frag", ShaderStage::Fragment, "garbage").is_err());
    assert!(r.load_program("uses_bad.prog", &format!("shaders {VERT} bad.frag")).is_err());
    assert!(r.load_program("uses_missing.prog", &format!("shaders {VERT} nowhere.frag")).is_err());

    assert!(!r.program("uses_bad.prog").expect("registered").is_usable());
    assert!(!r.program("uses_missing.prog").expect("registered").is_usable());
}

#[test]
fn update_shaders_reads_a_directory() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = std::env::temp_dir().join(format!("nifview-shaders-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join(VERT), "void main() {}")?;
    std::fs::write(dir.join(FRAG), "void main() {}")?;
    std::fs::write(dir.join("good.prog"), prog("check NiTriShape"))?;
    std::fs::write(dir.join("bad.prog"), "checkgroup end")?;
    std::fs::write(dir.join("notes.txt"), "ignored")?;

    let mut r = Renderer::new(RecordingBackend::new(), true);
    r.update_shaders(&dir)?;
    std::fs::remove_dir_all(&dir)?;

    assert!(r.program("good.prog").is_some_and(|p| p.is_usable()));
    assert!(r.program("bad.prog").is_none());
    assert_eq!(r.programs().count(), 1);
    Ok(())
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn no_program_falls_back_to_fixed_function() {
    let (g, shape) = mesh_graph(true, |_| Vec::new());
    let scene = scene_for(&g, MemoryTextureCache::new(), &ViewerSettings::default());
    let mut r = renderer_with(RecordingBackend::new(), &[]);

    let sel = select(&mut r, &g, &scene, shape, None);
    assert!(sel.is_fixed_function());
    assert_eq!(sel.name(), "fixed function pipeline");
    assert!(r.backend().calls().contains(&BackendCall::UseProgram(None)));
}

#[test]
fn check_not_rejects_when_block_present() {
    let p = prog("check not NiAlphaProperty");
    let programs = [("no_alpha.prog", p.as_str())];

    let (g, shape) = mesh_graph(true, |_| Vec::new());
    let scene = scene_for(&g, MemoryTextureCache::new(), &ViewerSettings::default());
    let mut r = renderer_with(RecordingBackend::new(), &programs);
    assert_eq!(select(&mut r, &g, &scene, shape, None), ProgramSelection::Program("no_alpha.prog".into()));

    let (g, shape) = mesh_graph(true, |g| vec![g.add(Block::new("NiAlphaProperty").with("Flags", Value::Count(1)))]);
    let scene = scene_for(&g, MemoryTextureCache::new(), &ViewerSettings::default());
    let mut r = renderer_with(RecordingBackend::new(), &programs);
    assert!(select(&mut r, &g, &scene, shape, None).is_fixed_function());
}

#[test]
fn header_and_field_conditions() {
    let old = prog("check HEADER/Version < 0x14000005");
    let named = prog("check NiTriShape/Name == \"Shape\"");
    let programs = [("a_old.prog", old.as_str()), ("b_named.prog", named.as_str())];

    let (g, shape) = mesh_graph(true, |_| Vec::new());
    let scene = scene_for(&g, MemoryTextureCache::new(), &ViewerSettings::default());
    let mut r = renderer_with(RecordingBackend::new(), &programs);
    assert_eq!(select(&mut r, &g, &scene, shape, None).name(), "b_named.prog");
}

#[test]
fn programs_are_tried_in_name_order_and_hint_first() {
    let any = prog("");
    let programs = [("b.prog", any.as_str()), ("a.prog", any.as_str())];

    let (g, shape) = mesh_graph(true, |_| Vec::new());
    let scene = scene_for(&g, MemoryTextureCache::new(), &ViewerSettings::default());
    let mut r = renderer_with(RecordingBackend::new(), &programs);

    assert_eq!(select(&mut r, &g, &scene, shape, None).name(), "a.prog");
    assert_eq!(select(&mut r, &g, &scene, shape, Some("b.prog")).name(), "b.prog");
    // a hint that no longer exists is skipped
    assert_eq!(select(&mut r, &g, &scene, shape, Some("gone.prog")).name(), "a.prog");
}

#[test]
fn unusable_program_is_skipped() {
    let any = prog("");
    let mut backend = RecordingBackend::new();
    backend.fail_link("a.prog");
    let mut r = renderer_with(backend, &[("b.prog", any.as_str())]);
    assert!(r.load_program("a.prog", &any).is_err());

    let (g, shape) = mesh_graph(true, |_| Vec::new());
    let scene = scene_for(&g, MemoryTextureCache::new(), &ViewerSettings::default());
    assert_eq!(select(&mut r, &g, &scene, shape, Some("a.prog")).name(), "b.prog");
}

#[test]
fn silhouette_and_disabled_shaders_use_fixed_function() {
    let any = prog("");
    let programs = [("a.prog", any.as_str())];
    let (g, shape) = mesh_graph(true, |_| Vec::new());

    let mut settings = ViewerSettings::default();
    settings.vis_mode = VisMode::SILHOUETTE;
    let scene = scene_for(&g, MemoryTextureCache::new(), &settings);
    let mut r = renderer_with(RecordingBackend::new(), &programs);
    assert!(select(&mut r, &g, &scene, shape, Some("a.prog")).is_fixed_function());

    let mut settings = ViewerSettings::default();
    settings.options.insert(SceneOptions::DISABLE_SHADERS);
    let scene = scene_for(&g, MemoryTextureCache::new(), &settings);
    assert!(select(&mut r, &g, &scene, shape, None).is_fixed_function());

    let scene = scene_for(&g, MemoryTextureCache::new(), &ViewerSettings::default());
    r.set_use_shaders(false);
    assert!(select(&mut r, &g, &scene, shape, None).is_fixed_function());

    let mut r = renderer_with(RecordingBackend::fixed_only(), &[]);
    assert!(select(&mut r, &g, &scene, shape, None).is_fixed_function());
}

// ============================================================================
// Samplers and texcoords
// ============================================================================

#[test]
fn sampler_units_increment_per_bound_map() {
    let p = prog("texcoords 0 base");
    let mut backend = RecordingBackend::new();
    backend.declare_uniforms("tex.prog", &["BaseMap", "NormalMap"]);
    let mut r = renderer_with(backend, &[("tex.prog", p.as_str())]);

    let (g, shape) = mesh_graph(true, |g| vec![texturing(g, "textures/rock_d.dds")]);
    let cache = MemoryTextureCache::new()
        .with("textures/rock_d.dds", 1)
        .with("textures/rock_n.dds", 1);
    let log = cache.bind_log();
    let scene = scene_for(&g, cache, &ViewerSettings::default());

    assert_eq!(select(&mut r, &g, &scene, shape, None).name(), "tex.prog");
    assert_eq!(r.backend().uniform("BaseMap"), Some(UniformValue::Int(0)));
    assert_eq!(r.backend().uniform("NormalMap"), Some(UniformValue::Int(1)));

    let bound: Vec<String> = log.borrow().iter().map(|(n, _)| n.clone()).collect();
    assert_eq!(bound, vec!["textures/rock_d.dds", "textures/rock_n.dds"]);

    assert!(r.backend().calls().iter().any(|c| matches!(
        c,
        BackendCall::TexCoords { unit: 0, kind: TexCoordKind::Uv, len: 3 }
    )));
}

#[test]
fn missing_derived_map_rejects_program() {
    let p = prog("");
    let mut backend = RecordingBackend::new();
    backend.declare_uniforms("tex.prog", &["BaseMap", "NormalMap"]);
    let mut r = renderer_with(backend, &[("tex.prog", p.as_str())]);

    let (g, shape) = mesh_graph(true, |g| vec![texturing(g, "textures/rock_d.dds")]);
    let cache = MemoryTextureCache::new().with("textures/rock_d.dds", 1);
    let scene = scene_for(&g, cache, &ViewerSettings::default());

    assert!(select(&mut r, &g, &scene, shape, None).is_fixed_function());
}

#[test]
fn base_map_without_texture_source_rejects_program() {
    let p = prog("");
    let mut backend = RecordingBackend::new();
    backend.declare_uniforms("tex.prog", &["BaseMap"]);
    let mut r = renderer_with(backend, &[("tex.prog", p.as_str())]);

    let (g, shape) = mesh_graph(true, |_| Vec::new());
    let scene = scene_for(&g, MemoryTextureCache::new(), &ViewerSettings::default());
    assert!(select(&mut r, &g, &scene, shape, None).is_fixed_function());
}

#[test]
fn texcoords_need_the_data_they_name() {
    let tangents = prog("texcoords 1 tangents");
    let base = prog("texcoords 0 base");

    // no tangents on the mesh
    let (g, shape) = mesh_graph(true, |_| Vec::new());
    let scene = scene_for(&g, MemoryTextureCache::new(), &ViewerSettings::default());
    let mut r = renderer_with(RecordingBackend::new(), &[("t.prog", tangents.as_str())]);
    assert!(select(&mut r, &g, &scene, shape, None).is_fixed_function());

    // a texture slot name without a texturing or shader property
    let mut r = renderer_with(RecordingBackend::new(), &[("b.prog", base.as_str())]);
    assert!(select(&mut r, &g, &scene, shape, None).is_fixed_function());

    // texcoord unit past what the backend has
    let (g, shape) = mesh_graph(true, |g| vec![texturing(g, "a.dds")]);
    let scene = scene_for(&g, MemoryTextureCache::new(), &ViewerSettings::default());
    let far = prog("texcoords 9 base");
    let mut r = renderer_with(RecordingBackend::new().with_texture_units(4), &[("far.prog", far.as_str())]);
    assert!(select(&mut r, &g, &scene, shape, None).is_fixed_function());
}

// ============================================================================
// Fixed function
// ============================================================================

fn last_stages(r: &Renderer<RecordingBackend>) -> Vec<nifview::renderer::TextureStage> {
    r.backend()
        .calls()
        .iter()
        .rev()
        .find_map(|c| match c {
            BackendCall::TextureStages(s) => Some(s.clone()),
            _ => None,
        })
        .expect("stages set")
}

#[test]
fn fixed_function_binds_base_stage() {
    let (g, shape) = mesh_graph(true, |g| vec![texturing(g, "a.dds")]);
    let scene = scene_for(&g, MemoryTextureCache::new().with("a.dds", 4), &ViewerSettings::default());
    let mut r = renderer_with(RecordingBackend::new(), &[]);

    assert!(select(&mut r, &g, &scene, shape, None).is_fixed_function());
    let stages = last_stages(&r);
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0].unit, 0);
    assert_eq!(stages[0].texture, "a.dds");
    assert_eq!(stages[0].combine, Combine::Modulate);
    assert_eq!(stages[0].sampler.filter, TexFilter::LinearMipmapLinear);
}

#[test]
fn single_mip_texture_filters_linearly() {
    let (g, shape) = mesh_graph(true, |g| vec![texturing(g, "a.dds")]);
    let scene = scene_for(&g, MemoryTextureCache::new().with("a.dds", 1), &ViewerSettings::default());
    let mut r = renderer_with(RecordingBackend::new(), &[]);

    select(&mut r, &g, &scene, shape, None);
    assert_eq!(last_stages(&r)[0].sampler.filter, TexFilter::Linear);
}

#[test]
fn fixed_function_skips_stage_without_uvs() {
    let (g, shape) = mesh_graph(false, |g| vec![texturing(g, "a.dds")]);
    let scene = scene_for(&g, MemoryTextureCache::new().with("a.dds", 4), &ViewerSettings::default());
    let mut r = renderer_with(RecordingBackend::new(), &[]);

    select(&mut r, &g, &scene, shape, None);
    assert!(last_stages(&r).is_empty());
}

#[test]
fn texturing_off_binds_nothing() {
    let (g, shape) = mesh_graph(true, |g| vec![texturing(g, "a.dds")]);
    let mut settings = ViewerSettings::default();
    settings.options.remove(SceneOptions::DO_TEXTURING);
    let scene = scene_for(&g, MemoryTextureCache::new().with("a.dds", 4), &settings);
    let mut r = renderer_with(RecordingBackend::new(), &[]);

    select(&mut r, &g, &scene, shape, None);
    assert!(last_stages(&r).is_empty());
}

// ============================================================================
// Drawing through the scene
// ============================================================================

#[test]
fn draw_shapes_records_program_and_remembers_hint() {
    let any = prog("");
    let (g, shape) = mesh_graph(true, |_| Vec::new());
    let mut scene = scene_for(&g, MemoryTextureCache::new(), &ViewerSettings::default());
    let mut r = renderer_with(RecordingBackend::new(), &[("a.prog", any.as_str())]);

    scene.draw_shapes(&g, &mut r);
    let draws: Vec<_> = r.backend().draws().cloned().collect();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].block, shape);
    assert_eq!(draws[0].program.as_deref(), Some("a.prog"));
    assert_eq!(draws[0].triangles, 1);
    assert!(draws[0].rigid);

    let key = scene.node_for_block(shape).unwrap();
    let mesh = scene.node(key).and_then(|n| n.mesh()).unwrap();
    assert_eq!(mesh.program_hint(), Some("a.prog"));
}
