//! Material file tests
//!
//! Tests for:
//! - Decoding `.bgsm` and `.bgem` bodies
//! - Truncated and mismatched files
//! - Provider lookup and `load_material`

use glam::{Vec2, Vec3};
use nifview::ViewerError;
use nifview::assets::{
    FolderMaterialProvider, MaterialFile, MaterialKind, MemoryMaterialProvider, load_material,
};

// ============================================================================
// Byte builder
// ============================================================================

const EPSILON: f32 = 1e-6;

#[derive(Default)]
struct Bytes(Vec<u8>);

impl Bytes {
    fn u8(mut self, v: u8) -> Self {
        self.0.push(v);
        self
    }

    fn flag(self, v: bool) -> Self {
        self.u8(u8::from(v))
    }

    fn u32(mut self, v: u32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn f32(self, v: f32) -> Self {
        self.u32(v.to_bits())
    }

    fn f32s(self, values: &[f32]) -> Self {
        values.iter().fold(self, |b, v| b.f32(*v))
    }

    fn flags(self, count: usize, v: bool) -> Self {
        (0..count).fold(self, |b, _| b.flag(v))
    }

    fn string(mut self, s: &str) -> Self {
        let len = if s.is_empty() { 0 } else { s.len() as u32 + 1 };
        self = self.u32(len);
        if len > 0 {
            self.0.extend_from_slice(s.as_bytes());
            self.0.push(0);
        }
        self
    }
}

struct HeaderFields {
    magic: &'static [u8; 4],
    alpha: f32,
    two_sided: bool,
    env_mapping: bool,
}

fn header(h: &HeaderFields) -> Bytes {
    Bytes::default()
        .u32(u32::from_le_bytes(*h.magic))
        .u32(2)
        .u32(0x3)
        .f32s(&[0.25, 0.5])
        .f32s(&[2.0, 3.0])
        .f32(h.alpha)
        .flag(true)
        .u32(6)
        .u32(7)
        .u8(128)
        // alpha test, zwrite, ztest, ssr, wet ssr, decal
        .flag(false)
        .flag(true)
        .flag(true)
        .flags(3, false)
        .flag(h.two_sided)
        .flags(4, false)
        .f32(0.0)
        .flag(h.env_mapping)
        .f32(0.75)
        .flag(false)
}

fn shader_bytes(textures: [&str; 9], emit: bool) -> Vec<u8> {
    let mut b = header(&HeaderFields {
        magic: b"BGSM",
        alpha: 0.5,
        two_sided: true,
        env_mapping: true,
    });
    for t in textures {
        b = b.string(t);
    }
    b = b
        .flag(false)
        .flag(true)
        .f32(2.0)
        .f32(0.3)
        .flag(true)
        .f32(0.4)
        .flag(true)
        .f32s(&[1.0, 0.5, 0.25])
        .f32(1.5)
        .f32(0.8)
        .f32(5.0)
        .f32s(&[0.0; 6])
        .string("")
        .flag(false)
        .flag(emit);
    if emit {
        b = b.f32s(&[0.1, 0.2, 0.3]);
    }
    b.f32(4.0)
        .flags(8, false)
        // glow map
        .flag(true)
        .flags(3, false)
        .f32s(&[0.9, 0.8, 0.7])
        .flags(4, false)
        .f32s(&[0.0; 5])
        .f32(0.6)
        .flag(false)
        .0
}

fn effect_bytes() -> Vec<u8> {
    let mut b = header(&HeaderFields {
        magic: b"BGEM",
        alpha: 1.0,
        two_sided: false,
        env_mapping: false,
    });
    for t in ["fx/base.dds", "fx/grey.dds", "", "", ""] {
        b = b.string(t);
    }
    b.flag(false)
        .flag(true)
        .flag(true)
        .flag(false)
        .flag(true)
        .flag(false)
        .f32s(&[1.0, 0.0, 0.5])
        .f32(2.0)
        .f32s(&[0.9, 0.1, 1.0, 0.0])
        .f32(0.5)
        .u8(3)
        .f32(100.0)
        .0
}

const SHADER_TEXTURES: [&str; 9] = [
    "armor/d.dds",
    "armor/n.dds",
    "armor/s.dds",
    "",
    "",
    "armor/g.dds",
    "",
    "",
    "",
];

// ============================================================================
// Decoding
// ============================================================================

#[test]
fn shader_material_decodes_header_and_body() {
    let file = MaterialFile::parse(MaterialKind::Shader, &shader_bytes(SHADER_TEXTURES, true)).unwrap();
    let m = file.as_shader().unwrap();

    let h = &m.header;
    assert_eq!(h.version, 2);
    assert!(h.tile_u && h.tile_v);
    assert_eq!(h.uv_offset, Vec2::new(0.25, 0.5));
    assert_eq!(h.uv_scale, Vec2::new(2.0, 3.0));
    assert!((h.alpha - 0.5).abs() < EPSILON);
    assert!(h.alpha_blend);
    assert_eq!((h.alpha_src, h.alpha_dst, h.alpha_test_ref), (6, 7, 128));
    assert!(h.zbuffer_write && h.zbuffer_test && h.two_sided);
    assert!(h.environment_mapping);
    assert!((h.environment_mask_scale - 0.75).abs() < EPSILON);

    assert_eq!(m.textures.len(), 9);
    assert_eq!(file.texture(0), "armor/d.dds");
    assert_eq!(file.texture(3), "");
    assert_eq!(file.texture(42), "");

    assert!(m.rim_lighting);
    assert!(m.subsurface_lighting);
    assert!(m.specular_enabled);
    assert_eq!(m.specular_color, Vec3::new(1.0, 0.5, 0.25));
    assert!((m.smoothness - 0.8).abs() < EPSILON);
    assert!((m.fresnel_power - 5.0).abs() < EPSILON);
    assert!(m.emit_enabled);
    assert_eq!(m.emittance_color, Vec3::new(0.1, 0.2, 0.3));
    assert!((m.emittance_mult - 4.0).abs() < EPSILON);
    assert!(m.glowmap);
    assert!(!m.hair);
    assert_eq!(m.hair_tint_color, Vec3::new(0.9, 0.8, 0.7));
    assert!((m.grayscale_to_palette_scale - 0.6).abs() < EPSILON);
    assert!(file.as_effect().is_none());
}

#[test]
fn disabled_emittance_has_no_colour() {
    let file = MaterialFile::parse(MaterialKind::Shader, &shader_bytes(SHADER_TEXTURES, false)).unwrap();
    let m = file.as_shader().unwrap();
    assert!(!m.emit_enabled);
    assert_eq!(m.emittance_color, Vec3::ZERO);
    assert!((m.emittance_mult - 4.0).abs() < EPSILON);
    assert!(m.glowmap);
}

#[test]
fn effect_material_decodes_body() {
    let file = MaterialFile::parse(MaterialKind::Effect, &effect_bytes()).unwrap();
    let m = file.as_effect().unwrap();

    assert!(!m.header.two_sided);
    assert_eq!(m.textures, vec!["fx/base.dds", "fx/grey.dds", "", "", ""]);
    assert!(m.effect_lighting_enabled && m.falloff_enabled && m.grayscale_to_palette_alpha);
    assert!(!m.blood_enabled && !m.falloff_color_enabled && !m.soft_enabled);
    assert_eq!(m.base_color, Vec3::new(1.0, 0.0, 0.5));
    assert!((m.base_color_scale - 2.0).abs() < EPSILON);
    assert!((m.falloff_start_angle - 0.9).abs() < EPSILON);
    assert!((m.falloff_stop_opacity - 0.0).abs() < EPSILON);
    assert!((m.lighting_influence - 0.5).abs() < EPSILON);
    assert_eq!(m.envmap_min_lod, 3);
    assert!((m.soft_depth - 100.0).abs() < EPSILON);
}

#[test]
fn truncated_file_reports_offset() {
    let mut data = shader_bytes(SHADER_TEXTURES, true);
    data.truncate(40);
    assert!(matches!(
        MaterialFile::parse(MaterialKind::Shader, &data),
        Err(ViewerError::MaterialTruncated { .. })
    ));

    let mut data = effect_bytes();
    data.pop();
    match MaterialFile::parse(MaterialKind::Effect, &data) {
        Err(ViewerError::MaterialTruncated { offset, needed }) => {
            assert_eq!(needed, 4);
            assert_eq!(offset, data.len() - 3);
        }
        other => panic!("expected truncation, got {other:?}"),
    }
}

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn memory_provider_is_case_insensitive_and_strips_absolute_paths() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut provider = MemoryMaterialProvider::new();
    provider.insert("Materials\\Armor\\Plate.BGSM", shader_bytes(SHADER_TEXTURES, true));

    let direct = load_material("materials/armor/plate.bgsm", MaterialKind::Shader, &provider);
    assert!(direct.is_some());

    let absolute = load_material(
        "D:\\Games\\Fallout 4\\Data\\Materials\\Armor\\plate.bgsm",
        MaterialKind::Shader,
        &provider,
    );
    assert_eq!(absolute.as_deref(), direct.as_deref());
}

#[test]
fn load_material_rejects_other_names() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut provider = MemoryMaterialProvider::new();
    provider.insert("materials/fx.bgem", effect_bytes());
    provider.insert("materials/broken.bgsm", vec![0; 12]);

    assert!(load_material("materials/fx.bgem", MaterialKind::Effect, &provider).is_some());
    assert!(load_material("materials/fx.bgem", MaterialKind::Shader, &provider).is_none());
    assert!(load_material("materials/missing.bgem", MaterialKind::Effect, &provider).is_none());
    assert!(load_material("materials/broken.bgsm", MaterialKind::Shader, &provider).is_none());
    assert!(load_material("", MaterialKind::Shader, &provider).is_none());
    assert!(load_material("PlainName", MaterialKind::Shader, &provider).is_none());
}

#[test]
fn folder_provider_searches_in_order() -> anyhow::Result<()> {
    let root = std::env::temp_dir().join(format!("nifview-materials-{}", std::process::id()));
    let first = root.join("first");
    let second = root.join("second");
    std::fs::create_dir_all(second.join("materials"))?;
    std::fs::create_dir_all(first.join("materials"))?;
    std::fs::write(second.join("materials/fx.bgem"), effect_bytes())?;

    let provider = FolderMaterialProvider::new(vec![first, second]);
    let found = load_material("materials/fx.bgem", MaterialKind::Effect, &provider);
    let missing = load_material("materials/none.bgem", MaterialKind::Effect, &provider);
    std::fs::remove_dir_all(&root)?;

    assert_eq!(found.as_deref().map(MaterialFile::textures).map(<[String]>::len), Some(5));
    assert!(missing.is_none());
    Ok(())
}
