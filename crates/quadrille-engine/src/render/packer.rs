//! Frame packing: scene → shared vertex buffer bytes.
//!
//! Every sprite contributes 4 vertices in its category's layout. Categories
//! are laid out back to back in a fixed order (colored, textured,
//! dual-textured), each contiguous and in enqueue order. The capacity of
//! the destination is checked up front; packing never writes past it.

use bytemuck::{Pod, Zeroable};

use crate::device::VertexFormat;
use crate::scene::Scene;
use crate::sprite::{ColoredSprite, DiffuseColor, DualTexturedSprite, TexturedSprite};

use super::RenderError;

/// Destination slot i takes source vertex `STRIP_ORDER[i]`.
///
/// A quad's corners arrive in perimeter order; a triangle strip needs the
/// last two swapped so the two triangles share the quad's diagonal.
pub(super) const STRIP_ORDER: [usize; 4] = [0, 1, 3, 2];

const COLORED_STRIDE: usize = VertexFormat::Colored.stride() as usize;
const TEXTURED_STRIDE: usize = VertexFormat::Textured.stride() as usize;
const DUAL_STRIDE: usize = VertexFormat::DualTextured.stride() as usize;

// Wire layout of one vertex per category. `w` is constant 1, marking the
// position as already projected.

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(super) struct PackedColorVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
    pub color: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(super) struct PackedTexturedVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
    pub color: u32,
    pub u: f32,
    pub v: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(super) struct PackedDualTexturedVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
    pub color: u32,
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

/// `(a<<24)|(r<<16)|(g<<8)|b`, the native pixel-format convention.
pub(super) fn pack_argb(c: DiffuseColor) -> u32 {
    ((c.a as u32) << 24) | ((c.r as u32) << 16) | ((c.g as u32) << 8) | (c.b as u32)
}

/// Byte offsets and sprite counts of one packed frame.
///
/// Offsets follow from the fixed category order and cumulative sizes; the
/// draw sequencer binds the buffer at these offsets.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) struct FrameLayout {
    pub colored_sprites: usize,
    pub textured_sprites: usize,
    pub dual_textured_sprites: usize,
}

impl FrameLayout {
    pub fn of(scene: &Scene) -> Self {
        Self {
            colored_sprites: scene.colored().len(),
            textured_sprites: scene.textured().len(),
            dual_textured_sprites: scene.dual_textured().len(),
        }
    }

    pub fn colored_offset(&self) -> usize {
        0
    }

    pub fn textured_offset(&self) -> usize {
        self.colored_offset() + self.colored_sprites * 4 * COLORED_STRIDE
    }

    pub fn dual_textured_offset(&self) -> usize {
        self.textured_offset() + self.textured_sprites * 4 * TEXTURED_STRIDE
    }

    pub fn required_bytes(&self) -> usize {
        self.dual_textured_offset() + self.dual_textured_sprites * 4 * DUAL_STRIDE
    }
}

/// Packs the whole scene into `dst`.
///
/// Fails with [`RenderError::SceneTooLarge`] before writing anything when
/// the scene does not fit.
pub(super) fn pack_scene(scene: &Scene, dst: &mut [u8]) -> Result<FrameLayout, RenderError> {
    let layout = FrameLayout::of(scene);
    let required = layout.required_bytes();
    if required > dst.len() {
        return Err(RenderError::SceneTooLarge {
            required,
            capacity: dst.len(),
        });
    }

    let mut at = layout.colored_offset();
    for sprite in scene.colored() {
        pack_colored(sprite, &mut dst[at..at + 4 * COLORED_STRIDE]);
        at += 4 * COLORED_STRIDE;
    }

    let mut at = layout.textured_offset();
    for sprite in scene.textured() {
        pack_textured(sprite, &mut dst[at..at + 4 * TEXTURED_STRIDE]);
        at += 4 * TEXTURED_STRIDE;
    }

    let mut at = layout.dual_textured_offset();
    for sprite in scene.dual_textured() {
        pack_dual_textured(sprite, &mut dst[at..at + 4 * DUAL_STRIDE]);
        at += 4 * DUAL_STRIDE;
    }

    Ok(layout)
}

fn pack_colored(sprite: &ColoredSprite, out: &mut [u8]) {
    for (slot, &src) in STRIP_ORDER.iter().enumerate() {
        let v = &sprite.vertices[src];
        let packed = PackedColorVertex {
            x: v.position.x,
            y: v.position.y,
            z: v.position.z,
            w: 1.0,
            color: pack_argb(v.color),
        };
        let at = slot * COLORED_STRIDE;
        out[at..at + COLORED_STRIDE].copy_from_slice(bytemuck::bytes_of(&packed));
    }
}

fn pack_textured(sprite: &TexturedSprite, out: &mut [u8]) {
    for (slot, &src) in STRIP_ORDER.iter().enumerate() {
        let v = &sprite.vertices[src];
        let packed = PackedTexturedVertex {
            x: v.position.x,
            y: v.position.y,
            z: v.position.z,
            w: 1.0,
            color: pack_argb(v.color),
            u: v.uv.u,
            v: v.uv.v,
        };
        let at = slot * TEXTURED_STRIDE;
        out[at..at + TEXTURED_STRIDE].copy_from_slice(bytemuck::bytes_of(&packed));
    }
}

fn pack_dual_textured(sprite: &DualTexturedSprite, out: &mut [u8]) {
    for (slot, &src) in STRIP_ORDER.iter().enumerate() {
        let v = &sprite.vertices[src];
        let packed = PackedDualTexturedVertex {
            x: v.position.x,
            y: v.position.y,
            z: v.position.z,
            w: 1.0,
            color: pack_argb(v.color),
            u0: v.uv0.u,
            v0: v.uv0.v,
            u1: v.uv1.u,
            v1: v.uv1.v,
        };
        let at = slot * DUAL_STRIDE;
        out[at..at + DUAL_STRIDE].copy_from_slice(bytemuck::bytes_of(&packed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::{BlendMode, ColorVertex, Position, TexCoord, TextureId, TexturedVertex};

    fn colored_vertex(x: f32, y: f32, z: f32, color: DiffuseColor) -> ColorVertex {
        ColorVertex {
            position: Position::new(x, y, z),
            color,
        }
    }

    /// One dark-red corner at (10,10), three red corners; the concrete
    /// packing scenario the renderer is specified against.
    fn corner_sprite() -> ColoredSprite {
        let dark = DiffuseColor::argb(0xff, 0x7f, 0x00, 0x00);
        let red = DiffuseColor::argb(0xff, 0xff, 0x00, 0x00);
        ColoredSprite {
            vertices: [
                colored_vertex(10.0, 10.0, 0.5, dark),
                colored_vertex(10.0, 90.0, 0.5, red),
                colored_vertex(90.0, 90.0, 0.5, red),
                colored_vertex(90.0, 10.0, 0.5, red),
            ],
        }
    }

    fn read_colored(dst: &[u8], vertex: usize) -> PackedColorVertex {
        let at = vertex * COLORED_STRIDE;
        bytemuck::pod_read_unaligned(&dst[at..at + COLORED_STRIDE])
    }

    // ── strides ───────────────────────────────────────────────────────────

    #[test]
    fn packed_sizes_match_declared_strides() {
        assert_eq!(std::mem::size_of::<PackedColorVertex>(), COLORED_STRIDE);
        assert_eq!(std::mem::size_of::<PackedTexturedVertex>(), TEXTURED_STRIDE);
        assert_eq!(std::mem::size_of::<PackedDualTexturedVertex>(), DUAL_STRIDE);
    }

    // ── argb packing ──────────────────────────────────────────────────────

    #[test]
    fn argb_packs_alpha_high_byte_first() {
        assert_eq!(pack_argb(DiffuseColor::argb(0xff, 0x7f, 0x00, 0x00)), 0xff7f0000);
        assert_eq!(pack_argb(DiffuseColor::argb(0x12, 0x34, 0x56, 0x78)), 0x12345678);
    }

    // ── strip reordering ──────────────────────────────────────────────────

    #[test]
    fn colored_sprite_packs_in_strip_order_with_unit_w() {
        let mut scene = Scene::new();
        scene.add(corner_sprite());
        let mut dst = vec![0u8; 4 * COLORED_STRIDE];

        pack_scene(&scene, &mut dst).unwrap();

        let v0 = read_colored(&dst, 0);
        assert_eq!((v0.x, v0.y, v0.z, v0.w), (10.0, 10.0, 0.5, 1.0));
        assert_eq!(v0.color, 0xff7f0000);

        // Slot 1 keeps source vertex 1.
        let v1 = read_colored(&dst, 1);
        assert_eq!((v1.x, v1.y), (10.0, 90.0));
        assert_eq!(v1.color, 0xffff0000);

        // Slots 2 and 3 swap source vertices 3 and 2.
        let v2 = read_colored(&dst, 2);
        assert_eq!((v2.x, v2.y), (90.0, 10.0));
        let v3 = read_colored(&dst, 3);
        assert_eq!((v3.x, v3.y), (90.0, 90.0));
    }

    #[test]
    fn textured_sprite_reorders_uvs_with_vertices() {
        let red = DiffuseColor::argb(0xff, 0xff, 0x00, 0x00);
        let uv = [(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)];
        let mut vertices = [TexturedVertex::default(); 4];
        for (i, v) in vertices.iter_mut().enumerate() {
            v.position = Position::new(i as f32, 0.0, 0.5);
            v.color = red;
            v.uv = TexCoord::new(uv[i].0, uv[i].1);
        }

        let mut scene = Scene::new();
        scene.add(TexturedSprite {
            vertices,
            texture: TextureId::new("t.png"),
            blending: BlendMode::Modulate,
        });
        let mut dst = vec![0u8; 4 * TEXTURED_STRIDE];

        pack_scene(&scene, &mut dst).unwrap();

        let v2: PackedTexturedVertex =
            bytemuck::pod_read_unaligned(&dst[2 * TEXTURED_STRIDE..3 * TEXTURED_STRIDE]);
        // Slot 2 carries source vertex 3.
        assert_eq!(v2.x, 3.0);
        assert_eq!((v2.u, v2.v), (1.0, 0.0));
    }

    // ── layout offsets ────────────────────────────────────────────────────

    #[test]
    fn categories_are_contiguous_in_fixed_order() {
        let mut scene = Scene::new();
        scene.add(corner_sprite());
        scene.add(corner_sprite());
        scene.add(TexturedSprite {
            vertices: Default::default(),
            texture: TextureId::new("t.png"),
            blending: BlendMode::Add,
        });

        let layout = FrameLayout::of(&scene);
        assert_eq!(layout.colored_offset(), 0);
        assert_eq!(layout.textured_offset(), 2 * 4 * COLORED_STRIDE);
        assert_eq!(
            layout.dual_textured_offset(),
            2 * 4 * COLORED_STRIDE + 4 * TEXTURED_STRIDE
        );
        assert_eq!(layout.required_bytes(), layout.dual_textured_offset());
    }

    #[test]
    fn second_sprite_starts_at_vertex_index_four() {
        let mut scene = Scene::new();
        scene.add(corner_sprite());
        let mut second = corner_sprite();
        second.vertices[0].position.x = 210.0;
        scene.add(second);
        let mut dst = vec![0u8; 8 * COLORED_STRIDE];

        pack_scene(&scene, &mut dst).unwrap();

        assert_eq!(read_colored(&dst, 4).x, 210.0);
    }

    // ── capacity ──────────────────────────────────────────────────────────

    #[test]
    fn oversized_scene_fails_without_writing() {
        let mut scene = Scene::new();
        scene.add(corner_sprite());
        scene.add(corner_sprite());
        let mut dst = vec![0u8; 4 * COLORED_STRIDE]; // room for one sprite only

        let err = pack_scene(&scene, &mut dst).unwrap_err();
        match err {
            RenderError::SceneTooLarge { required, capacity } => {
                assert_eq!(required, 8 * COLORED_STRIDE);
                assert_eq!(capacity, 4 * COLORED_STRIDE);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(dst.iter().all(|&b| b == 0), "capacity failure must not write");
    }

    #[test]
    fn empty_scene_packs_to_zero_bytes() {
        let scene = Scene::new();
        let layout = pack_scene(&scene, &mut []).unwrap();
        assert_eq!(layout.required_bytes(), 0);
    }
}
