//! Sprite model.
//!
//! A sprite is an ordered 4-vertex quad queued for one frame. Three kinds
//! exist, one per vertex layout:
//! - [`ColoredSprite`] — position + diffuse color only
//! - [`TexturedSprite`] — one texture coordinate set, stage-0 texture + blend
//! - [`DualTexturedSprite`] — two sets, textures + blends for stages 0 and 1
//!
//! Vertex order within a sprite is corner order (e.g. top-left, bottom-left,
//! bottom-right, top-right); the renderer reorders it for strip drawing.

mod blend;
mod texture;
mod vertex;

pub use blend::BlendMode;
pub use texture::TextureId;
pub use vertex::{ColorVertex, DiffuseColor, DualTexturedVertex, Position, TexCoord, TexturedVertex};

/// Flat-colored quad.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColoredSprite {
    pub vertices: [ColorVertex; 4],
}

/// Quad textured through stage 0.
#[derive(Debug, Clone, PartialEq)]
pub struct TexturedSprite {
    pub vertices: [TexturedVertex; 4],
    pub texture: TextureId,
    pub blending: BlendMode,
}

/// Quad textured through stages 0 and 1.
#[derive(Debug, Clone, PartialEq)]
pub struct DualTexturedSprite {
    pub vertices: [DualTexturedVertex; 4],
    pub texture0: TextureId,
    pub blending0: BlendMode,
    pub texture1: TextureId,
    pub blending1: BlendMode,
}

/// Any sprite kind, for APIs that accept all three.
///
/// The `From` impls let call sites pass a concrete sprite directly; see
/// `SpriteRenderer::add_to_scene`.
#[derive(Debug, Clone, PartialEq)]
pub enum Sprite {
    Colored(ColoredSprite),
    Textured(TexturedSprite),
    DualTextured(DualTexturedSprite),
}

impl From<ColoredSprite> for Sprite {
    #[inline]
    fn from(s: ColoredSprite) -> Self {
        Sprite::Colored(s)
    }
}

impl From<TexturedSprite> for Sprite {
    #[inline]
    fn from(s: TexturedSprite) -> Self {
        Sprite::Textured(s)
    }
}

impl From<DualTexturedSprite> for Sprite {
    #[inline]
    fn from(s: DualTexturedSprite) -> Self {
        Sprite::DualTextured(s)
    }
}
