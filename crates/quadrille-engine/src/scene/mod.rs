//! Frame-local scene accumulation.
//!
//! Responsibilities:
//! - hold the sprites queued for the current frame, partitioned by vertex
//!   layout (the packer relies on this partitioning)
//! - preserve enqueue order within each partition
//! - clear all partitions as a unit once the frame is rendered

use crate::sprite::{ColoredSprite, DualTexturedSprite, Sprite, TexturedSprite};

/// Sprites queued for the current frame.
///
/// `add()` is O(1) amortized; nothing is deduplicated or reordered. The
/// caller clears the scene after each rendered frame, otherwise sprites
/// accumulate across frames. `clear()` keeps allocated capacity for reuse.
#[derive(Debug, Default)]
pub struct Scene {
    colored: Vec<ColoredSprite>,
    textured: Vec<TexturedSprite>,
    dual_textured: Vec<DualTexturedSprite>,
}

impl Scene {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a sprite into the partition matching its kind.
    pub fn add(&mut self, sprite: impl Into<Sprite>) {
        match sprite.into() {
            Sprite::Colored(s) => self.colored.push(s),
            Sprite::Textured(s) => self.textured.push(s),
            Sprite::DualTextured(s) => self.dual_textured.push(s),
        }
    }

    /// Removes all queued sprites, keeping allocations.
    pub fn clear(&mut self) {
        self.colored.clear();
        self.textured.clear();
        self.dual_textured.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colored.is_empty() && self.textured.is_empty() && self.dual_textured.is_empty()
    }

    /// Total queued sprites across all partitions.
    #[inline]
    pub fn sprite_count(&self) -> usize {
        self.colored.len() + self.textured.len() + self.dual_textured.len()
    }

    #[inline]
    pub fn colored(&self) -> &[ColoredSprite] {
        &self.colored
    }

    #[inline]
    pub fn textured(&self) -> &[TexturedSprite] {
        &self.textured
    }

    #[inline]
    pub fn dual_textured(&self) -> &[DualTexturedSprite] {
        &self.dual_textured
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::{BlendMode, TextureId};

    fn textured() -> TexturedSprite {
        TexturedSprite {
            vertices: Default::default(),
            texture: TextureId::new("t.png"),
            blending: BlendMode::Modulate,
        }
    }

    #[test]
    fn add_partitions_by_kind() {
        let mut scene = Scene::new();
        scene.add(ColoredSprite::default());
        scene.add(textured());
        scene.add(ColoredSprite::default());

        assert_eq!(scene.colored().len(), 2);
        assert_eq!(scene.textured().len(), 1);
        assert_eq!(scene.dual_textured().len(), 0);
        assert_eq!(scene.sprite_count(), 3);
    }

    #[test]
    fn add_preserves_enqueue_order() {
        let mut scene = Scene::new();
        let mut a = textured();
        a.texture = TextureId::new("a.png");
        let mut b = textured();
        b.texture = TextureId::new("b.png");

        scene.add(a);
        scene.add(b);

        assert_eq!(scene.textured()[0].texture, TextureId::new("a.png"));
        assert_eq!(scene.textured()[1].texture, TextureId::new("b.png"));
    }

    #[test]
    fn clear_empties_all_partitions() {
        let mut scene = Scene::new();
        scene.add(ColoredSprite::default());
        scene.add(textured());
        assert!(!scene.is_empty());

        scene.clear();

        assert!(scene.is_empty());
        assert_eq!(scene.sprite_count(), 0);
    }
}
