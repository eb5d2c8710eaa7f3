//! Texture decoding and the texture registry.

use ash::vk;
use ember_gpu::{GpuError, GpuImage, Result};
use std::path::Path;

/// Decoded RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexturePixels {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TexturePixels {
    /// Decode an image file into RGBA8.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|e| GpuError::TextureLoad(format!("{}: {e}", path.display())))?
            .to_rgba8();

        let (width, height) = image.dimensions();
        Ok(Self {
            width,
            height,
            rgba: image.into_raw(),
        })
    }

    /// Single texel of one color.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: rgba.to_vec(),
        }
    }

    /// Opaque white texel, a neutral multiplier for vertex colors.
    pub fn white() -> Self {
        Self::solid([255; 4])
    }
}

/// A texture and the descriptor set that samples it.
pub struct TextureEntry<T> {
    pub texture: T,
    pub descriptor_set: vk::DescriptorSet,
}

/// Textures addressed by creation index.
///
/// Every creation adds a new entry; the same file loaded twice is stored twice.
pub struct TextureRegistry<T = GpuImage> {
    entries: Vec<TextureEntry<T>>,
    capacity: usize,
}

impl<T> TextureRegistry<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fail if another texture would exceed the descriptor pool's capacity.
    pub fn ensure_capacity(&self) -> Result<()> {
        if self.entries.len() >= self.capacity {
            return Err(GpuError::InvalidState(format!(
                "Texture registry is full ({} textures)",
                self.capacity
            )));
        }
        Ok(())
    }

    /// Store a texture. Returns its index.
    pub fn insert(&mut self, texture: T, descriptor_set: vk::DescriptorSet) -> Result<usize> {
        self.ensure_capacity()?;
        self.entries.push(TextureEntry {
            texture,
            descriptor_set,
        });
        Ok(self.entries.len() - 1)
    }

    pub fn contains(&self, id: usize) -> bool {
        id < self.entries.len()
    }

    pub fn get(&self, id: usize) -> Option<&TextureEntry<T>> {
        self.entries.get(id)
    }

    /// Descriptor sets indexed by texture id.
    pub fn descriptor_sets(&self) -> Vec<vk::DescriptorSet> {
        self.entries.iter().map(|entry| entry.descriptor_set).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("ember-{}-{name}", std::process::id()))
    }

    #[test]
    fn loads_png_as_rgba8() {
        let path = temp_path("checker.png");
        let mut img = image::RgbImage::new(2, 3);
        img.put_pixel(1, 2, image::Rgb([10, 20, 30]));
        img.save(&path).unwrap();

        let pixels = TexturePixels::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!((pixels.width, pixels.height), (2, 3));
        assert_eq!(pixels.rgba.len(), 2 * 3 * 4);
        let last = &pixels.rgba[pixels.rgba.len() - 4..];
        assert_eq!(last, &[10, 20, 30, 255]);
    }

    #[test]
    fn missing_file_is_texture_error() {
        let path = temp_path("does-not-exist.png");
        match TexturePixels::load(&path) {
            Err(GpuError::TextureLoad(msg)) => assert!(msg.contains("does-not-exist.png")),
            other => panic!("expected TextureLoad, got {other:?}"),
        }
    }

    #[test]
    fn corrupt_file_is_texture_error() {
        let path = temp_path("corrupt.png");
        std::fs::write(&path, b"not a png").unwrap();
        let result = TexturePixels::load(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(GpuError::TextureLoad(_))));
    }

    #[test]
    fn white_is_one_opaque_texel() {
        let white = TexturePixels::white();
        assert_eq!((white.width, white.height), (1, 1));
        assert_eq!(white.rgba, vec![255, 255, 255, 255]);
    }

    #[test]
    fn registry_does_not_deduplicate() {
        let mut registry = TextureRegistry::new(3);
        let a = registry
            .insert("brick.png", vk::DescriptorSet::from_raw(1))
            .unwrap();
        let b = registry
            .insert("brick.png", vk::DescriptorSet::from_raw(2))
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.descriptor_sets(),
            vec![vk::DescriptorSet::from_raw(1), vk::DescriptorSet::from_raw(2)]
        );
    }

    #[test]
    fn registry_capacity_is_enforced() {
        let mut registry = TextureRegistry::new(1);
        registry.insert((), vk::DescriptorSet::null()).unwrap();
        assert!(registry.ensure_capacity().is_err());
        assert!(registry.insert((), vk::DescriptorSet::null()).is_err());
        assert!(registry.contains(0));
        assert!(!registry.contains(1));
    }
}
