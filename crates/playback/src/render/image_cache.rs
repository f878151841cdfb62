use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use eframe::egui;

/// Decoded images, uploaded as textures on first use.
///
/// Failures are cached too so a missing file is only looked for once.
pub struct ImageCache {
    base_path: PathBuf,
    textures: RefCell<HashMap<String, Option<egui::TextureHandle>>>,
}

impl ImageCache {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            textures: RefCell::new(HashMap::new()),
        }
    }

    /// Resolve an image source against the document directory. Remote sources
    /// are not fetched.
    pub fn resolve(&self, src: &str) -> Option<PathBuf> {
        let src = src.strip_prefix("file://").unwrap_or(src);
        if src.is_empty() || src.contains("://") || src.starts_with("data:") {
            return None;
        }
        let path = Path::new(src);
        if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            Some(self.base_path.join(path))
        }
    }

    pub fn get_or_load(&self, ctx: &egui::Context, src: &str) -> Option<egui::TextureHandle> {
        if let Some(cached) = self.textures.borrow().get(src) {
            return cached.clone();
        }

        let texture = self.resolve(src).and_then(|path| match load_image(&path) {
            Ok(image) => Some(ctx.load_texture(src, image, egui::TextureOptions::LINEAR)),
            Err(e) => {
                tracing::warn!("could not load image {}: {e}", path.display());
                None
            }
        });
        self.textures
            .borrow_mut()
            .insert(src.to_string(), texture.clone());
        texture
    }

    /// Forget everything, e.g. after the document changed on disk.
    pub fn clear(&self) {
        self.textures.borrow_mut().clear();
    }
}

fn load_image(path: &Path) -> anyhow::Result<egui::ColorImage> {
    let image = image::open(path)?.into_rgba8();
    let size = [image.width() as usize, image.height() as usize];
    Ok(egui::ColorImage::from_rgba_unmultiplied(
        size,
        image.as_flat_samples().as_slice(),
    ))
}
