//! Resource cache: named texture sets and environment maps.
//!
//! Everything is loaded up front by [`ResourceCache::preload`]; the scene only
//! ever resolves names against a fully populated cache. A missing name is a
//! programming error surfaced as [`AssetError::TextureSetNotFound`] or
//! [`AssetError::EnvironmentNotFound`].
//!
//! Images are content-addressed: each decoded image carries an [`AssetId`]
//! hashed from its dimensions and pixels, so renderers can share uploads.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Content-addressed image id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u64);

/// Decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub id: AssetId,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// Wrap raw RGBA8 pixels. `pixels.len()` must be `width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, AssetError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected || width == 0 || height == 0 {
            return Err(AssetError::BadDimensions {
                width,
                height,
                len: pixels.len(),
            });
        }
        Ok(Self {
            id: content_hash(width, height, &pixels),
            width,
            height,
            pixels,
        })
    }

    /// 1x1 image of a single color.
    pub fn solid(rgba: [u8; 4]) -> Self {
        let pixels = rgba.to_vec();
        Self {
            id: content_hash(1, 1, &pixels),
            width: 1,
            height: 1,
            pixels,
        }
    }

    /// Decode any format the `image` crate understands.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let decoded = image::open(path).map_err(|source| AssetError::Decode {
            path: path.display().to_string(),
            source,
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba(width, height, rgba.into_raw())
    }

    pub fn texel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y.min(self.height - 1) * self.width + x.min(self.width - 1)) * 4) as usize;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }
}

/// Albedo, normal and roughness maps for one surface.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureSet {
    pub albedo: ImageData,
    pub normal: ImageData,
    pub roughness: ImageData,
}

/// File locations of one texture set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureSetPaths {
    pub albedo: String,
    pub normal: String,
    pub roughness: String,
}

impl TextureSetPaths {
    /// `<prefix>_albedo.jpg`, `<prefix>_normal.jpg`, `<prefix>_roughness.jpg`.
    pub fn from_prefix(prefix: &str) -> Self {
        Self {
            albedo: format!("{prefix}_albedo.jpg"),
            normal: format!("{prefix}_normal.jpg"),
            roughness: format!("{prefix}_roughness.jpg"),
        }
    }
}

/// What to preload, relative to the manifest's directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub texture_sets: BTreeMap<String, TextureSetPaths>,
    #[serde(default)]
    pub environments: BTreeMap<String, String>,
}

impl Manifest {
    /// The demo's stock resources.
    pub fn demo() -> Self {
        let mut manifest = Self::default();
        manifest.texture_sets.insert(
            "sapphire".into(),
            TextureSetPaths::from_prefix("textures/sapphire/sapphire"),
        );
        manifest
            .environments
            .insert("sky".into(), "textures/qwantani-4k.exr".into());
        manifest
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AssetError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("{width}x{height} image cannot hold {len} bytes of RGBA8")]
    BadDimensions { width: u32, height: u32, len: usize },
    #[error("texture set not found: {0}")]
    TextureSetNotFound(String),
    #[error("environment not found: {0}")]
    EnvironmentNotFound(String),
}

/// Name-keyed texture sets and environments.
#[derive(Debug, Clone, Default)]
pub struct ResourceCache {
    texture_sets: BTreeMap<String, TextureSet>,
    environments: BTreeMap<String, ImageData>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load everything in `manifest`. Any failure aborts the whole preload.
    pub fn preload(manifest: &Manifest, base_dir: impl AsRef<Path>) -> Result<Self, AssetError> {
        let base = base_dir.as_ref();
        let mut cache = Self::new();

        for (name, paths) in &manifest.texture_sets {
            let set = TextureSet {
                albedo: ImageData::load(base.join(&paths.albedo))?,
                normal: ImageData::load(base.join(&paths.normal))?,
                roughness: ImageData::load(base.join(&paths.roughness))?,
            };
            tracing::info!(name = %name, "texture set loaded");
            cache.insert_texture_set(name.clone(), set);
        }
        for (name, path) in &manifest.environments {
            let env = ImageData::load(base.join(path))?;
            tracing::info!(name = %name, width = env.width, height = env.height, "environment loaded");
            cache.insert_environment(name.clone(), env);
        }
        Ok(cache)
    }

    /// Procedural stand-ins for the demo resources, used when no asset
    /// directory is available.
    pub fn builtin() -> Self {
        let mut cache = Self::new();
        cache.insert_texture_set("sapphire", procedural_sapphire(64));
        cache.insert_environment("sky", procedural_sky(256, 128));
        cache
    }

    pub fn insert_texture_set(&mut self, name: impl Into<String>, set: TextureSet) {
        self.texture_sets.insert(name.into(), set);
    }

    pub fn insert_environment(&mut self, name: impl Into<String>, image: ImageData) {
        self.environments.insert(name.into(), image);
    }

    pub fn texture_set(&self, name: &str) -> Result<&TextureSet, AssetError> {
        self.texture_sets
            .get(name)
            .ok_or_else(|| AssetError::TextureSetNotFound(name.to_string()))
    }

    pub fn environment(&self, name: &str) -> Result<&ImageData, AssetError> {
        self.environments
            .get(name)
            .ok_or_else(|| AssetError::EnvironmentNotFound(name.to_string()))
    }

    pub fn texture_set_names(&self) -> impl Iterator<Item = &str> {
        self.texture_sets.keys().map(String::as_str)
    }

    pub fn environment_names(&self) -> impl Iterator<Item = &str> {
        self.environments.keys().map(String::as_str)
    }
}

fn content_hash(width: u32, height: u32, pixels: &[u8]) -> AssetId {
    let mut hasher = Sha256::new();
    hasher.update(width.to_le_bytes());
    hasher.update(height.to_le_bytes());
    hasher.update(pixels);
    let result = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&result[..8]);
    AssetId(u64::from_le_bytes(bytes))
}

/// Faceted blue crystal: albedo cells, tilted normals, alternating roughness.
fn procedural_sapphire(size: u32) -> TextureSet {
    let cells = 8;
    let cell = (size / cells).max(1);
    let mut albedo = Vec::with_capacity((size * size * 4) as usize);
    let mut normal = Vec::with_capacity((size * size * 4) as usize);
    let mut roughness = Vec::with_capacity((size * size * 4) as usize);

    for y in 0..size {
        for x in 0..size {
            let (cx, cy) = (x / cell, y / cell);
            let facet = ((cx * 7 + cy * 13) % 5) as u8;
            albedo.extend_from_slice(&[20 + facet * 6, 40 + facet * 10, 150 + facet * 18, 255]);

            let tilt_x = if cx % 2 == 0 { 150 } else { 106 };
            let tilt_y = if cy % 2 == 0 { 150 } else { 106 };
            normal.extend_from_slice(&[tilt_x, tilt_y, 235, 255]);

            let r = if (cx + cy) % 2 == 0 { 60 } else { 110 };
            roughness.extend_from_slice(&[r, r, r, 255]);
        }
    }

    TextureSet {
        albedo: ImageData {
            id: content_hash(size, size, &albedo),
            width: size,
            height: size,
            pixels: albedo,
        },
        normal: ImageData {
            id: content_hash(size, size, &normal),
            width: size,
            height: size,
            pixels: normal,
        },
        roughness: ImageData {
            id: content_hash(size, size, &roughness),
            width: size,
            height: size,
            pixels: roughness,
        },
    }
}

/// Equirectangular gradient: horizon haze to zenith blue, dark ground.
fn procedural_sky(width: u32, height: u32) -> ImageData {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        let v = y as f32 / (height - 1).max(1) as f32;
        let color = if v < 0.5 {
            let t = v / 0.5;
            [
                lerp_u8(60, 200, t),
                lerp_u8(110, 220, t),
                lerp_u8(200, 240, t),
            ]
        } else {
            let t = (v - 0.5) / 0.5;
            [lerp_u8(120, 40, t), lerp_u8(110, 35, t), lerp_u8(90, 30, t)]
        };
        for _ in 0..width {
            pixels.extend_from_slice(&[color[0], color[1], color[2], 255]);
        }
    }
    ImageData {
        id: content_hash(width, height, &pixels),
        width,
        height,
        pixels,
    }
}

fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t.clamp(0.0, 1.0)).round() as u8
}
