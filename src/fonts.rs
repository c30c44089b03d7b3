// this_file: src/fonts.rs

//! Font-data resolution.
//!
//! Fonts are registered once (memory-mapped from disk or handed over as
//! bytes) and addressed afterwards by a small integer face id, which is what
//! gets packed into a render trait. Only the rasterizer and shaper ever look
//! at the bytes.

use crate::backend::FontProvider;
use crate::error::{Error, Result};
use log::{debug, info};
use memmap2::Mmap;
use read_fonts::FontRef;
use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Identifier assigned to a registered font face.
pub type FontFaceId = u32;

/// Backing storage for font bytes.
#[derive(Debug)]
pub enum FontData {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for FontData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FontData::Mapped(mmap) => &mmap[..],
            FontData::Owned(bytes) => &bytes[..],
        }
    }
}

/// A registered face: shared bytes plus the index inside a collection.
#[derive(Clone, Debug)]
pub struct FontHandle {
    pub id: FontFaceId,
    pub data: Arc<FontData>,
    pub index: u32,
    pub path: Option<PathBuf>,
}

impl FontHandle {
    pub fn font_ref(&self) -> Result<FontRef<'_>> {
        FontRef::from_index(&self.data, self.index).map_err(|e| {
            Error::Font(format!("Failed to parse font {} (index {}): {}", self.id, self.index, e))
        })
    }
}

/// Check if data has valid font signature
fn is_valid_font_signature(data: &[u8]) -> bool {
    if data.len() < 4 {
        return false;
    }
    matches!(&data[0..4], b"\x00\x01\x00\x00" | b"OTTO" | b"ttcf" | b"true")
}

/// Registry of fonts known to the service.
#[derive(Debug, Default)]
pub struct FontRegistry {
    faces: RwLock<Vec<FontHandle>>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory-map a font file and register face `index` from it.
    pub fn register_file<P: AsRef<Path>>(&self, path: P, index: u32) -> Result<FontFaceId> {
        let path = path.as_ref();
        let canonical_path = path.canonicalize().map_err(|e| {
            Error::Font(format!("Failed to resolve path {}: {}", path.display(), e))
        })?;

        debug!("Memory-mapping font file: {}", canonical_path.display());
        let file = File::open(&canonical_path).map_err(|e| {
            Error::Font(format!(
                "Failed to open font file {}: {}",
                canonical_path.display(),
                e
            ))
        })?;
        let len = file
            .metadata()
            .map_err(|e| Error::Font(format!("Failed to get file metadata: {}", e)))?
            .len();
        if len == 0 {
            return Err(Error::Font("Font file is empty".into()));
        }

        // SAFETY: the mapping is read-only; font files are not expected to
        // change while the service runs.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| Error::Font(format!("Failed to memory-map file: {}", e)))?;

        self.register(FontData::Mapped(mmap), index, Some(canonical_path))
    }

    /// Register in-memory font bytes.
    pub fn register_bytes(&self, bytes: Vec<u8>, index: u32) -> Result<FontFaceId> {
        if bytes.is_empty() {
            return Err(Error::Font("Font data is empty".into()));
        }
        self.register(FontData::Owned(bytes), index, None)
    }

    fn register(&self, data: FontData, index: u32, path: Option<PathBuf>) -> Result<FontFaceId> {
        if !is_valid_font_signature(&data) {
            return Err(Error::Font(
                "Invalid font file format (expected TTF/OTF/TTC)".into(),
            ));
        }
        FontRef::from_index(&data, index)
            .map_err(|e| Error::Font(format!("Failed to parse font: {}", e)))?;

        let mut faces = self.faces.write().unwrap_or_else(PoisonError::into_inner);
        let id = FontFaceId::try_from(faces.len())
            .map_err(|_| Error::Font("Too many registered fonts".into()))?;
        info!(
            "Registered font face {} ({} bytes{})",
            id,
            data.len(),
            path.as_ref()
                .map(|p| format!(", {}", p.display()))
                .unwrap_or_default()
        );
        faces.push(FontHandle {
            id,
            data: Arc::new(data),
            index,
            path,
        });
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.faces.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FontProvider for FontRegistry {
    fn font(&self, id: FontFaceId) -> Result<FontHandle> {
        self.faces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id as usize)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("font face {}", id)))
    }
}
