// this_file: src/identity.rs
//! Cache identities for strings, glyphs and rendering configurations.
//!
//! A [`RenderTrait`] is an opaque 128-bit value covering every setting that
//! changes how a glyph looks. Glyph identities pack a trait together with a
//! glyph (or character) index; string identities are XXH3-128 content hashes
//! of the UTF-16 text.

use serde::{Deserialize, Serialize};
use std::fmt;
use twox_hash::XxHash3_128;

/// Opaque rendering configuration. Equality is bitwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTrait(u128);

impl RenderTrait {
    pub const fn from_bits(bits: u128) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u128 {
        self.0
    }

    pub const fn low(self) -> u64 {
        self.0 as u64
    }

    pub const fn high(self) -> u64 {
        (self.0 >> 64) as u64
    }
}

impl fmt::Display for RenderTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Identity of one glyph rendered under one [`RenderTrait`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlyphIdentity(u128);

impl GlyphIdentity {
    pub const fn bits(self) -> u128 {
        self.0
    }

    pub const fn low(self) -> u64 {
        self.0 as u64
    }

    pub const fn high(self) -> u64 {
        (self.0 >> 64) as u64
    }

    /// The glyph or character index packed into the identity.
    pub const fn index(self) -> u32 {
        self.high() as u32
    }

    pub const fn is_glyph_index(self) -> bool {
        (self.high() >> 32) & 1 == 1
    }
}

impl fmt::Display for GlyphIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Content hash of a string plus its index-kind flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringIdentity(u128);

impl StringIdentity {
    pub const fn from_bits(bits: u128) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u128 {
        self.0
    }
}

impl fmt::Display for StringIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Hash UTF-16 content into a [`StringIdentity`].
///
/// Code units are fed to the hasher little-endian so the result does not
/// depend on the host byte order. The flag seeds the hash.
pub fn string_id(content: &[u16], is_glyph_index: bool) -> StringIdentity {
    let mut bytes = Vec::with_capacity(content.len() * 2);
    for unit in content {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    StringIdentity(XxHash3_128::oneshot_with_seed(
        u64::from(is_glyph_index),
        &bytes,
    ))
}

/// Convenience wrapper over [`string_id`] for Rust strings.
pub fn string_id_from_str(text: &str, is_glyph_index: bool) -> StringIdentity {
    let units: Vec<u16> = text.encode_utf16().collect();
    string_id(&units, is_glyph_index)
}

/// Compose a [`GlyphIdentity`].
///
/// Layout, high to low: trait bits 64..=94 (31 bits), the index-kind flag,
/// the 32-bit index, then the low 64 bits of the trait. Trait bits 95..=127
/// do not participate; traits that differ only there share glyph identities.
pub fn glyph_id(render_trait: RenderTrait, index: u32, is_glyph_index: bool) -> GlyphIdentity {
    let high = (render_trait.high() << 33) | (u64::from(is_glyph_index) << 32) | u64::from(index);
    GlyphIdentity((u128::from(high) << 64) | u128::from(render_trait.low()))
}

/// Outline hinting requested by a client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hinting {
    #[default]
    None,
    Light,
    Full,
}

impl Hinting {
    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Hinting::Light,
            2 => Hinting::Full,
            _ => Hinting::None,
        }
    }

    fn bits(self) -> u8 {
        match self {
            Hinting::None => 0,
            Hinting::Light => 1,
            Hinting::Full => 2,
        }
    }
}

/// Coverage mode for the produced mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Antialias {
    /// 1-bit coverage, stored as 0 or 255
    Mono,
    #[default]
    Gray,
}

impl Antialias {
    fn from_bits(bits: u8) -> Self {
        if bits == 0 {
            Antialias::Mono
        } else {
            Antialias::Gray
        }
    }

    fn bits(self) -> u8 {
        match self {
            Antialias::Mono => 0,
            Antialias::Gray => 1,
        }
    }
}

const FLAG_EMBOLDEN: u8 = 1;

/// Concrete parameters packed into a [`RenderTrait`].
///
/// Bit layout: size (0..32, 26.6 pixels), font face (32..64), hinting
/// (64..72), antialias (72..80), flags (80..88). Everything stays below
/// bit 95 so glyph identities keep every setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderSettings {
    pub font_face: u32,
    /// Pixel size in 26.6 fixed point
    pub size_26_6: u32,
    pub hinting: Hinting,
    pub antialias: Antialias,
    pub embolden: bool,
}

impl RenderSettings {
    pub fn new(font_face: u32, size_px: f32) -> Self {
        Self {
            font_face,
            size_26_6: (size_px.max(0.0) * 64.0).round() as u32,
            hinting: Hinting::default(),
            antialias: Antialias::default(),
            embolden: false,
        }
    }

    pub fn size_px(&self) -> f32 {
        self.size_26_6 as f32 / 64.0
    }

    pub fn to_trait(&self) -> RenderTrait {
        let flags = if self.embolden { FLAG_EMBOLDEN } else { 0 };
        RenderTrait(
            u128::from(self.size_26_6)
                | u128::from(self.font_face) << 32
                | u128::from(self.hinting.bits()) << 64
                | u128::from(self.antialias.bits()) << 72
                | u128::from(flags) << 80,
        )
    }

    pub fn from_trait(render_trait: RenderTrait) -> Self {
        let bits = render_trait.bits();
        Self {
            size_26_6: bits as u32,
            font_face: (bits >> 32) as u32,
            hinting: Hinting::from_bits((bits >> 64) as u8),
            antialias: Antialias::from_bits((bits >> 72) as u8),
            embolden: (bits >> 80) as u8 & FLAG_EMBOLDEN != 0,
        }
    }
}
