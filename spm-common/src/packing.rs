//! Vertex attribute packing utilities
//!
//! Provides the scalar conversions used by the SPM vertex stream:
//! - f32 → f16 (IEEE 754 half-float) for UVs and joint weights
//! - f32x3 (+ sign) → packed 2-10-10-10 reversed (normals and tangents)
//! - f32 RGB → u8 RGB (vertex colors)
//!
//! Used by both the encoder and the decoder in `spm-export`.

use glam::Vec3;
use half::f16;

// ============================================================================
// Vertex Color Markers
// ============================================================================

/// Vertex color marker byte: the vertex is pure white, no RGB bytes follow
pub const COLOR_WHITE_MARKER: u8 = 128;
/// Vertex color marker byte: three raw RGB bytes follow
pub const COLOR_RGB_MARKER: u8 = 255;

// ============================================================================
// Half Floats
// ============================================================================

/// Convert f32 to the raw bits of an IEEE 754 half-float
#[inline]
pub fn f32_to_f16(value: f32) -> u16 {
    f16::from_f32(value).to_bits()
}

/// Convert raw half-float bits back to f32
#[inline]
pub fn f16_to_f32(bits: u16) -> f32 {
    f16::from_bits(bits).to_f32()
}

// ============================================================================
// 2-10-10-10 Reversed Packing
// ============================================================================

/// Quantize a [-1, 1] component into a 10-bit two's complement field.
///
/// Positive values scale by 511, negative values by 512, so both ends of the
/// range are representable.
#[inline]
fn quantize_10(value: f32) -> u32 {
    let v = value.clamp(-1.0, 1.0);
    let part = if v > 0.0 {
        (v * 511.0 + 0.5) as i32
    } else {
        (v * 512.0 - 0.5) as i32
    };
    (part & 1023) as u32
}

/// Quantize a [-1, 1] sign into the 2-bit field.
#[inline]
fn quantize_2(value: f32) -> u32 {
    let v = value.clamp(-1.0, 1.0);
    let part = if v > 0.0 {
        (v + 0.5) as i32
    } else {
        (v * 2.0 - 0.5) as i32
    };
    (part & 3) as u32
}

#[inline]
fn dequantize_10(raw: u32) -> f32 {
    // Sign-extend the 10-bit field
    let s = ((raw as i32) << 22) >> 22;
    if s > 0 { s as f32 / 511.0 } else { s as f32 / 512.0 }
}

#[inline]
fn dequantize_2(raw: u32) -> f32 {
    let s = ((raw as i32) << 30) >> 30;
    if s > 0 { s as f32 } else { s as f32 / 2.0 }
}

/// Pack a direction (and optional handedness sign) to a 2-10-10-10 reversed u32.
///
/// Bit layout: `[w:2][z:10][y:10][x:10]`. Without a sign the top two bits
/// stay zero (normals).
pub fn pack_2101010_rev(v: Vec3, w: Option<f32>) -> u32 {
    let mut packed = quantize_10(v.x);
    packed |= quantize_10(v.y) << 10;
    packed |= quantize_10(v.z) << 20;
    if let Some(w) = w {
        packed |= quantize_2(w) << 30;
    }
    packed
}

/// Unpack a 2-10-10-10 reversed u32 to `(xyz, w)`.
pub fn unpack_2101010_rev(packed: u32) -> (Vec3, f32) {
    let x = dequantize_10(packed & 0x3FF);
    let y = dequantize_10((packed >> 10) & 0x3FF);
    let z = dequantize_10((packed >> 20) & 0x3FF);
    let w = dequantize_2(packed >> 30);
    (Vec3::new(x, y, z), w)
}

// ============================================================================
// Color Packing
// ============================================================================

/// Convert a linear [0, 1] RGB color to bytes (truncating, saturating at 255)
#[inline]
pub fn color_to_bytes(rgb: [f32; 3]) -> [u8; 3] {
    rgb.map(|c| ((c * 255.0) as u32).min(255) as u8)
}
