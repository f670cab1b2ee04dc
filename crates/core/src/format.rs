//! Element formats and per-combine vertex layout resolution.

use crate::settings::RenderSettings;

/// Scalar element encoding for one attribute stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Float32,
    Sint16,
    Sint8,
    Uint32,
}

impl ElementType {
    /// Size of one scalar element in bytes.
    pub fn size_bytes(self) -> u64 {
        match self {
            ElementType::Float32 => 4,
            ElementType::Sint16 => 2,
            ElementType::Sint8 => 1,
            ElementType::Uint32 => 4,
        }
    }

    /// Whether the stream binds through an integer attribute pointer
    /// rather than a floating-point one.
    pub fn is_integer(self) -> bool {
        !matches!(self, ElementType::Float32)
    }
}

/// Element types for the four streams of one merge.
///
/// Resolved once per combine pass and used for every size and offset
/// computation in that pass; formats are never mixed within one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    pub positions: ElementType,
    pub normals: ElementType,
    pub colors: ElementType,
    pub indices: ElementType,
}

impl VertexLayout {
    /// Resolve the layout from the current settings. Colors are always
    /// 32-bit floats and indices always 32-bit integers; only positions and
    /// normals have quantized encodings.
    pub fn resolve(settings: &RenderSettings) -> Self {
        Self {
            positions: if settings.quantize_vertices {
                ElementType::Sint16
            } else {
                ElementType::Float32
            },
            normals: if settings.quantize_normals {
                ElementType::Sint8
            } else {
                ElementType::Float32
            },
            colors: ElementType::Float32,
            indices: ElementType::Uint32,
        }
    }
}
