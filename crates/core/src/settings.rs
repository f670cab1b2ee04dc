use serde::{Deserialize, Serialize};

/// Render settings consumed by the combine pass.
///
/// Read fresh at the start of every combine invocation; never cached across
/// invocations, so a settings change takes effect on the next pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Encode positions as 16-bit integers instead of 32-bit floats.
    pub quantize_vertices: bool,
    /// Encode normals as 8-bit integers instead of 32-bit floats.
    pub quantize_normals: bool,
    /// Color each draw from a per-object uniform. Disables combining entirely:
    /// a merged buffer cannot carry per-object color state.
    pub use_object_colors: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_full_precision() {
        let s = RenderSettings::default();
        assert!(!s.quantize_vertices);
        assert!(!s.quantize_normals);
        assert!(!s.use_object_colors);
    }
}
