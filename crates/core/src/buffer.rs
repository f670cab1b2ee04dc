//! Per-object GPU geometry: buffer handles plus element-count metadata.

use crate::device::GraphicsDevice;

/// Opaque handle to a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

/// Opaque handle to a vertex-array binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayId(pub u64);

/// One drawable object's complete GPU geometry: four non-interleaved device
/// buffers plus the vertex array binding them to shader attribute locations.
///
/// # Invariants
/// - `position_elements` is a multiple of 3, `color_elements` a multiple of 4.
/// - Every vertex contributes exactly one normal and one color entry at the
///   matching index (1:1:1 correspondence); the combiner relies on this when
///   rebasing indices.
#[derive(Debug)]
pub struct SubBuffer {
    pub position_buffer: BufferId,
    pub normal_buffer: BufferId,
    pub color_buffer: BufferId,
    pub index_buffer: BufferId,
    pub vertex_array: VertexArrayId,
    /// Scalar position components (3 per vertex).
    pub position_elements: u32,
    /// Scalar normal components (3 per vertex).
    pub normal_elements: u32,
    /// Scalar color components (4 per vertex).
    pub color_elements: u32,
    /// Index scalars.
    pub index_elements: u32,
    /// RGBA sort key. Groups same-colored objects so consecutive draws share
    /// GPU state; not read for shading when per-object colors are disabled.
    pub color: [f32; 4],
    pub has_transparency: bool,
    /// Instanced/shared geometry. Never concatenated with other buffers.
    pub reuse: bool,
}

impl SubBuffer {
    /// Number of vertices encoded by the position stream.
    pub fn vertex_count(&self) -> u32 {
        self.position_elements / 3
    }

    /// Release the four device buffers and the vertex array.
    ///
    /// Consumes the SubBuffer so the underlying resources are freed exactly
    /// once. Release needs the owning device, which is why this is an
    /// explicit call rather than a `Drop` impl.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        device.delete_buffer(self.position_buffer);
        device.delete_buffer(self.normal_buffer);
        device.delete_buffer(self.color_buffer);
        device.delete_buffer(self.index_buffer);
        device.delete_vertex_array(self.vertex_array);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDevice;
    use crate::testutil;

    #[test]
    fn vertex_count_from_position_elements() {
        let buffer = testutil::stub([0.0; 4], false, false, 0);
        assert_eq!(buffer.vertex_count(), 0);

        let device = MemoryDevice::new();
        let buffer = testutil::geometry(&device, 10, 6, [0.0; 4], false);
        assert_eq!(buffer.position_elements, 30);
        assert_eq!(buffer.vertex_count(), 10);
    }

    #[test]
    fn destroy_releases_device_resources() {
        let device = MemoryDevice::new();
        let buffer = testutil::geometry(&device, 4, 6, [0.0; 4], false);
        assert_eq!(device.buffer_count(), 4);
        assert_eq!(device.vertex_array_count(), 1);

        buffer.destroy(&device);
        assert_eq!(device.buffer_count(), 0);
        assert_eq!(device.vertex_array_count(), 0);
    }
}
