//! The narrow graphics-device contract the consolidation engine calls through.
//!
//! The engine never talks to a GPU API directly; it drives an opaque device
//! through this trait. All calls are synchronous from the caller's
//! perspective, even if the backing device pipelines work internally.

use crate::buffer::{BufferId, VertexArrayId};
use crate::format::ElementType;

/// What a buffer will be bound as. Backends map this to usage flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// One attribute stream bound into a vertex array.
///
/// Whether the stream binds through an integer or floating-point attribute
/// pointer follows from `ty.is_integer()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeBinding {
    pub location: u32,
    pub buffer: BufferId,
    pub components: u32,
    pub ty: ElementType,
    pub stride: u32,
    pub offset: u64,
}

/// Recorded binding state of one vertex array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexArrayRecord {
    pub attributes: Vec<AttributeBinding>,
    pub index_buffer: Option<BufferId>,
}

/// Errors surfaced by a graphics device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("out of device memory allocating {requested} bytes")]
    OutOfMemory { requested: u64 },
    #[error("invalid buffer range: offset {offset} + len {len} exceeds size {size}")]
    InvalidRange { offset: u64, len: u64, size: u64 },
    #[error("byte range (offset {offset}, len {len}) not aligned to {required}-byte transfer granularity")]
    MisalignedRange { offset: u64, len: u64, required: u64 },
    #[error("unknown buffer handle {0:?}")]
    UnknownBuffer(BufferId),
    #[error("unknown vertex array handle {0:?}")]
    UnknownVertexArray(VertexArrayId),
    #[error("graphics context lost")]
    ContextLost,
}

/// Buffer and vertex-array lifecycle plus byte-range transfer operations.
///
/// Deletes are tolerant of unknown handles (a delete after context teardown
/// is a no-op, matching GL semantics). Everything else reports errors.
pub trait GraphicsDevice {
    /// Allocate a zero-initialized buffer of `byte_size` bytes.
    fn create_buffer(&self, kind: BufferKind, byte_size: u64) -> Result<BufferId, DeviceError>;

    fn delete_buffer(&self, buffer: BufferId);

    /// Copy `byte_len` bytes between two device buffers.
    fn copy_buffer_range(
        &self,
        src: BufferId,
        dst: BufferId,
        src_offset: u64,
        dst_offset: u64,
        byte_len: u64,
    ) -> Result<(), DeviceError>;

    /// Read a byte range from a device buffer into host memory.
    fn read_buffer_range(&self, src: BufferId, offset: u64, out: &mut [u8])
    -> Result<(), DeviceError>;

    /// Write a byte range from host memory into a device buffer. With offset
    /// zero and the buffer's full length this is a whole-buffer upload.
    fn write_buffer_range(&self, dst: BufferId, offset: u64, data: &[u8])
    -> Result<(), DeviceError>;

    fn create_vertex_array(&self) -> Result<VertexArrayId, DeviceError>;

    fn delete_vertex_array(&self, vertex_array: VertexArrayId);

    /// Attach an attribute stream to a vertex array.
    fn bind_attribute(
        &self,
        vertex_array: VertexArrayId,
        binding: AttributeBinding,
    ) -> Result<(), DeviceError>;

    /// Set the element (index) source of a vertex array.
    fn set_index_buffer(
        &self,
        vertex_array: VertexArrayId,
        buffer: BufferId,
    ) -> Result<(), DeviceError>;
}
