//! Geometry buffer consolidation for GPU renderers.
//!
//! Owns per-object renderable buffers (position/normal/color/index streams
//! plus a vertex-array binding) and merges many small buffers into few large
//! ones to cut draw-call count. The merge does exact byte-offset bookkeeping
//! over opaque device buffers, sizes elements by the quantization settings in
//! force, and rebases index values across the concatenated vertex range.
//!
//! The engine is device-agnostic: all GPU work goes through the
//! [`GraphicsDevice`] contract. [`MemoryDevice`] is a headless in-memory
//! implementation; `meshbatch-wgpu` provides the wgpu backend.
//!
//! # Invariants
//! - A SubBuffer lives in exactly one sequence (opaque, transparent, reuse),
//!   chosen at insertion and changed only when a combine replaces the whole
//!   sequence.
//! - A merge either fully succeeds and replaces its sequence, or fully fails
//!   and leaves the sequence and every source resource intact.
//! - Instanced (reuse) geometry is never concatenated.
//! - Everything runs synchronously on the graphics context's thread; nothing
//!   here is re-entrant or thread-safe by design.

pub mod buffer;
pub mod combine;
pub mod device;
pub mod format;
pub mod manager;
pub mod memory;
pub mod pool;
pub mod programs;
pub mod settings;

#[cfg(test)]
pub(crate) mod testutil;

pub use buffer::{BufferId, SubBuffer, VertexArrayId};
pub use combine::{BufferCombiner, CombineError};
pub use device::{AttributeBinding, BufferKind, DeviceError, GraphicsDevice, VertexArrayRecord};
pub use format::{ElementType, VertexLayout};
pub use manager::GpuBufferManager;
pub use memory::MemoryDevice;
pub use pool::{BufferCategory, BufferPool};
pub use programs::{ProgramConfig, ProgramInfo, ProgramRegistry, ProgramTable};
pub use settings::RenderSettings;
