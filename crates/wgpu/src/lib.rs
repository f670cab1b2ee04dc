//! wgpu backend for the meshbatch graphics-device contract.
//!
//! Implements buffer lifecycle and byte-range transfers over a
//! `wgpu::Device`/`wgpu::Queue` pair. Vertex arrays have no wgpu equivalent,
//! so they are kept as recorded binding state; a pipeline/draw layer consumes
//! the records when building `VertexBufferLayout`s.
//!
//! # Invariants
//! - Transfer ranges must honor wgpu's 4-byte copy granularity; misaligned
//!   ranges are rejected, never silently padded.
//! - All contract methods are synchronous: reads block on the device poll.

mod device;

pub use device::WgpuDevice;
