//! Shared test fixtures.

use crate::buffer::{BufferId, SubBuffer, VertexArrayId};
use crate::device::{BufferKind, GraphicsDevice};
use crate::memory::MemoryDevice;

/// A SubBuffer with no backing device resources, for routing and sort tests.
/// `tag` lands in `index_elements` so orderings stay observable.
pub(crate) fn stub(color: [f32; 4], has_transparency: bool, reuse: bool, tag: u32) -> SubBuffer {
    SubBuffer {
        position_buffer: BufferId(0),
        normal_buffer: BufferId(0),
        color_buffer: BufferId(0),
        index_buffer: BufferId(0),
        vertex_array: VertexArrayId(0),
        position_elements: 0,
        normal_elements: 0,
        color_elements: 0,
        index_elements: tag,
        color,
        has_transparency,
        reuse,
    }
}

/// Upload synthetic full-precision geometry: `vertex_count` vertices with
/// distinct position values and `index_count` indices cycling through the
/// vertex range.
pub(crate) fn geometry(
    device: &MemoryDevice,
    vertex_count: u32,
    index_count: u32,
    color: [f32; 4],
    has_transparency: bool,
) -> SubBuffer {
    build(device, vertex_count, index_count, color, has_transparency, false)
}

/// Same as [`geometry`] but flagged as instanced/shared.
pub(crate) fn geometry_reuse(
    device: &MemoryDevice,
    vertex_count: u32,
    index_count: u32,
    color: [f32; 4],
) -> SubBuffer {
    build(device, vertex_count, index_count, color, false, true)
}

fn build(
    device: &MemoryDevice,
    vertex_count: u32,
    index_count: u32,
    color: [f32; 4],
    has_transparency: bool,
    reuse: bool,
) -> SubBuffer {
    let positions: Vec<f32> = (0..vertex_count * 3).map(|i| i as f32).collect();
    let normals: Vec<f32> = (0..vertex_count * 3).map(|_| 1.0).collect();
    let colors: Vec<f32> = (0..vertex_count * 4).map(|_| 0.5).collect();
    let indices: Vec<u32> = (0..index_count).map(|i| i % vertex_count).collect();

    let position_buffer = upload(device, BufferKind::Vertex, bytemuck::cast_slice(&positions));
    let normal_buffer = upload(device, BufferKind::Vertex, bytemuck::cast_slice(&normals));
    let color_buffer = upload(device, BufferKind::Vertex, bytemuck::cast_slice(&colors));
    let index_buffer = upload(device, BufferKind::Index, bytemuck::cast_slice(&indices));
    let vertex_array = device.create_vertex_array().unwrap();

    SubBuffer {
        position_buffer,
        normal_buffer,
        color_buffer,
        index_buffer,
        vertex_array,
        position_elements: vertex_count * 3,
        normal_elements: vertex_count * 3,
        color_elements: vertex_count * 4,
        index_elements: index_count,
        color,
        has_transparency,
        reuse,
    }
}

/// Upload synthetic quantized geometry: 16-bit positions, 8-bit normals.
pub(crate) fn quantized_geometry(
    device: &MemoryDevice,
    vertex_count: u32,
    index_count: u32,
    color: [f32; 4],
    has_transparency: bool,
) -> SubBuffer {
    let positions: Vec<i16> = (0..vertex_count * 3).map(|i| i as i16).collect();
    let normals: Vec<i8> = (0..vertex_count * 3).map(|_| 127).collect();
    let colors: Vec<f32> = (0..vertex_count * 4).map(|_| 0.5).collect();
    let indices: Vec<u32> = (0..index_count).map(|i| i % vertex_count).collect();

    let position_buffer = upload(device, BufferKind::Vertex, bytemuck::cast_slice(&positions));
    let normal_buffer = upload(device, BufferKind::Vertex, bytemuck::cast_slice(&normals));
    let color_buffer = upload(device, BufferKind::Vertex, bytemuck::cast_slice(&colors));
    let index_buffer = upload(device, BufferKind::Index, bytemuck::cast_slice(&indices));
    let vertex_array = device.create_vertex_array().unwrap();

    SubBuffer {
        position_buffer,
        normal_buffer,
        color_buffer,
        index_buffer,
        vertex_array,
        position_elements: vertex_count * 3,
        normal_elements: vertex_count * 3,
        color_elements: vertex_count * 4,
        index_elements: index_count,
        color,
        has_transparency,
        reuse: false,
    }
}

fn upload(device: &MemoryDevice, kind: BufferKind, data: &[u8]) -> BufferId {
    let buffer = device.create_buffer(kind, data.len() as u64).unwrap();
    device.write_buffer_range(buffer, 0, data).unwrap();
    buffer
}
