use std::collections::BTreeMap;
use std::sync::Mutex;

use meshbatch_core::{
    AttributeBinding, BufferId, BufferKind, DeviceError, GraphicsDevice, VertexArrayId,
    VertexArrayRecord,
};
use tracing::trace;

struct State {
    next_id: u64,
    buffers: BTreeMap<BufferId, wgpu::Buffer>,
    vertex_arrays: BTreeMap<VertexArrayId, VertexArrayRecord>,
}

/// [`GraphicsDevice`] over a `wgpu::Device`/`wgpu::Queue` pair.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    state: Mutex<State>,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            state: Mutex::new(State {
                next_id: 0,
                buffers: BTreeMap::new(),
                vertex_arrays: BTreeMap::new(),
            }),
        }
    }

    /// The underlying wgpu buffer for a handle, for the draw layer.
    pub fn buffer(&self, id: BufferId) -> Option<wgpu::Buffer> {
        self.state.lock().unwrap().buffers.get(&id).cloned()
    }

    /// Recorded binding state of a vertex array, for the draw layer.
    pub fn vertex_array_record(&self, id: VertexArrayId) -> Option<VertexArrayRecord> {
        self.state.lock().unwrap().vertex_arrays.get(&id).cloned()
    }
}

/// wgpu rejects copy offsets and sizes that are not multiples of the copy
/// granularity. Surface that as an explicit error instead of padding: padded
/// transfers would stomp neighboring stream bytes.
fn check_alignment(offset: u64, len: u64) -> Result<(), DeviceError> {
    const ALIGN: u64 = wgpu::COPY_BUFFER_ALIGNMENT;
    if offset % ALIGN != 0 || len % ALIGN != 0 {
        return Err(DeviceError::MisalignedRange {
            offset,
            len,
            required: ALIGN,
        });
    }
    Ok(())
}

fn check_range(offset: u64, len: u64, size: u64) -> Result<(), DeviceError> {
    if offset.checked_add(len).is_none_or(|end| end > size) {
        return Err(DeviceError::InvalidRange { offset, len, size });
    }
    Ok(())
}

impl GraphicsDevice for WgpuDevice {
    fn create_buffer(&self, kind: BufferKind, byte_size: u64) -> Result<BufferId, DeviceError> {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST;

        self.device
            .push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size: byte_size,
            usage,
            mapped_at_creation: false,
        });
        if pollster::block_on(self.device.pop_error_scope()).is_some() {
            return Err(DeviceError::OutOfMemory {
                requested: byte_size,
            });
        }

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = BufferId(state.next_id);
        trace!(?id, byte_size, ?kind, "created buffer");
        state.buffers.insert(id, buffer);
        Ok(id)
    }

    fn delete_buffer(&self, buffer: BufferId) {
        if let Some(buffer) = self.state.lock().unwrap().buffers.remove(&buffer) {
            buffer.destroy();
        }
    }

    fn copy_buffer_range(
        &self,
        src: BufferId,
        dst: BufferId,
        src_offset: u64,
        dst_offset: u64,
        byte_len: u64,
    ) -> Result<(), DeviceError> {
        check_alignment(src_offset, byte_len)?;
        check_alignment(dst_offset, byte_len)?;
        if byte_len == 0 {
            return Ok(());
        }

        let state = self.state.lock().unwrap();
        let src_buffer = state
            .buffers
            .get(&src)
            .ok_or(DeviceError::UnknownBuffer(src))?;
        let dst_buffer = state
            .buffers
            .get(&dst)
            .ok_or(DeviceError::UnknownBuffer(dst))?;
        check_range(src_offset, byte_len, src_buffer.size())?;
        check_range(dst_offset, byte_len, dst_buffer.size())?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("meshbatch_copy"),
            });
        encoder.copy_buffer_to_buffer(src_buffer, src_offset, dst_buffer, dst_offset, byte_len);
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn read_buffer_range(
        &self,
        src: BufferId,
        offset: u64,
        out: &mut [u8],
    ) -> Result<(), DeviceError> {
        let byte_len = out.len() as u64;
        check_alignment(offset, byte_len)?;
        if byte_len == 0 {
            return Ok(());
        }

        let staging = {
            let state = self.state.lock().unwrap();
            let src_buffer = state
                .buffers
                .get(&src)
                .ok_or(DeviceError::UnknownBuffer(src))?;
            check_range(offset, byte_len, src_buffer.size())?;

            let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("meshbatch_readback"),
                size: byte_len,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let mut encoder =
                self.device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("meshbatch_readback"),
                    });
            encoder.copy_buffer_to_buffer(src_buffer, offset, &staging, 0, byte_len);
            self.queue.submit(std::iter::once(encoder.finish()));
            staging
        };

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            _ => return Err(DeviceError::ContextLost),
        }
        out.copy_from_slice(&slice.get_mapped_range());
        staging.unmap();
        Ok(())
    }

    fn write_buffer_range(
        &self,
        dst: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        check_alignment(offset, data.len() as u64)?;
        if data.is_empty() {
            return Ok(());
        }

        let state = self.state.lock().unwrap();
        let dst_buffer = state
            .buffers
            .get(&dst)
            .ok_or(DeviceError::UnknownBuffer(dst))?;
        check_range(offset, data.len() as u64, dst_buffer.size())?;
        self.queue.write_buffer(dst_buffer, offset, data);
        Ok(())
    }

    fn create_vertex_array(&self) -> Result<VertexArrayId, DeviceError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = VertexArrayId(state.next_id);
        state.vertex_arrays.insert(id, VertexArrayRecord::default());
        Ok(id)
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayId) {
        self.state
            .lock()
            .unwrap()
            .vertex_arrays
            .remove(&vertex_array);
    }

    fn bind_attribute(
        &self,
        vertex_array: VertexArrayId,
        binding: AttributeBinding,
    ) -> Result<(), DeviceError> {
        let mut state = self.state.lock().unwrap();
        if !state.buffers.contains_key(&binding.buffer) {
            return Err(DeviceError::UnknownBuffer(binding.buffer));
        }
        let record = state
            .vertex_arrays
            .get_mut(&vertex_array)
            .ok_or(DeviceError::UnknownVertexArray(vertex_array))?;
        record.attributes.push(binding);
        Ok(())
    }

    fn set_index_buffer(
        &self,
        vertex_array: VertexArrayId,
        buffer: BufferId,
    ) -> Result<(), DeviceError> {
        let mut state = self.state.lock().unwrap();
        if !state.buffers.contains_key(&buffer) {
            return Err(DeviceError::UnknownBuffer(buffer));
        }
        let record = state
            .vertex_arrays
            .get_mut(&vertex_array)
            .ok_or(DeviceError::UnknownVertexArray(vertex_array))?;
        record.index_buffer = Some(buffer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshbatch_core::{
        BufferCategory, GpuBufferManager, ProgramTable, RenderSettings, SubBuffer,
    };

    fn create_device() -> Option<WgpuDevice> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::None,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("meshbatch_test_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .ok()?;
        Some(WgpuDevice::new(device, queue))
    }

    fn geometry(device: &WgpuDevice, vertex_count: u32, index_count: u32) -> SubBuffer {
        let positions: Vec<f32> = (0..vertex_count * 3).map(|i| i as f32).collect();
        let normals = vec![1.0f32; (vertex_count * 3) as usize];
        let colors = vec![0.5f32; (vertex_count * 4) as usize];
        let indices: Vec<u32> = (0..index_count).map(|i| i % vertex_count).collect();

        let upload = |kind, data: &[u8]| {
            let id = device.create_buffer(kind, data.len() as u64).unwrap();
            device.write_buffer_range(id, 0, data).unwrap();
            id
        };
        SubBuffer {
            position_buffer: upload(BufferKind::Vertex, bytemuck::cast_slice(&positions)),
            normal_buffer: upload(BufferKind::Vertex, bytemuck::cast_slice(&normals)),
            color_buffer: upload(BufferKind::Vertex, bytemuck::cast_slice(&colors)),
            index_buffer: upload(BufferKind::Index, bytemuck::cast_slice(&indices)),
            vertex_array: device.create_vertex_array().unwrap(),
            position_elements: vertex_count * 3,
            normal_elements: vertex_count * 3,
            color_elements: vertex_count * 4,
            index_elements: index_count,
            color: [0.0; 4],
            has_transparency: false,
            reuse: false,
        }
    }

    #[test]
    fn buffer_transfer_roundtrip() {
        let Some(device) = create_device() else {
            eprintln!("no gpu adapter available, skipping");
            return;
        };

        let src = device.create_buffer(BufferKind::Vertex, 16).unwrap();
        let dst = device.create_buffer(BufferKind::Vertex, 16).unwrap();
        let data: Vec<u8> = (0..16).collect();
        device.write_buffer_range(src, 0, &data).unwrap();
        device.copy_buffer_range(src, dst, 0, 0, 16).unwrap();

        let mut out = [0u8; 16];
        device.read_buffer_range(dst, 0, &mut out).unwrap();
        assert_eq!(out.as_slice(), data.as_slice());
    }

    #[test]
    fn misaligned_ranges_are_rejected() {
        let Some(device) = create_device() else {
            eprintln!("no gpu adapter available, skipping");
            return;
        };

        let buffer = device.create_buffer(BufferKind::Vertex, 16).unwrap();
        let err = device.write_buffer_range(buffer, 2, &[0; 4]).unwrap_err();
        assert!(matches!(err, DeviceError::MisalignedRange { .. }));
        let err = device.write_buffer_range(buffer, 0, &[0; 3]).unwrap_err();
        assert!(matches!(err, DeviceError::MisalignedRange { .. }));
    }

    #[test]
    fn combine_runs_against_wgpu() {
        let Some(device) = create_device() else {
            eprintln!("no gpu adapter available, skipping");
            return;
        };

        let programs = ProgramTable::new();
        let settings = RenderSettings::default();
        let mut manager = GpuBufferManager::new();
        manager.insert(geometry(&device, 3, 3));
        manager.insert(geometry(&device, 3, 3));

        let eliminated = manager
            .combine(BufferCategory::Opaque, &device, &programs, &settings)
            .unwrap();
        assert_eq!(eliminated, 1);

        let merged = &manager.buffers(BufferCategory::Opaque)[0];
        assert_eq!(merged.index_elements, 6);

        let mut raw = vec![0u8; 24];
        device
            .read_buffer_range(merged.index_buffer, 0, &mut raw)
            .unwrap();
        let indices: Vec<u32> = raw
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);

        manager.clear(&device);
    }
}
