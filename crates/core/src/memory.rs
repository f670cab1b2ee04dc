//! In-memory headless device.
//!
//! Implements the full [`GraphicsDevice`] contract over host `Vec<u8>`
//! storage. Used for headless runs and as the test device; exposes
//! introspection (buffer contents, resource counts) and fault injection
//! (allocation limits, transfer and binding failures) so failure paths can
//! be exercised deterministically.
//!
//! Single-threaded by design, matching the engine's execution model: state
//! lives in a `RefCell`, not behind a lock.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::buffer::{BufferId, VertexArrayId};
use crate::device::{
    AttributeBinding, BufferKind, DeviceError, GraphicsDevice, VertexArrayRecord,
};

#[derive(Default)]
struct State {
    next_id: u64,
    buffers: BTreeMap<BufferId, Vec<u8>>,
    vertex_arrays: BTreeMap<VertexArrayId, VertexArrayRecord>,
    allocated: u64,
    allocation_limit: Option<u64>,
    transfers_until_failure: Option<u32>,
    bindings_until_failure: Option<u32>,
}

impl State {
    fn take_transfer_budget(&mut self) -> Result<(), DeviceError> {
        Self::take_budget(&mut self.transfers_until_failure)
    }

    fn take_binding_budget(&mut self) -> Result<(), DeviceError> {
        Self::take_budget(&mut self.bindings_until_failure)
    }

    fn take_budget(budget: &mut Option<u32>) -> Result<(), DeviceError> {
        match budget {
            Some(0) => Err(DeviceError::ContextLost),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Headless in-memory [`GraphicsDevice`].
#[derive(Default)]
pub struct MemoryDevice {
    state: RefCell<State>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap total allocated bytes; `create_buffer` beyond the cap reports
    /// [`DeviceError::OutOfMemory`].
    pub fn set_allocation_limit(&self, limit: Option<u64>) {
        self.state.borrow_mut().allocation_limit = limit;
    }

    /// Let the next `n` transfer operations (copy/read/write) succeed, then
    /// fail every one after that with [`DeviceError::ContextLost`].
    pub fn fail_transfers_after(&self, n: u32) {
        self.state.borrow_mut().transfers_until_failure = Some(n);
    }

    /// Let the next `n` vertex-array binding operations (attribute binds,
    /// index-buffer assignment) succeed, then fail every one after that with
    /// [`DeviceError::ContextLost`].
    pub fn fail_bindings_after(&self, n: u32) {
        self.state.borrow_mut().bindings_until_failure = Some(n);
    }

    /// Current contents of a buffer, if it exists.
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer).cloned()
    }

    pub fn buffer_count(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    pub fn vertex_array_count(&self) -> usize {
        self.state.borrow().vertex_arrays.len()
    }

    /// Recorded binding state of a vertex array, if it exists.
    pub fn vertex_array_record(&self, vertex_array: VertexArrayId) -> Option<VertexArrayRecord> {
        self.state
            .borrow()
            .vertex_arrays
            .get(&vertex_array)
            .cloned()
    }
}

fn check_range(offset: u64, len: u64, size: u64) -> Result<(), DeviceError> {
    if offset.checked_add(len).is_none_or(|end| end > size) {
        return Err(DeviceError::InvalidRange { offset, len, size });
    }
    Ok(())
}

impl GraphicsDevice for MemoryDevice {
    fn create_buffer(&self, _kind: BufferKind, byte_size: u64) -> Result<BufferId, DeviceError> {
        let mut state = self.state.borrow_mut();
        if let Some(limit) = state.allocation_limit {
            let total = state.allocated.checked_add(byte_size);
            if total.is_none_or(|total| total > limit) {
                return Err(DeviceError::OutOfMemory {
                    requested: byte_size,
                });
            }
        }
        state.next_id += 1;
        let id = BufferId(state.next_id);
        state.buffers.insert(id, vec![0; byte_size as usize]);
        state.allocated += byte_size;
        Ok(id)
    }

    fn delete_buffer(&self, buffer: BufferId) {
        let mut state = self.state.borrow_mut();
        if let Some(data) = state.buffers.remove(&buffer) {
            state.allocated -= data.len() as u64;
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
        let mut state = self.state.borrow_mut();
        state.take_transfer_budget()?;

        let src_data = state
            .buffers
            .get(&src)
            .ok_or(DeviceError::UnknownBuffer(src))?;
        check_range(src_offset, byte_len, src_data.len() as u64)?;
        let chunk =
            src_data[src_offset as usize..(src_offset + byte_len) as usize].to_vec();

        let dst_data = state
            .buffers
            .get_mut(&dst)
            .ok_or(DeviceError::UnknownBuffer(dst))?;
        check_range(dst_offset, byte_len, dst_data.len() as u64)?;
        dst_data[dst_offset as usize..(dst_offset + byte_len) as usize].copy_from_slice(&chunk);
        Ok(())
    }

    fn read_buffer_range(
        &self,
        src: BufferId,
        offset: u64,
        out: &mut [u8],
    ) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        state.take_transfer_budget()?;

        let data = state
            .buffers
            .get(&src)
            .ok_or(DeviceError::UnknownBuffer(src))?;
        check_range(offset, out.len() as u64, data.len() as u64)?;
        out.copy_from_slice(&data[offset as usize..offset as usize + out.len()]);
        Ok(())
    }

    fn write_buffer_range(
        &self,
        dst: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        state.take_transfer_budget()?;

        let buffer = state
            .buffers
            .get_mut(&dst)
            .ok_or(DeviceError::UnknownBuffer(dst))?;
        check_range(offset, data.len() as u64, buffer.len() as u64)?;
        buffer[offset as usize..offset as usize + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn create_vertex_array(&self) -> Result<VertexArrayId, DeviceError> {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = VertexArrayId(state.next_id);
        state.vertex_arrays.insert(id, VertexArrayRecord::default());
        Ok(id)
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayId) {
        self.state.borrow_mut().vertex_arrays.remove(&vertex_array);
    }

    fn bind_attribute(
        &self,
        vertex_array: VertexArrayId,
        binding: AttributeBinding,
    ) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        state.take_binding_budget()?;
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
        let mut state = self.state.borrow_mut();
        state.take_binding_budget()?;
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
