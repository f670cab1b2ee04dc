//! Buffer consolidation: merges every SubBuffer in one category into a
//! single SubBuffer to cut draw-call count.
//!
//! The merge concatenates the four attribute streams of all sources into
//! freshly allocated destination buffers, rebasing index values across the
//! concatenated vertex range, then binds a new vertex array for the result.
//!
//! # Invariants
//! - A merge either fully succeeds and replaces the sequence, or fully fails
//!   and leaves the sequence and every source resource intact. Sources are
//!   only released after the merged SubBuffer is complete and bound.
//! - One vertex layout is resolved per merge and used for every byte offset.

use tracing::debug;

use crate::buffer::{BufferId, SubBuffer, VertexArrayId};
use crate::device::{AttributeBinding, BufferKind, DeviceError, GraphicsDevice};
use crate::format::VertexLayout;
use crate::programs::{ProgramConfig, ProgramRegistry};
use crate::settings::RenderSettings;

/// A failed combine. The sequence it was invoked on is always left exactly as
/// it was; callers log the error and treat it as "batching skipped".
#[derive(Debug, thiserror::Error)]
pub enum CombineError {
    #[error("merged buffer allocation failed: {0}")]
    Allocation(#[source] DeviceError),
    #[error("geometry copy failed: {0}")]
    Copy(#[source] DeviceError),
    #[error("attribute binding failed: {0}")]
    Bind(#[source] DeviceError),
    #[error("merged element count {elements} exceeds the 32-bit range")]
    Overflow { elements: u64 },
}

/// Destination buffers of one in-flight merge.
struct MergeTargets {
    positions: BufferId,
    normals: BufferId,
    colors: BufferId,
    indices: BufferId,
}

/// Summed element counts across all sources of one merge.
#[derive(Debug, Clone, Copy, Default)]
struct ElementTotals {
    positions: u64,
    normals: u64,
    colors: u64,
    indices: u64,
}

/// Performs the merge algorithm against a graphics device and a program
/// registry. Stateless between calls.
pub struct BufferCombiner<'a> {
    device: &'a dyn GraphicsDevice,
    programs: &'a dyn ProgramRegistry,
}

impl<'a> BufferCombiner<'a> {
    pub fn new(device: &'a dyn GraphicsDevice, programs: &'a dyn ProgramRegistry) -> Self {
        Self { device, programs }
    }

    /// Merge every SubBuffer in `buffers` into one, replacing the sequence
    /// contents with the single merged entry. Returns the number of draw
    /// calls eliminated (`previous length - 1`), or 0 when there is nothing
    /// to do: one entry or fewer, or per-object colors are enabled (each
    /// draw then needs its own uniform color state).
    pub fn combine(
        &self,
        buffers: &mut Vec<SubBuffer>,
        transparency: bool,
        settings: &RenderSettings,
    ) -> Result<usize, CombineError> {
        if settings.use_object_colors || buffers.len() <= 1 {
            return Ok(0);
        }
        debug!(count = buffers.len(), transparency, "combining buffers");

        let mut totals = ElementTotals::default();
        for buffer in buffers.iter() {
            debug_assert_eq!(buffer.position_elements % 3, 0);
            debug_assert_eq!(buffer.color_elements % 4, 0);
            totals.positions += u64::from(buffer.position_elements);
            totals.normals += u64::from(buffer.normal_elements);
            totals.colors += u64::from(buffer.color_elements);
            totals.indices += u64::from(buffer.index_elements);
        }

        // Element counts are stored as u32 on the merged SubBuffer; a
        // sequence whose sums exceed that range cannot be merged.
        let largest = totals
            .positions
            .max(totals.normals)
            .max(totals.colors)
            .max(totals.indices);
        if largest > u64::from(u32::MAX) {
            return Err(CombineError::Overflow { elements: largest });
        }

        let layout = VertexLayout::resolve(settings);
        let targets = self
            .allocate_targets(&layout, totals)
            .map_err(CombineError::Allocation)?;

        if let Err(err) = self.copy_sources(buffers, &targets, &layout) {
            self.release_targets(&targets);
            return Err(CombineError::Copy(err));
        }

        let vertex_array = match self.bind_targets(&targets, &layout, settings) {
            Ok(vertex_array) => vertex_array,
            Err(err) => {
                self.release_targets(&targets);
                return Err(err);
            }
        };

        let merged = SubBuffer {
            position_buffer: targets.positions,
            normal_buffer: targets.normals,
            color_buffer: targets.colors,
            index_buffer: targets.indices,
            vertex_array,
            position_elements: totals.positions as u32,
            normal_elements: totals.normals as u32,
            color_elements: totals.colors as u32,
            index_elements: totals.indices as u32,
            // The merged buffer spans many object colors; it no longer has a
            // meaningful sort key.
            color: [0.0; 4],
            has_transparency: transparency,
            reuse: false,
        };

        // The destination is complete and bound; only now is it safe to
        // consume the sources.
        let consumed = std::mem::replace(buffers, vec![merged]);
        let eliminated = consumed.len() - 1;
        for source in consumed {
            source.destroy(self.device);
        }

        debug!(eliminated, "combine complete");
        Ok(eliminated)
    }

    /// Allocate the four destination buffers, zero-initialized. On failure
    /// any buffer created so far is released before the error propagates.
    fn allocate_targets(
        &self,
        layout: &VertexLayout,
        totals: ElementTotals,
    ) -> Result<MergeTargets, DeviceError> {
        let mut created: Vec<BufferId> = Vec::with_capacity(4);
        let mut create = |kind: BufferKind, byte_size: u64| -> Result<BufferId, DeviceError> {
            let id = self.device.create_buffer(kind, byte_size)?;
            created.push(id);
            Ok(id)
        };

        let result = (|| {
            let positions = create(
                BufferKind::Vertex,
                totals.positions * layout.positions.size_bytes(),
            )?;
            let normals = create(
                BufferKind::Vertex,
                totals.normals * layout.normals.size_bytes(),
            )?;
            let colors = create(
                BufferKind::Vertex,
                totals.colors * layout.colors.size_bytes(),
            )?;
            let indices = create(
                BufferKind::Index,
                totals.indices * layout.indices.size_bytes(),
            )?;
            Ok(MergeTargets {
                positions,
                normals,
                colors,
                indices,
            })
        })();

        if result.is_err() {
            for id in created {
                self.device.delete_buffer(id);
            }
        }
        result
    }

    /// Copy every source's streams into the destinations, in sequence order,
    /// rebasing indices past the first source. Sources are left untouched.
    fn copy_sources(
        &self,
        buffers: &[SubBuffer],
        targets: &MergeTargets,
        layout: &VertexLayout,
    ) -> Result<(), DeviceError> {
        let position_size = layout.positions.size_bytes();
        let normal_size = layout.normals.size_bytes();
        let color_size = layout.colors.size_bytes();
        let index_size = layout.indices.size_bytes();

        let mut positions_offset: u64 = 0;
        let mut normals_offset: u64 = 0;
        let mut colors_offset: u64 = 0;
        let mut indices_offset: u64 = 0;

        for buffer in buffers {
            self.device.copy_buffer_range(
                buffer.position_buffer,
                targets.positions,
                0,
                positions_offset * position_size,
                u64::from(buffer.position_elements) * position_size,
            )?;
            self.device.copy_buffer_range(
                buffer.normal_buffer,
                targets.normals,
                0,
                normals_offset * normal_size,
                u64::from(buffer.normal_elements) * normal_size,
            )?;
            self.device.copy_buffer_range(
                buffer.color_buffer,
                targets.colors,
                0,
                colors_offset * color_size,
                u64::from(buffer.color_elements) * color_size,
            )?;

            if positions_offset == 0 {
                // First source: indices already address the right vertices.
                self.device.copy_buffer_range(
                    buffer.index_buffer,
                    targets.indices,
                    0,
                    0,
                    u64::from(buffer.index_elements) * index_size,
                )?;
            } else {
                // Each vertex consumes 3 position elements, so the vertex
                // base of this source is the accumulated position count / 3.
                let base = (positions_offset / 3) as u32;
                let mut indices = vec![0u32; buffer.index_elements as usize];
                self.device.read_buffer_range(
                    buffer.index_buffer,
                    0,
                    bytemuck::cast_slice_mut(&mut indices),
                )?;
                for index in &mut indices {
                    *index += base;
                }
                self.device.write_buffer_range(
                    targets.indices,
                    indices_offset * index_size,
                    bytemuck::cast_slice(&indices),
                )?;
            }

            positions_offset += u64::from(buffer.position_elements);
            normals_offset += u64::from(buffer.normal_elements);
            colors_offset += u64::from(buffer.color_elements);
            indices_offset += u64::from(buffer.index_elements);
        }
        Ok(())
    }

    /// Create the merged vertex array and attach the three attribute streams
    /// at the locations the program registry resolves for this configuration.
    fn bind_targets(
        &self,
        targets: &MergeTargets,
        layout: &VertexLayout,
        settings: &RenderSettings,
    ) -> Result<VertexArrayId, CombineError> {
        let info = self.programs.get_program(ProgramConfig {
            instancing: false,
            use_object_colors: settings.use_object_colors,
            quantize_normals: settings.quantize_normals,
            quantize_vertices: settings.quantize_vertices,
        });

        let vertex_array = self
            .device
            .create_vertex_array()
            .map_err(CombineError::Allocation)?;

        let result = (|| {
            self.device.bind_attribute(
                vertex_array,
                AttributeBinding {
                    location: info.position_location,
                    buffer: targets.positions,
                    components: 3,
                    ty: layout.positions,
                    stride: 0,
                    offset: 0,
                },
            )?;
            self.device.bind_attribute(
                vertex_array,
                AttributeBinding {
                    location: info.normal_location,
                    buffer: targets.normals,
                    components: 3,
                    ty: layout.normals,
                    stride: 0,
                    offset: 0,
                },
            )?;
            self.device.bind_attribute(
                vertex_array,
                AttributeBinding {
                    location: info.color_location,
                    buffer: targets.colors,
                    components: 4,
                    ty: layout.colors,
                    stride: 0,
                    offset: 0,
                },
            )?;
            self.device.set_index_buffer(vertex_array, targets.indices)
        })();

        match result {
            Ok(()) => Ok(vertex_array),
            Err(err) => {
                self.device.delete_vertex_array(vertex_array);
                Err(CombineError::Bind(err))
            }
        }
    }

    fn release_targets(&self, targets: &MergeTargets) {
        self.device.delete_buffer(targets.positions);
        self.device.delete_buffer(targets.normals);
        self.device.delete_buffer(targets.colors);
        self.device.delete_buffer(targets.indices);
    }
}
