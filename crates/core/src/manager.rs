//! Composition root: the three live sequences plus the per-frame combine
//! driver.

use tracing::{info, warn};

use crate::buffer::SubBuffer;
use crate::combine::{BufferCombiner, CombineError};
use crate::device::GraphicsDevice;
use crate::pool::{BufferCategory, BufferPool};
use crate::programs::ProgramRegistry;
use crate::settings::RenderSettings;

/// Owns all live sub-buffers and drives consolidation.
///
/// Bound to the graphics context's thread: nothing here is re-entrant, and
/// no operation may run concurrently with another context call. The renderer's
/// per-frame driver is expected to run `sort_all` to completion before
/// `combine` reads a sequence.
#[derive(Debug, Default)]
pub struct GpuBufferManager {
    pool: BufferPool,
}

impl GpuBufferManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff no live sub-buffers exist in any category.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Hand a loaded SubBuffer to the manager. It joins the sequence selected
    /// by its own `(reuse, has_transparency)` flags.
    pub fn insert(&mut self, buffer: SubBuffer) {
        self.pool.insert(buffer);
    }

    /// The live sequence for the given flags; reuse wins over transparency.
    pub fn select(&self, transparency: bool, reuse: bool) -> &[SubBuffer] {
        self.pool.select(transparency, reuse)
    }

    /// Read-only view of one category's sequence.
    pub fn buffers(&self, category: BufferCategory) -> &[SubBuffer] {
        self.pool.category(category)
    }

    /// Sort all three sequences by color key.
    pub fn sort_all(&mut self) {
        self.pool.sort_all();
    }

    /// Merge a category's sub-buffers into one, returning the number of draw
    /// calls eliminated.
    ///
    /// The reuse category is never combined: each instanced entry is an
    /// independent instance source, and concatenating their geometry would
    /// destroy the per-instance transform semantics. Settings are read fresh
    /// on every invocation.
    pub fn combine(
        &mut self,
        category: BufferCategory,
        device: &dyn GraphicsDevice,
        programs: &dyn ProgramRegistry,
        settings: &RenderSettings,
    ) -> Result<usize, CombineError> {
        if category == BufferCategory::Reuse {
            return Ok(0);
        }

        let transparency = category == BufferCategory::Transparent;
        let combiner = BufferCombiner::new(device, programs);
        let result = combiner.combine(self.pool.category_mut(category), transparency, settings);

        match &result {
            Ok(eliminated) if *eliminated > 0 => {
                info!(?category, eliminated = *eliminated, "combined buffers");
            }
            Ok(_) => {}
            Err(err) => {
                warn!(?category, error = %err, "combine failed, batching skipped");
            }
        }
        result
    }

    /// Release every live sub-buffer's device resources and empty all
    /// sequences. Shutdown path.
    pub fn clear(&mut self, device: &dyn GraphicsDevice) {
        self.pool.clear(device);
    }
}
