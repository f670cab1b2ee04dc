//! The partitioned collection of live sub-buffers.
//!
//! Three sequences, one per category. A SubBuffer belongs to exactly one
//! sequence, chosen at insertion from its `(reuse, has_transparency)` flags,
//! and only ever leaves it when a combine pass replaces the whole sequence.

use std::cmp::Ordering;

use crate::buffer::SubBuffer;
use crate::device::GraphicsDevice;

/// The three live sequences a SubBuffer can be routed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferCategory {
    Opaque,
    Transparent,
    /// Instanced/shared geometry. Never combined.
    Reuse,
}

/// Partitioned storage for live sub-buffers. No GPU calls beyond releasing
/// resources in [`BufferPool::clear`]; everything else is metadata.
#[derive(Debug, Default)]
pub struct BufferPool {
    opaque: Vec<SubBuffer>,
    transparent: Vec<SubBuffer>,
    reuse: Vec<SubBuffer>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff all three sequences are empty.
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty() && self.reuse.is_empty()
    }

    /// Total number of live sub-buffers across all sequences.
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len() + self.reuse.len()
    }

    /// The sequence a buffer with these flags routes to. Reuse takes
    /// precedence over transparency.
    pub fn select(&self, transparency: bool, reuse: bool) -> &[SubBuffer] {
        if reuse {
            &self.reuse
        } else if transparency {
            &self.transparent
        } else {
            &self.opaque
        }
    }

    pub fn category(&self, category: BufferCategory) -> &[SubBuffer] {
        match category {
            BufferCategory::Opaque => &self.opaque,
            BufferCategory::Transparent => &self.transparent,
            BufferCategory::Reuse => &self.reuse,
        }
    }

    pub(crate) fn category_mut(&mut self, category: BufferCategory) -> &mut Vec<SubBuffer> {
        match category {
            BufferCategory::Opaque => &mut self.opaque,
            BufferCategory::Transparent => &mut self.transparent,
            BufferCategory::Reuse => &mut self.reuse,
        }
    }

    /// Append a buffer to the sequence selected by its own flags.
    pub fn insert(&mut self, buffer: SubBuffer) {
        if buffer.reuse {
            self.reuse.push(buffer);
        } else if buffer.has_transparency {
            self.transparent.push(buffer);
        } else {
            self.opaque.push(buffer);
        }
    }

    /// Sort each sequence in place by color key so same-colored objects draw
    /// adjacently. Even when a combine pass is later skipped, consecutive
    /// draws then share GPU state.
    pub fn sort_all(&mut self) {
        sort_by_color(&mut self.opaque);
        sort_by_color(&mut self.transparent);
        sort_by_color(&mut self.reuse);
    }

    /// Release every live sub-buffer's device resources and empty the pool.
    pub fn clear(&mut self, device: &dyn GraphicsDevice) {
        for buffer in self
            .opaque
            .drain(..)
            .chain(self.transparent.drain(..))
            .chain(self.reuse.drain(..))
        {
            buffer.destroy(device);
        }
    }
}

/// Stable lexicographic sort over the four color components, R then G then B
/// then A, ascending. Equal colors keep their relative order.
fn sort_by_color(buffers: &mut [SubBuffer]) {
    buffers.sort_by(|a, b| {
        for i in 0..4 {
            match a.color[i].total_cmp(&b.color[i]) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    });
}
