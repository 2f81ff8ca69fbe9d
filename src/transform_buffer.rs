//! Packed GPU buffer of per-section deform transforms
//!
//! One 4x4 matrix per section, indexed by the section's transform slot.
//! Writes stage into a CPU-side copy and set a dirty flag; a single
//! [`TransformBuffer::flush`] uploads the whole array in one operation.
//! Batching many staged writes into one upload is the point of the
//! protocol: a frame that moves every section still costs one upload.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::gpu::{BufferDescriptor, BufferHandle, BufferUsage, GpuResult, RenderBackend};

/// A deform transform in the buffer's wire layout.
///
/// Stored row-major, i.e. transposed relative to the column-major
/// `glam::Mat4` the mutator works with. The shader left-multiplies the
/// vertex (`v * m == transpose(m) * v`), which recovers the original
/// matrix without a transpose on the GPU side.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuDeformTransform {
    pub rows: [[f32; 4]; 4],
}

impl GpuDeformTransform {
    pub const IDENTITY: Self = Self {
        rows: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Converts from the mutator-side column convention.
    #[inline]
    pub fn from_matrix(matrix: Mat4) -> Self {
        Self {
            rows: matrix.transpose().to_cols_array_2d(),
        }
    }

    /// Converts back to the mutator-side convention.
    #[inline]
    pub fn to_matrix(self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.rows).transpose()
    }
}

impl From<Mat4> for GpuDeformTransform {
    fn from(matrix: Mat4) -> Self {
        Self::from_matrix(matrix)
    }
}

/// The packed, resizable transform array and its GPU-visible copy.
///
/// The CPU-side `entries` are authoritative between flushes; the GPU copy
/// may lag but never regresses once a flush completes. Only the consumer
/// context may hold this type, which is what makes the single-writer rule
/// hold by construction.
pub struct TransformBuffer {
    backend: Arc<dyn RenderBackend>,
    entries: Vec<GpuDeformTransform>,
    buffer: Option<BufferHandle>,
    /// Entry capacity of the current GPU allocation.
    capacity: usize,
    dirty: bool,
    label: String,
}

impl TransformBuffer {
    pub fn new(backend: Arc<dyn RenderBackend>, label: &str) -> Self {
        Self {
            backend,
            entries: Vec::new(),
            buffer: None,
            capacity: 0,
            dirty: false,
            label: label.to_string(),
        }
    }

    /// Number of entries (== section count, holes included).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Handle to the GPU-visible copy, once allocated.
    pub fn buffer(&self) -> Option<BufferHandle> {
        self.buffer
    }

    /// Reads back a staged entry. `None` when out of range.
    pub fn entry(&self, index: usize) -> Option<GpuDeformTransform> {
        self.entries.get(index).copied()
    }

    /// Grows to at least `count` entries, identity-filling new slots.
    ///
    /// Never shrinks. Reallocates the GPU copy when the current allocation
    /// is too small, which marks the whole buffer dirty.
    pub fn ensure_capacity(&mut self, count: usize) -> GpuResult<()> {
        if count > self.entries.len() {
            self.entries.resize(count, GpuDeformTransform::IDENTITY);
            self.dirty = true;
        }
        self.ensure_allocation()
    }

    /// Sets the entry count exactly, used on structural changes.
    ///
    /// Existing entries are copied forward; new slots are identity-filled.
    /// Whenever the count changes, the GPU copy is reallocated so its size
    /// always matches the section list.
    pub fn resize(&mut self, count: usize) -> GpuResult<()> {
        if count != self.entries.len() {
            self.entries.resize(count, GpuDeformTransform::IDENTITY);
            self.reallocate()?;
        } else if self.buffer.is_none() && count > 0 {
            self.reallocate()?;
        }
        Ok(())
    }

    /// Stages a transform for one section. Out-of-range is a logged no-op.
    pub fn set_entry(&mut self, index: usize, transform: Mat4) {
        match self.entries.get_mut(index) {
            Some(entry) => {
                *entry = GpuDeformTransform::from_matrix(transform);
                self.dirty = true;
            }
            None => {
                log::warn!(
                    "transform stage for slot {} ignored (buffer has {} entries)",
                    index,
                    self.entries.len()
                );
            }
        }
    }

    /// Uploads the whole entries array if anything is staged.
    ///
    /// Returns whether an upload happened. Idempotent: a second flush with
    /// no intervening stage does nothing.
    pub fn flush(&mut self) -> GpuResult<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.ensure_allocation()?;
        if let Some(buffer) = self.buffer {
            self.backend
                .write_buffer(buffer, 0, bytemuck::cast_slice(&self.entries));
            log::trace!(
                "flushed {} deform transforms ({} bytes)",
                self.entries.len(),
                std::mem::size_of_val(self.entries.as_slice())
            );
        }
        self.dirty = false;
        Ok(true)
    }

    /// Allocates or grows the GPU copy to hold all current entries.
    fn ensure_allocation(&mut self) -> GpuResult<()> {
        if self.entries.len() > self.capacity || (self.buffer.is_none() && !self.entries.is_empty())
        {
            self.reallocate()?;
        }
        Ok(())
    }

    fn reallocate(&mut self) -> GpuResult<()> {
        if let Some(old) = self.buffer.take() {
            self.backend.destroy_buffer(old);
        }
        self.capacity = self.entries.len();
        if self.capacity == 0 {
            self.dirty = false;
            return Ok(());
        }
        let size = (self.capacity * std::mem::size_of::<GpuDeformTransform>()) as u64;
        let desc = BufferDescriptor::new(size, BufferUsage::STORAGE | BufferUsage::COPY_DST)
            .with_label(&self.label);
        self.buffer = Some(self.backend.create_buffer(&desc)?);
        // Fresh allocation holds no data yet; everything must re-upload.
        self.dirty = true;
        log::debug!(
            "reallocated '{}' for {} transforms ({} bytes)",
            self.label,
            self.capacity,
            size
        );
        Ok(())
    }
}

impl std::fmt::Debug for TransformBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformBuffer")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("dirty", &self.dirty)
            .field("label", &self.label)
            .finish()
    }
}
