//! GPU backend abstraction for buffer resources
//!
//! The section system only needs buffer creation and whole/partial writes,
//! so the backend trait is restricted to those. The [`HeadlessBackend`]
//! keeps everything in host memory for tests and tools; the wgpu backend
//! (feature `wgpu-backend`) talks to a real device.

mod headless;
#[cfg(feature = "wgpu-backend")]
mod wgpu_backend;

pub use headless::HeadlessBackend;
#[cfg(feature = "wgpu-backend")]
pub use wgpu_backend::WgpuBackend;

use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Unknown buffer handle {0:?}")]
    InvalidHandle(BufferHandle),
}

pub type GpuResult<T> = Result<T, GpuError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

impl BufferHandle {
    /// Wraps a backend-chosen identifier. For external [`RenderBackend`]
    /// implementations.
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Buffer usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferUsage(u32);

impl BufferUsage {
    pub const COPY_SRC: Self = Self(1 << 0);
    pub const COPY_DST: Self = Self(1 << 1);
    pub const INDEX: Self = Self(1 << 2);
    pub const VERTEX: Self = Self(1 << 3);
    pub const UNIFORM: Self = Self(1 << 4);
    pub const STORAGE: Self = Self(1 << 5);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for BufferUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Buffer descriptor
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }
}

/// Minimal device interface the section system renders through.
///
/// Writes are queued by the backend and ordered against draw submission by
/// the embedding renderer; `write_buffer` on an unknown handle is a logged
/// no-op rather than an error, matching queue-write semantics.
pub trait RenderBackend: Send + Sync {
    fn create_buffer(&self, desc: &BufferDescriptor) -> GpuResult<BufferHandle>;

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]);

    fn destroy_buffer(&self, buffer: BufferHandle);
}
