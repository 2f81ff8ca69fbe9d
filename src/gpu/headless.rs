//! In-memory backend for tests and headless tools

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{BufferDescriptor, BufferHandle, GpuResult, RenderBackend};

/// A backend that stores buffer contents in host memory.
///
/// Useful for exercising the full staging/flush protocol without a GPU:
/// tests can read buffer contents back and count uploads.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    buffers: Mutex<HashMap<u64, Vec<u8>>>,
    next_id: AtomicU64,
    write_count: AtomicU64,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `write_buffer` calls issued so far.
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Snapshot of a buffer's current contents.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.buffers.lock().get(&buffer.0).cloned()
    }

    /// Number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.lock().len()
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_buffer(&self, desc: &BufferDescriptor) -> GpuResult<BufferHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.buffers.lock().insert(id, vec![0; desc.size as usize]);
        Ok(BufferHandle(id))
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        let mut buffers = self.buffers.lock();
        let Some(contents) = buffers.get_mut(&buffer.0) else {
            log::warn!("write to unknown buffer {:?}", buffer);
            return;
        };
        let offset = offset as usize;
        let end = offset + data.len();
        if end > contents.len() {
            log::warn!(
                "write of {} bytes at offset {} overruns buffer of {} bytes",
                data.len(),
                offset,
                contents.len()
            );
            return;
        }
        contents[offset..end].copy_from_slice(data);
        self.write_count.fetch_add(1, Ordering::Relaxed);
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        self.buffers.lock().remove(&buffer.0);
    }
}
