//! wgpu implementation of the buffer backend

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{BufferDescriptor, BufferHandle, BufferUsage, GpuResult, RenderBackend};

/// Backend over a wgpu device and queue.
///
/// The device and queue are owned by the embedding renderer and cloned in
/// (both are internally reference-counted in wgpu). Buffer handles map to
/// `wgpu::Buffer` objects held here until destroyed.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffers: Mutex<HashMap<u64, wgpu::Buffer>>,
    next_id: AtomicU64,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            buffers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Resolve a handle to the underlying wgpu buffer, e.g. for bind groups.
    pub fn raw_buffer(&self, buffer: BufferHandle) -> Option<wgpu::Buffer> {
        self.buffers.lock().get(&buffer.0).cloned()
    }

    fn convert_buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
        let mut result = wgpu::BufferUsages::empty();
        if usage.contains(BufferUsage::COPY_SRC) {
            result |= wgpu::BufferUsages::COPY_SRC;
        }
        if usage.contains(BufferUsage::COPY_DST) {
            result |= wgpu::BufferUsages::COPY_DST;
        }
        if usage.contains(BufferUsage::INDEX) {
            result |= wgpu::BufferUsages::INDEX;
        }
        if usage.contains(BufferUsage::VERTEX) {
            result |= wgpu::BufferUsages::VERTEX;
        }
        if usage.contains(BufferUsage::UNIFORM) {
            result |= wgpu::BufferUsages::UNIFORM;
        }
        if usage.contains(BufferUsage::STORAGE) {
            result |= wgpu::BufferUsages::STORAGE;
        }
        result
    }
}

impl RenderBackend for WgpuBackend {
    fn create_buffer(&self, desc: &BufferDescriptor) -> GpuResult<BufferHandle> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label.as_deref(),
            size: desc.size,
            usage: Self::convert_buffer_usage(desc.usage),
            mapped_at_creation: false,
        });

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.buffers.lock().insert(id, buffer);

        Ok(BufferHandle(id))
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(buf) = self.buffers.lock().get(&buffer.0) {
            self.queue.write_buffer(buf, offset, data);
        } else {
            log::warn!("write to unknown buffer {:?}", buffer);
        }
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        if let Some(buf) = self.buffers.lock().remove(&buffer.0) {
            buf.destroy();
        }
    }
}
