//! Sectioned mesh rendering with per-section GPU deform transforms
//!
//! A mesh here is a list of independent *sections*, each drawn with one
//! material and deformed at draw time by a single secondary transform. The
//! transforms of all sections live packed in one GPU buffer, so moving
//! many sections in a frame costs one upload and no per-vertex re-upload.
//!
//! Two execution contexts split the work:
//! - the **mutator** context owns [`DeformMeshComponent`] and the
//!   authoritative section list;
//! - the **consumer** context owns [`DeformMeshRenderProxy`], the only
//!   type allowed to rebuild the render mirror or touch the GPU buffer.
//!
//! The mutator never shares references with the consumer; every change
//! travels as a staged command and becomes visible atomically when the
//! proxy processes a commit.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use glam::{Mat4, Vec3};
//! use deform_mesh::{
//!     DeformMeshComponent, DeformMeshConfig, HeadlessBackend, MaterialHandle, MeshGeometry,
//! };
//!
//! let mut mesh = DeformMeshComponent::new(DeformMeshConfig::default());
//! let backend = Arc::new(HeadlessBackend::new());
//! let mut proxy = mesh.create_render_proxy(backend, MaterialHandle(0));
//!
//! mesh.create_mesh_section(0, Arc::new(MeshGeometry::unit_cube()), Mat4::IDENTITY);
//!
//! // Per frame, on the mutator side:
//! mesh.update_mesh_section_transform(0, Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
//! mesh.finish_transforms_update();
//!
//! // Per frame, on the consumer side:
//! proxy.process_commands().unwrap();
//! for call in proxy.draw_calls() {
//!     // bind call.geometry, call.material, set call.transform_slot, draw
//! }
//! ```

pub mod bounds;
pub mod command;
pub mod component;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod render_proxy;
pub mod section;
pub mod transform_buffer;

pub use bounds::{aggregate_section_bounds, Aabb};
pub use command::{CommandQueue, SectionCommand, SectionSnapshot};
pub use component::DeformMeshComponent;
pub use error::{DeformMeshError, DeformMeshResult};
pub use geometry::{MaterialHandle, MeshGeometry, Vertex};
pub use gpu::{
    BufferDescriptor, BufferHandle, BufferUsage, GpuError, GpuResult, HeadlessBackend,
    RenderBackend,
};
#[cfg(feature = "wgpu-backend")]
pub use gpu::WgpuBackend;
pub use render_proxy::{
    DeformMeshRenderProxy, DrawCall, RenderSection, RenderSectionSet, DEFORM_MESH_SHADER,
};
pub use section::MeshSection;
pub use transform_buffer::{GpuDeformTransform, TransformBuffer};

/// Configuration for a [`DeformMeshComponent`]
#[derive(Debug, Clone)]
pub struct DeformMeshConfig {
    /// Multiplier applied to world bounds in
    /// [`DeformMeshComponent::calc_bounds`], for renderers that pad culling
    /// volumes.
    pub bounds_scale: f32,
}

impl Default for DeformMeshConfig {
    fn default() -> Self {
        Self { bounds_scale: 1.0 }
    }
}
