//! Consumer-side render state: section mirror, sync protocol, draw data
//!
//! [`DeformMeshRenderProxy`] is the only type that touches the
//! [`TransformBuffer`] and the [`RenderSectionSet`], which is what enforces
//! the single-writer rule for the GPU copy. It follows the mutator through
//! the command queue: structural commands replace the whole mirror,
//! targeted commands patch one entry, and a commit applies and flushes
//! everything staged since the last one in a single upload.

use std::sync::Arc;
use std::thread::ThreadId;

use glam::Mat4;

use crate::command::{CommandQueue, SectionCommand, SectionSnapshot};
use crate::geometry::{MaterialHandle, MeshGeometry};
use crate::gpu::{GpuResult, RenderBackend};
use crate::transform_buffer::TransformBuffer;

/// Read-side mirror of one logical section, immutable during a frame.
#[derive(Debug, Clone)]
pub struct RenderSection {
    pub geometry: Arc<MeshGeometry>,
    pub material: MaterialHandle,
    pub max_vertex_index: u32,
    pub visible: bool,
    /// Index into the transform buffer. Always equal to the section index
    /// today; kept as its own field so entries could be repacked without
    /// changing the draw path.
    pub transform_slot: u32,
}

/// The mirrored section list, 1:1 by index with the logical one.
///
/// Cleared slots stay present as `None` holes so that indices (and with
/// them transform slots) remain stable across clears.
#[derive(Debug, Default)]
pub struct RenderSectionSet {
    entries: Vec<Option<RenderSection>>,
}

impl RenderSectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sections including holes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RenderSection> {
        self.entries.get(index).and_then(|e| e.as_ref())
    }

    /// Wholesale rebuild from a mutator snapshot.
    ///
    /// Materials resolve from the snapshot, falling back to the injected
    /// default when the geometry declares none.
    pub fn rebuild_from(&mut self, snapshots: &[SectionSnapshot], default_material: MaterialHandle) {
        self.entries.clear();
        self.entries.reserve(snapshots.len());
        for (index, snapshot) in snapshots.iter().enumerate() {
            self.entries.push(snapshot.geometry.clone().map(|geometry| {
                let max_vertex_index = geometry.max_vertex_index();
                RenderSection {
                    geometry,
                    material: snapshot.material.unwrap_or(default_material),
                    max_vertex_index,
                    visible: snapshot.visible,
                    transform_slot: index as u32,
                }
            }));
        }
    }

    /// Targeted visibility patch; holes and out-of-range are no-ops.
    pub fn set_visible(&mut self, index: usize, visible: bool) {
        if let Some(Some(entry)) = self.entries.get_mut(index) {
            entry.visible = visible;
        }
    }

    /// Targeted slot patch; holes and out-of-range are no-ops.
    pub fn set_transform_slot(&mut self, index: usize, slot: u32) {
        if let Some(Some(entry)) = self.entries.get_mut(index) {
            entry.transform_slot = slot;
        }
    }

    /// Visible, non-hole entries in index order. Restartable: iterating
    /// again yields the same sequence until the next mutation.
    pub fn iter_visible(&self) -> impl Iterator<Item = (usize, &RenderSection)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|s| (i, s)))
            .filter(|(_, s)| s.visible)
    }
}

/// Everything the embedder needs to submit one draw call for a section.
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub section_index: usize,
    pub geometry: Arc<MeshGeometry>,
    pub material: MaterialHandle,
    pub triangle_count: u32,
    pub min_vertex_index: u32,
    pub max_vertex_index: u32,
    /// Value for the shader's section-index uniform.
    pub transform_slot: u32,
}

/// Sync protocol state between two commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SyncState {
    #[default]
    Idle,
    /// A structural rebuild is pending; it supersedes targeted updates
    /// staged before it.
    StructuralDirty,
    /// Only targeted transform/visibility updates are pending.
    TransformsPending,
}

/// A targeted update waiting for the next commit.
#[derive(Debug, Clone, Copy)]
enum StagedOp {
    Transform { index: usize, transform: Mat4 },
    Visible { index: usize, visible: bool },
}

/// Consumer-side counterpart of a `DeformMeshComponent`.
pub struct DeformMeshRenderProxy {
    sections: RenderSectionSet,
    transforms: TransformBuffer,
    default_material: MaterialHandle,
    queue: CommandQueue,
    state: SyncState,
    pending_rebuild: Option<Vec<SectionSnapshot>>,
    staged_ops: Vec<StagedOp>,
    /// Thread that first processed commands; all later consumer-side calls
    /// must come from it.
    consumer_thread: Option<ThreadId>,
}

impl DeformMeshRenderProxy {
    pub(crate) fn new(
        backend: Arc<dyn RenderBackend>,
        default_material: MaterialHandle,
        queue: CommandQueue,
        initial: Vec<SectionSnapshot>,
    ) -> Self {
        Self {
            sections: RenderSectionSet::new(),
            transforms: TransformBuffer::new(backend, "deform_section_transforms"),
            default_material,
            queue,
            state: if initial.is_empty() {
                SyncState::Idle
            } else {
                SyncState::StructuralDirty
            },
            pending_rebuild: if initial.is_empty() {
                None
            } else {
                Some(initial)
            },
            staged_ops: Vec::new(),
            consumer_thread: None,
        }
    }

    /// Drains the command queue and brings the render mirror up to date.
    ///
    /// Call once per frame from the consumer context, before any draw data
    /// is read. Structural rebuilds apply here unconditionally (a stale
    /// mirror cannot be drawn); targeted updates apply and flush only when
    /// a commit has been staged, so many updates between two commits cost
    /// exactly one upload. Returns whether an upload happened.
    pub fn process_commands(&mut self) -> GpuResult<bool> {
        self.assert_consumer_context();

        let mut uploaded = false;
        for command in self.queue.drain() {
            match command {
                SectionCommand::Rebuild(snapshots) => {
                    // Targeted ops staged before a rebuild are captured by
                    // the snapshot; drop them.
                    self.staged_ops.clear();
                    self.pending_rebuild = Some(snapshots);
                    self.state = SyncState::StructuralDirty;
                }
                SectionCommand::UpdateTransform { index, transform } => {
                    self.staged_ops.push(StagedOp::Transform { index, transform });
                    if self.state == SyncState::Idle {
                        self.state = SyncState::TransformsPending;
                    }
                }
                SectionCommand::SetVisible { index, visible } => {
                    self.staged_ops.push(StagedOp::Visible { index, visible });
                    if self.state == SyncState::Idle {
                        self.state = SyncState::TransformsPending;
                    }
                }
                SectionCommand::Commit => {
                    uploaded |= self.apply_staged()?;
                }
            }
        }

        // Draw-resource acquisition: a pending structural rebuild must land
        // even without a commit. Targeted ops staged after it keep waiting.
        if self.state == SyncState::StructuralDirty {
            if self.rebuild_mirror()? {
                uploaded |= self.transforms.flush()?;
            }
            self.state = if self.staged_ops.is_empty() {
                SyncState::Idle
            } else {
                SyncState::TransformsPending
            };
        }

        Ok(uploaded)
    }

    /// Applies everything staged up to a commit and flushes once. A pending
    /// structural rebuild lands first, so the rebuilt transforms and the
    /// staged ops ride the same upload.
    fn apply_staged(&mut self) -> GpuResult<bool> {
        if self.state == SyncState::StructuralDirty {
            self.rebuild_mirror()?;
        }
        for op in std::mem::take(&mut self.staged_ops) {
            match op {
                StagedOp::Transform { index, transform } => {
                    self.transforms.set_entry(index, transform);
                }
                StagedOp::Visible { index, visible } => {
                    self.sections.set_visible(index, visible);
                }
            }
        }
        let uploaded = self.transforms.flush()?;
        self.state = SyncState::Idle;
        Ok(uploaded)
    }

    /// Rebuilds the mirror and re-stages every transform from the snapshot.
    /// Leaves the buffer dirty; the caller flushes. Returns whether a
    /// rebuild was pending.
    fn rebuild_mirror(&mut self) -> GpuResult<bool> {
        let Some(snapshots) = self.pending_rebuild.take() else {
            return Ok(false);
        };
        log::debug!("rebuilding render sections ({} slots)", snapshots.len());
        self.sections.rebuild_from(&snapshots, self.default_material);
        self.transforms.resize(snapshots.len())?;
        for (index, snapshot) in snapshots.iter().enumerate() {
            self.transforms.set_entry(index, snapshot.transform);
        }
        Ok(true)
    }

    /// The mirrored section list.
    pub fn sections(&self) -> &RenderSectionSet {
        &self.sections
    }

    /// The packed per-section transform buffer (for bind groups).
    pub fn transform_buffer(&self) -> &TransformBuffer {
        &self.transforms
    }

    /// Draw data for every visible section, in index order.
    pub fn draw_calls(&self) -> impl Iterator<Item = DrawCall> + '_ {
        self.sections.iter_visible().map(|(index, section)| DrawCall {
            section_index: index,
            geometry: section.geometry.clone(),
            material: section.material,
            triangle_count: section.geometry.triangle_count() as u32,
            min_vertex_index: 0,
            max_vertex_index: section.max_vertex_index,
            transform_slot: section.transform_slot,
        })
    }

    fn assert_consumer_context(&mut self) {
        let current = std::thread::current().id();
        match self.consumer_thread {
            None => self.consumer_thread = Some(current),
            Some(pinned) => debug_assert_eq!(
                pinned, current,
                "render proxy commands must be processed from one consumer thread"
            ),
        }
    }
}

impl std::fmt::Debug for DeformMeshRenderProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeformMeshRenderProxy")
            .field("sections", &self.sections.len())
            .field("state", &self.state)
            .field("transforms", &self.transforms)
            .finish()
    }
}

/// Shader-side contract for drawing deformed sections.
///
/// The deform transforms are a flat storage array of row-major matrices
/// (transposed relative to the mutator-side convention), indexed by the
/// section's transform slot. Left-multiplying the vertex undoes the
/// transposition, so no matrix ops run in the shader.
pub const DEFORM_MESH_SHADER: &str = r#"
struct CameraUniforms {
    view_proj: mat4x4<f32>,
}

struct SectionUniforms {
    transform_slot: u32,
}

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) uv: vec2<f32>,
}

@group(0) @binding(0) var<uniform> camera: CameraUniforms;
@group(1) @binding(0) var<storage, read> deform_transforms: array<mat4x4<f32>>;
@group(1) @binding(1) var<uniform> section: SectionUniforms;

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var output: VertexOutput;
    // Matrices are stored transposed; v * m recovers m_original * v.
    let deform = deform_transforms[section.transform_slot];
    let world_pos = vec4<f32>(input.position, 1.0) * deform;
    output.clip_position = camera.view_proj * world_pos;
    output.world_normal = normalize((vec4<f32>(input.normal, 0.0) * deform).xyz);
    output.uv = input.uv;
    return output;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(input.world_normal * 0.5 + 0.5, 1.0);
}
"#;
