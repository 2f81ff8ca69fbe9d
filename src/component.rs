//! Mutator-side mesh component: the authoritative section list
//!
//! [`DeformMeshComponent`] owns every [`MeshSection`] and is the only type
//! that mutates them. Render-side state never borrows from it: structural
//! changes ship a snapshot of the whole list, targeted changes ship the
//! index and the new value, and the render proxy applies both at its own
//! sync point.

use std::sync::Arc;

use glam::Mat4;

use crate::bounds::{aggregate_section_bounds, Aabb};
use crate::command::{CommandQueue, SectionCommand, SectionSnapshot};
use crate::error::{DeformMeshError, DeformMeshResult};
use crate::geometry::{MaterialHandle, MeshGeometry};
use crate::gpu::RenderBackend;
use crate::render_proxy::DeformMeshRenderProxy;
use crate::section::MeshSection;
use crate::DeformMeshConfig;

/// A mesh composed of independently deformable sections.
///
/// Section indices are stable handles: clearing index `i` leaves every
/// other index in place, and the list may contain cleared holes up to the
/// highest index ever used.
#[derive(Debug)]
pub struct DeformMeshComponent {
    sections: Vec<MeshSection>,
    /// Per-section material, same index as the section. Recorded at
    /// creation from the geometry, overridable afterwards.
    materials: Vec<Option<MaterialHandle>>,
    /// Cached union of every section's accumulated local box.
    local_bounds: Aabb,
    bounds_scale: f32,
    queue: CommandQueue,
}

impl DeformMeshComponent {
    pub fn new(config: DeformMeshConfig) -> Self {
        Self {
            sections: Vec::new(),
            materials: Vec::new(),
            local_bounds: Aabb::ZERO,
            bounds_scale: config.bounds_scale,
            queue: CommandQueue::new(),
        }
    }

    /// Builds the consumer-side render proxy for this component.
    ///
    /// The proxy starts from a snapshot of the current section list and
    /// afterwards follows the component through the shared command queue.
    pub fn create_render_proxy(
        &self,
        backend: Arc<dyn RenderBackend>,
        default_material: MaterialHandle,
    ) -> DeformMeshRenderProxy {
        DeformMeshRenderProxy::new(
            backend,
            default_material,
            self.queue.clone(),
            self.snapshot(),
        )
    }

    /// Creates (or recreates) the section at `index` from shared geometry
    /// and an initial deform transform.
    ///
    /// The list grows to `index + 1` if needed; new slots stay cleared.
    /// The section's local box starts as the union of the geometry's box
    /// and that box under the initial transform, so creation agrees with
    /// what [`Self::update_mesh_section_transform`] accumulates later.
    pub fn create_mesh_section(
        &mut self,
        index: usize,
        geometry: Arc<MeshGeometry>,
        transform: Mat4,
    ) {
        if index >= self.sections.len() {
            self.sections.resize_with(index + 1, MeshSection::default);
            self.materials.resize(index + 1, None);
        }

        let section = &mut self.sections[index];
        section.reset();
        let geometry_box = geometry.bounding_box();
        section.local_bounds = geometry_box.union(&geometry_box.transformed(&transform));
        section.deform_transform = transform;
        self.materials[index] = geometry.material;
        section.geometry = Some(geometry);

        self.update_local_bounds();
        self.mark_structural_dirty();
    }

    /// Updates the deform transform of an existing section.
    ///
    /// Out of range is a no-op. The geometry's box under the new transform
    /// is unioned into the section's accumulated bounds; bounds only grow
    /// until the slot is cleared.
    pub fn update_mesh_section_transform(&mut self, index: usize, transform: Mat4) {
        let Some(section) = self.sections.get_mut(index) else {
            return;
        };

        section.deform_transform = transform;
        if let Some(geometry) = &section.geometry {
            let moved = geometry.bounding_box().transformed(&transform);
            section.local_bounds = section.local_bounds.union(&moved);
        }

        self.queue
            .push(SectionCommand::UpdateTransform { index, transform });
        self.update_local_bounds();
    }

    /// Clears one section. Other sections do not change index.
    pub fn clear_mesh_section(&mut self, index: usize) {
        let Some(section) = self.sections.get_mut(index) else {
            return;
        };
        section.reset();
        self.materials[index] = None;
        self.update_local_bounds();
        self.mark_structural_dirty();
    }

    /// Clears all mesh sections and resets to the empty state.
    pub fn clear_all_mesh_sections(&mut self) {
        self.sections.clear();
        self.materials.clear();
        self.update_local_bounds();
        self.mark_structural_dirty();
    }

    /// Controls visibility of one section. Out of range is a no-op.
    pub fn set_mesh_section_visible(&mut self, index: usize, visible: bool) {
        let Some(section) = self.sections.get_mut(index) else {
            return;
        };
        section.visible = visible;
        self.queue.push(SectionCommand::SetVisible { index, visible });
    }

    /// Whether a section is currently visible; false when out of range.
    pub fn is_mesh_section_visible(&self, index: usize) -> bool {
        self.sections.get(index).is_some_and(|s| s.visible)
    }

    /// Number of sections, cleared holes included.
    pub fn num_sections(&self) -> usize {
        self.sections.len()
    }

    /// One material slot per section.
    pub fn num_materials(&self) -> usize {
        self.sections.len()
    }

    /// Borrow one section's state.
    ///
    /// The reference must not be held across structural mutations; the
    /// backing storage may reallocate.
    pub fn section(&self, index: usize) -> Option<&MeshSection> {
        self.sections.get(index)
    }

    /// Replaces a section wholesale (cloning/deserialization path).
    pub fn set_section(&mut self, index: usize, section: MeshSection) {
        if index >= self.sections.len() {
            self.sections.resize_with(index + 1, MeshSection::default);
            self.materials.resize(index + 1, None);
        }
        self.materials[index] = section.geometry.as_ref().and_then(|g| g.material);
        self.sections[index] = section;
        self.update_local_bounds();
        self.mark_structural_dirty();
    }

    /// Resolved material for a section.
    ///
    /// `None` geometry (cleared slot) and out-of-range indices are errors;
    /// a section whose geometry declares no material reports `Ok(None)`,
    /// meaning the render side will use its injected default.
    pub fn section_material(&self, index: usize) -> DeformMeshResult<Option<MaterialHandle>> {
        let section = self
            .sections
            .get(index)
            .ok_or(DeformMeshError::OutOfRange {
                index,
                len: self.sections.len(),
            })?;
        if section.is_empty() {
            return Err(DeformMeshError::NullGeometry { index });
        }
        Ok(self.materials[index])
    }

    /// Overrides the material recorded for a section. Out of range is a
    /// no-op; the new handle reaches the render side on the next rebuild.
    pub fn set_section_material(&mut self, index: usize, material: MaterialHandle) {
        if index >= self.materials.len() {
            return;
        }
        self.materials[index] = Some(material);
        self.mark_structural_dirty();
    }

    /// Ends one mutator update cycle: everything staged before this call is
    /// applied and flushed by the very next proxy sync.
    pub fn finish_transforms_update(&mut self) {
        self.queue.push(SectionCommand::Commit);
    }

    /// Union of every section's accumulated local box, or the zero box at
    /// the origin when nothing contributes.
    pub fn local_bounds(&self) -> Aabb {
        self.local_bounds
    }

    /// World-space bounds under `local_to_world`, with the configured
    /// bounds scale applied about the center.
    pub fn calc_bounds(&self, local_to_world: Mat4) -> Aabb {
        self.local_bounds
            .transformed(&local_to_world)
            .scaled(self.bounds_scale)
    }

    fn snapshot(&self) -> Vec<SectionSnapshot> {
        self.sections
            .iter()
            .zip(&self.materials)
            .map(|(section, material)| SectionSnapshot {
                geometry: section.geometry.clone(),
                transform: section.deform_transform,
                material: *material,
                visible: section.visible,
            })
            .collect()
    }

    fn update_local_bounds(&mut self) {
        self.local_bounds =
            aggregate_section_bounds(self.sections.iter().map(|s| s.local_bounds));
    }

    fn mark_structural_dirty(&mut self) {
        log::debug!(
            "structural change: {} sections, rebuild queued",
            self.sections.len()
        );
        self.queue.push(SectionCommand::Rebuild(self.snapshot()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn component() -> DeformMeshComponent {
        DeformMeshComponent::new(DeformMeshConfig::default())
    }

    fn cube() -> Arc<MeshGeometry> {
        Arc::new(MeshGeometry::unit_cube())
    }

    #[test]
    fn create_grows_to_index_plus_one() {
        let mut mesh = component();
        mesh.create_mesh_section(0, cube(), Mat4::IDENTITY);
        assert_eq!(mesh.num_sections(), 1);

        mesh.create_mesh_section(4, cube(), Mat4::IDENTITY);
        assert_eq!(mesh.num_sections(), 5);

        // Count never decreases for non-structural-clearing calls.
        mesh.create_mesh_section(2, cube(), Mat4::IDENTITY);
        assert_eq!(mesh.num_sections(), 5);
        assert_eq!(mesh.num_materials(), 5);
    }

    #[test]
    fn creation_bounds_cover_initial_transform() {
        let mut mesh = component();
        mesh.create_mesh_section(0, cube(), Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));

        let bounds = mesh.section(0).unwrap().local_bounds;
        assert_eq!(bounds.min, Vec3::ZERO);
        assert_eq!(bounds.max, Vec3::new(6.0, 1.0, 1.0));
    }

    #[test]
    fn transform_updates_only_grow_bounds() {
        let mut mesh = component();
        mesh.create_mesh_section(0, cube(), Mat4::IDENTITY);
        assert_eq!(mesh.local_bounds(), Aabb::new(Vec3::ZERO, Vec3::ONE));

        mesh.update_mesh_section_transform(0, Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        let grown = mesh.local_bounds();
        assert_eq!(grown.min, Vec3::ZERO);
        assert_eq!(grown.max, Vec3::new(6.0, 1.0, 1.0));

        // Moving back does not shrink the accumulated box.
        mesh.update_mesh_section_transform(0, Mat4::IDENTITY);
        assert_eq!(mesh.local_bounds(), grown);
    }

    #[test]
    fn clear_all_resets_count_and_bounds() {
        let mut mesh = component();
        mesh.create_mesh_section(0, cube(), Mat4::IDENTITY);
        mesh.create_mesh_section(1, cube(), Mat4::from_translation(Vec3::X * 10.0));

        mesh.clear_all_mesh_sections();
        assert_eq!(mesh.num_sections(), 0);
        assert_eq!(mesh.local_bounds(), Aabb::ZERO);
    }

    #[test]
    fn clear_section_keeps_other_indices() {
        let mut mesh = component();
        mesh.create_mesh_section(0, cube(), Mat4::IDENTITY);
        mesh.create_mesh_section(1, cube(), Mat4::IDENTITY);

        mesh.clear_mesh_section(0);
        assert_eq!(mesh.num_sections(), 2);
        assert!(mesh.section(0).unwrap().is_empty());
        assert!(!mesh.section(1).unwrap().is_empty());
    }

    #[test]
    fn out_of_range_mutators_are_noops() {
        let mut mesh = component();
        mesh.update_mesh_section_transform(3, Mat4::IDENTITY);
        mesh.clear_mesh_section(3);
        mesh.set_mesh_section_visible(3, false);
        assert_eq!(mesh.num_sections(), 0);
        assert!(!mesh.is_mesh_section_visible(3));
    }

    #[test]
    fn visibility_flag_round_trip() {
        let mut mesh = component();
        mesh.create_mesh_section(0, cube(), Mat4::IDENTITY);
        assert!(mesh.is_mesh_section_visible(0));

        mesh.set_mesh_section_visible(0, false);
        assert!(!mesh.is_mesh_section_visible(0));
    }

    #[test]
    fn material_resolution_and_errors() {
        let mut mesh = component();
        let geometry = Arc::new(MeshGeometry::unit_cube().with_material(MaterialHandle(7)));
        mesh.create_mesh_section(0, geometry, Mat4::IDENTITY);
        mesh.create_mesh_section(1, cube(), Mat4::IDENTITY);
        mesh.clear_mesh_section(1);

        assert_eq!(mesh.section_material(0), Ok(Some(MaterialHandle(7))));
        assert_eq!(
            mesh.section_material(1),
            Err(DeformMeshError::NullGeometry { index: 1 })
        );
        assert_eq!(
            mesh.section_material(9),
            Err(DeformMeshError::OutOfRange { index: 9, len: 2 })
        );

        mesh.set_section_material(0, MaterialHandle(11));
        assert_eq!(mesh.section_material(0), Ok(Some(MaterialHandle(11))));
    }

    #[test]
    fn calc_bounds_applies_scale_about_center() {
        let mut mesh = DeformMeshComponent::new(DeformMeshConfig { bounds_scale: 2.0 });
        mesh.create_mesh_section(0, cube(), Mat4::IDENTITY);

        let world = mesh.calc_bounds(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        // Unit cube at x in [10,11], doubled about its center (10.5, .5, .5).
        assert_eq!(world.min, Vec3::new(9.5, -0.5, -0.5));
        assert_eq!(world.max, Vec3::new(11.5, 1.5, 1.5));
    }

    #[test]
    fn replace_section_is_structural() {
        let mut mesh = component();
        let mut replacement = MeshSection::default();
        replacement.geometry = Some(cube());
        replacement.local_bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);

        mesh.set_section(2, replacement);
        assert_eq!(mesh.num_sections(), 3);
        assert!(!mesh.section(2).unwrap().is_empty());
        assert_eq!(mesh.local_bounds(), Aabb::new(Vec3::ZERO, Vec3::ONE));
    }
}
