//! Authoritative mesh section state (mutator side)

use std::sync::Arc;

use glam::Mat4;

use crate::bounds::Aabb;
use crate::geometry::MeshGeometry;

/// One independently transformable, independently visible part of a
/// composite mesh, rendered with one material.
///
/// Sections are owned exclusively by the mutator-side component. The render
/// side sees them only through snapshots and staged commands, never through
/// shared references.
#[derive(Debug, Clone)]
pub struct MeshSection {
    /// Shared, externally-owned mesh data. `None` for cleared slots.
    pub geometry: Option<Arc<MeshGeometry>>,
    /// The secondary transform applied to the whole section at draw time.
    pub deform_transform: Mat4,
    /// Local box accumulated over the section's lifetime: it grows with
    /// every transform update and only resets when the slot is cleared.
    pub local_bounds: Aabb,
    pub visible: bool,
}

impl MeshSection {
    /// Reset this section, clearing all mesh info.
    pub fn reset(&mut self) {
        self.geometry = None;
        self.deform_transform = Mat4::IDENTITY;
        self.local_bounds = Aabb::INVALID;
        self.visible = true;
    }

    /// True for slots that were cleared or never created.
    pub fn is_empty(&self) -> bool {
        self.geometry.is_none()
    }
}

impl Default for MeshSection {
    fn default() -> Self {
        Self {
            geometry: None,
            deform_transform: Mat4::IDENTITY,
            local_bounds: Aabb::INVALID,
            visible: true,
        }
    }
}
