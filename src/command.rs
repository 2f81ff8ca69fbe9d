//! Staged commands from the mutator context to the consumer context
//!
//! The mutator never touches render-side state directly. Every mutation is
//! recorded as a [`SectionCommand`] in a shared queue; the render proxy
//! drains the queue at its own sync point and applies everything at once.
//! This keeps the handoff one-directional: mutator pushes, consumer drains.

use std::sync::Arc;

use glam::Mat4;
use parking_lot::Mutex;

use crate::geometry::{MaterialHandle, MeshGeometry};

/// The data a structural rebuild needs for one section, captured on the
/// mutator side. Geometry travels as an `Arc` clone, so snapshots are cheap
/// regardless of mesh size.
#[derive(Debug, Clone)]
pub struct SectionSnapshot {
    pub geometry: Option<Arc<MeshGeometry>>,
    pub transform: Mat4,
    pub material: Option<MaterialHandle>,
    pub visible: bool,
}

/// A staged state transition.
#[derive(Debug, Clone)]
pub enum SectionCommand {
    /// Structural change: the whole section list, newest state. Supersedes
    /// any targeted update staged before it.
    Rebuild(Vec<SectionSnapshot>),
    /// Transform-only change for one section.
    UpdateTransform { index: usize, transform: Mat4 },
    /// Visibility-only change for one section.
    SetVisible { index: usize, visible: bool },
    /// End of a mutator update cycle: apply and flush everything staged.
    Commit,
}

/// Shared command queue between the two contexts.
///
/// Cloning yields another handle to the same queue. Single producer and
/// single consumer by construction: the component holds one clone and
/// pushes, the render proxy holds the other and drains.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    inner: Arc<Mutex<Vec<SectionCommand>>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: SectionCommand) {
        self.inner.lock().push(command);
    }

    /// Takes every queued command, preserving push order.
    pub fn drain(&self) -> Vec<SectionCommand> {
        std::mem::take(&mut *self.inner.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_order_and_empties() {
        let queue = CommandQueue::new();
        queue.push(SectionCommand::UpdateTransform {
            index: 0,
            transform: Mat4::IDENTITY,
        });
        queue.push(SectionCommand::SetVisible {
            index: 1,
            visible: false,
        });
        queue.push(SectionCommand::Commit);

        let drained = queue.drain();
        assert_eq!(drained.len(), 3);
        assert!(matches!(
            drained[0],
            SectionCommand::UpdateTransform { index: 0, .. }
        ));
        assert!(matches!(
            drained[1],
            SectionCommand::SetVisible {
                index: 1,
                visible: false
            }
        ));
        assert!(matches!(drained[2], SectionCommand::Commit));
        assert!(queue.is_empty());
    }

    #[test]
    fn clones_share_the_same_queue() {
        let producer = CommandQueue::new();
        let consumer = producer.clone();

        producer.push(SectionCommand::Commit);
        assert_eq!(consumer.drain().len(), 1);
        assert!(producer.is_empty());
    }
}
