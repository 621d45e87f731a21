//! Mutation observation for [`Tree`](super::Tree).

use std::ops::{
    Deref,
    DerefMut,
};

use super::{
    NodeId,
    Tree,
};

/// What changed on a mutation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// An attribute of the target element was set or removed.
    Attributes,
    /// The data of the target text node changed.
    CharacterData,
    /// Children were added to or removed from the target.
    ChildList,
}

/// One observed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

/// Observation state owned by the tree.
#[derive(Debug, Clone, Default)]
pub(super) struct Observer {
    /// Documents whose subtrees are observed.
    documents: Vec<NodeId>,
    /// Whether records are currently collected.
    connected: bool,
    /// Records not yet taken.
    records: Vec<MutationRecord>,
}

impl Observer {
    /// Adds `document` to the observed set.
    pub(super) fn add_document(&mut self, document: NodeId) {
        if !self.documents.contains(&document) {
            self.documents.push(document);
        }
    }

    pub(super) fn observes(&self, document: NodeId) -> bool {
        self.connected && self.documents.contains(&document)
    }

    pub(super) const fn is_connected(&self) -> bool {
        self.connected
    }

    pub(super) const fn connect(&mut self) {
        self.connected = true;
    }

    /// Stops collecting. Pending records are dropped, like `MutationObserver.disconnect`.
    pub(super) fn disconnect(&mut self) {
        self.connected = false;
        self.records.clear();
    }

    pub(super) fn push(&mut self, record: MutationRecord) {
        self.records.push(record);
    }

    pub(super) fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }
}

/// Scoped pause of mutation observation.
///
/// Created by [`Tree::pause_observation`]: pending records are drained into the guard,
/// observation is disconnected, and it is reconnected when the guard is dropped. Writes
/// made through the guard are therefore never reported back to the observer.
#[derive(Debug)]
pub struct ObservationPause<'a> {
    /// The paused tree.
    tree: &'a mut Tree,
    /// Records drained when the pause started.
    pending: Vec<MutationRecord>,
    /// Whether observation was connected before the pause.
    resume: bool,
}

impl<'a> ObservationPause<'a> {
    pub(super) fn new(tree: &'a mut Tree) -> Self {
        let resume = tree.observer.is_connected();
        let pending = tree.observer.take_records();
        tree.observer.disconnect();
        Self { tree, pending, resume }
    }

    /// Records that were pending when observation was paused.
    pub fn take_pending(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.pending)
    }
}

impl Deref for ObservationPause<'_> {
    type Target = Tree;

    fn deref(&self) -> &Tree {
        self.tree
    }
}

impl DerefMut for ObservationPause<'_> {
    fn deref_mut(&mut self) -> &mut Tree {
        self.tree
    }
}

impl Drop for ObservationPause<'_> {
    fn drop(&mut self) {
        if self.resume {
            self.tree.observer.connect();
        }
    }
}
