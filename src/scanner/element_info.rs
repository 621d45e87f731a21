//! Markers found per element during one scan.

use crate::tree::{
    NodeId,
    Tree,
};
use crate::types::{
    MarkerRecord,
    Position,
};

/// Markers decoded at one position of an element.
pub type PositionTranslations = (Position, Vec<MarkerRecord>);

/// Elements with their decoded markers, in first-registration order.
///
/// Registered elements never contain one another: registering an element inside a
/// known one appends to the outer entry, and registering an element around known
/// ones absorbs them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementTranslations {
    /// Outermost elements and their markers.
    entries: Vec<(NodeId, Vec<PositionTranslations>)>,
}

impl ElementTranslations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `markers` found at `position` of `element`.
    pub fn push(
        &mut self,
        tree: &Tree,
        element: NodeId,
        position: Position,
        markers: Vec<MarkerRecord>,
    ) {
        if let Some((_, info)) =
            self.entries.iter_mut().find(|(root, _)| tree.contains(*root, element))
        {
            info.push((position, markers));
            return;
        }

        let mut info = Vec::new();
        self.entries.retain_mut(|(root, root_info)| {
            if tree.contains(element, *root) {
                info.append(root_info);
                false
            } else {
                true
            }
        });
        info.push((position, markers));
        self.entries.push((element, info));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Markers registered under `element`, if it is a kept entry.
    #[must_use]
    pub fn get(&self, element: NodeId) -> Option<&[PositionTranslations]> {
        self.entries.iter().find(|(root, _)| *root == element).map(|(_, info)| info.as_slice())
    }

    pub fn elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.iter().map(|(element, _)| *element)
    }
}

impl IntoIterator for ElementTranslations {
    type Item = (NodeId, Vec<PositionTranslations>);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
