//! Coalescing of mutation targets into disjoint subtrees.

use crate::tree::{
    MutationRecord,
    NodeId,
    Tree,
};

/// Pending scan roots, none of which contains another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationQueue {
    /// Queued roots in arrival order.
    targets: Vec<NodeId>,
}

impl MutationQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `target` unless it is already covered.
    ///
    /// Queued descendants of `target` are evicted. Returns whether `target` was queued.
    pub fn push(&mut self, tree: &Tree, target: NodeId) -> bool {
        if self.targets.iter().any(|&queued| tree.contains(queued, target)) {
            return false;
        }
        self.targets.retain(|&queued| !tree.contains(target, queued));
        self.targets.push(target);
        true
    }

    pub fn extend(&mut self, tree: &Tree, records: &[MutationRecord]) {
        for record in records {
            self.push(tree, record.target);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    #[must_use]
    pub fn into_targets(self) -> Vec<NodeId> {
        self.targets
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use googletest::prelude::*;

    use super::*;
    use crate::test_utils::{
        append_element,
        append_text,
        new_document,
    };
    use crate::tree::MutationKind;

    #[googletest::test]
    fn descendants_of_queued_targets_are_dropped() {
        let mut tree = Tree::new();
        let (_, body) = new_document(&mut tree);
        let div = append_element(&mut tree, body, "div", &[]);
        let text = append_text(&mut tree, div, "x");
        let mut queue = MutationQueue::new();

        expect_that!(queue.push(&tree, div), eq(true));
        expect_that!(queue.push(&tree, text), eq(false));
        expect_that!(queue.push(&tree, div), eq(false));
        expect_that!(queue.into_targets(), elements_are![eq(&div)]);
    }

    #[googletest::test]
    fn ancestor_evicts_every_queued_descendant() {
        let mut tree = Tree::new();
        let (_, body) = new_document(&mut tree);
        let list = append_element(&mut tree, body, "ul", &[]);
        let first = append_element(&mut tree, list, "li", &[]);
        let aside = append_element(&mut tree, body, "aside", &[]);
        let second = append_element(&mut tree, list, "li", &[]);
        let mut queue = MutationQueue::new();

        queue.push(&tree, first);
        queue.push(&tree, aside);
        queue.push(&tree, second);
        queue.push(&tree, list);

        expect_that!(queue.into_targets(), elements_are![eq(&aside), eq(&list)]);
    }

    #[googletest::test]
    fn extend_coalesces_records() {
        let mut tree = Tree::new();
        let (_, body) = new_document(&mut tree);
        let div = append_element(&mut tree, body, "div", &[]);
        let text = append_text(&mut tree, div, "x");
        let records = [
            MutationRecord { target: text, kind: MutationKind::CharacterData },
            MutationRecord { target: div, kind: MutationKind::Attributes },
            MutationRecord { target: text, kind: MutationKind::CharacterData },
        ];
        let mut queue = MutationQueue::new();

        queue.extend(&tree, &records);

        expect_that!(queue.len(), eq(1));
        expect_that!(queue.into_targets(), elements_are![eq(&div)]);
    }
}
