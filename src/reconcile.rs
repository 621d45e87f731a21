//! Merging a scan pass into the registered translations.

use std::collections::HashSet;

use crate::tree::{
    NodeId,
    Tree,
};
use crate::types::{
    RetentionMode,
    Target,
    TranslationSet,
};

/// Tells whether an element is still part of a live tree.
pub trait Liveness {
    /// Unknown elements must be reported as not live.
    fn is_live(&self, node: NodeId) -> bool;
}

impl Liveness for Tree {
    fn is_live(&self, node: NodeId) -> bool {
        self.is_connected(node)
    }
}

impl<F: Fn(NodeId) -> bool> Liveness for F {
    fn is_live(&self, node: NodeId) -> bool {
        self(node)
    }
}

/// Merges `incoming` into `previous` and returns the next registered set.
///
/// - A known term keeps its live targets, gains the new ones and replaces the previous
///   entry in place. If no target is left it is handled like an untouched term.
/// - An unknown term is appended.
/// - Untouched terms are kept as they are in [`RetentionMode::Keep`]. In
///   [`RetentionMode::Discard`] their dead targets are pruned and they are dropped
///   once none is left.
#[must_use]
pub fn reconcile(
    previous: TranslationSet,
    incoming: TranslationSet,
    mode: RetentionMode,
    liveness: &impl Liveness,
) -> TranslationSet {
    let mut next = previous;
    let mut touched = HashSet::new();
    let (mut added, mut updated) = (0_usize, 0_usize);

    for mut translation in incoming {
        let Some(existing) = next.get(&translation.source) else {
            touched.insert(translation.source.clone());
            next.insert(translation);
            added += 1;
            continue;
        };

        let mut targets: Vec<Target> = existing
            .targets
            .iter()
            .filter(|target| liveness.is_live(target.node))
            .cloned()
            .collect();
        for target in translation.targets {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        if !targets.is_empty() {
            translation.targets = targets;
            touched.insert(translation.source.clone());
            next.insert(translation);
            updated += 1;
        }
    }

    let before = next.len();
    if mode == RetentionMode::Discard {
        next.retain(|entry| {
            if touched.contains(&entry.source) {
                return true;
            }
            entry.retain_targets(|node| liveness.is_live(node));
            !entry.targets.is_empty()
        });
    }

    tracing::debug!(
        %mode,
        added,
        updated,
        removed = before - next.len(),
        total = next.len(),
        "Reconciled translations"
    );
    next
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use googletest::prelude::*;
    use rstest::rstest;

    use super::*;
    use crate::types::{
        MarkerRecord,
        Property,
        TargetedTranslation,
    };

    fn translation(source: &str, nodes: &[usize]) -> TargetedTranslation {
        let mut translation = TargetedTranslation::from_record(
            &MarkerRecord::new("web", false, source, source),
            format!("link/{source}"),
        );
        for &node in nodes {
            translation.add_target(target(node));
        }
        translation
    }

    fn target(node: usize) -> Target {
        Target::new(NodeId::from_raw(node), Property::TextContent)
    }

    fn set(translations: Vec<TargetedTranslation>) -> TranslationSet {
        translations.into_iter().collect()
    }

    fn sources(set: &TranslationSet) -> Vec<String> {
        set.sources().map(String::from).collect()
    }

    /// Nodes 1 to 9 are attached, everything else is gone.
    fn attached(node: NodeId) -> bool {
        (1..10).contains(&node.index())
    }

    #[rstest]
    #[case::discard(RetentionMode::Discard, vec!["b"])]
    #[case::keep(RetentionMode::Keep, vec!["a", "b"])]
    fn stale_term_depends_on_mode(#[case] mode: RetentionMode, #[case] expected: Vec<&str>) {
        let previous = set(vec![translation("a", &[42]), translation("b", &[1])]);
        let incoming = set(vec![translation("b", &[2])]);

        let next = reconcile(previous, incoming, mode, &attached);

        assert_that!(sources(&next), eq(&expected.into_iter().map(String::from).collect::<Vec<_>>()));
    }

    #[googletest::test]
    fn keep_mode_retains_stale_targets() {
        let previous = set(vec![translation("a", &[42, 43])]);

        let next = reconcile(previous, TranslationSet::new(), RetentionMode::Keep, &attached);

        assert_that!(next.get("a").unwrap().targets, elements_are![eq(&target(42)), eq(&target(43))]);
    }

    #[googletest::test]
    fn known_term_merges_live_targets_first() {
        let previous = set(vec![translation("a", &[1, 42, 2])]);
        let incoming = set(vec![translation("a", &[3, 1])]);

        let next = reconcile(previous, incoming, RetentionMode::Discard, &attached);

        assert_that!(
            next.get("a").unwrap().targets,
            elements_are![eq(&target(1)), eq(&target(2)), eq(&target(3))]
        );
    }

    #[googletest::test]
    fn discard_prunes_untouched_terms_with_live_targets() {
        let previous = set(vec![translation("a", &[1, 42]), translation("b", &[2])]);
        let incoming = set(vec![translation("c", &[3])]);

        let next = reconcile(previous, incoming, RetentionMode::Discard, &attached);

        assert_that!(sources(&next), elements_are![eq("a"), eq("b"), eq("c")]);
        assert_that!(next.get("a").unwrap().targets, elements_are![eq(&target(1))]);
    }

    #[googletest::test]
    fn replaced_entries_keep_their_position() {
        let previous = set(vec![translation("a", &[1]), translation("b", &[2]), translation("c", &[3])]);
        let mut updated = translation("b", &[4]);
        updated.translation = "B".to_string();

        let next = reconcile(previous, set(vec![updated]), RetentionMode::Discard, &attached);

        assert_that!(sources(&next), elements_are![eq("a"), eq("b"), eq("c")]);
        assert_that!(next.get("b").unwrap().translation, eq("B"));
        assert_that!(
            next.get("b").unwrap().targets,
            elements_are![eq(&target(2)), eq(&target(4))]
        );
    }

    #[googletest::test]
    fn new_terms_are_appended_in_scan_order() {
        let previous = set(vec![translation("z", &[1])]);
        let incoming = set(vec![translation("b", &[2]), translation("a", &[3])]);

        let next = reconcile(previous, incoming, RetentionMode::Discard, &attached);

        assert_that!(sources(&next), elements_are![eq("z"), eq("b"), eq("a")]);
    }

    #[googletest::test]
    fn tree_liveness_follows_attachment() {
        let mut tree = Tree::new();
        let (_, body) = crate::test_utils::new_document(&mut tree);
        let kept = crate::test_utils::append_element(&mut tree, body, "p", &[]);
        let removed = crate::test_utils::append_element(&mut tree, body, "p", &[]);
        tree.remove(removed).unwrap();

        let previous = set(vec![
            translation("kept", &[kept.index()]),
            translation("removed", &[removed.index()]),
        ]);

        let next = reconcile(previous, TranslationSet::new(), RetentionMode::Discard, &tree);

        assert_that!(sources(&next), elements_are![eq("kept")]);
        assert_that!(tree.is_live(NodeId::from_raw(10_000)), eq(false));
    }
}
