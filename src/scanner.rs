//! Tree scanning: finds markers, rewrites them to plain text and records where
//! each term is displayed.

/// Per-element marker bookkeeping
mod element_info;

use std::time::Instant;

pub use element_info::{
    ElementTranslations,
    PositionTranslations,
};

use crate::config::IgnoreMatcher;
use crate::link::LinkResolver;
use crate::marker::{
    Decoded,
    MarkerCodec,
};
use crate::tree::{
    NodeId,
    NodeKind,
    Tree,
};
use crate::types::{
    Position,
    Property,
    Target,
    TranslationSet,
};

/// How a node is handled by the traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    /// Recurse into the children only.
    Document,
    /// Regular element.
    Element {
        /// Embedded document of a frame element.
        frame_document: Option<NodeId>,
    },
    /// `<title>`: only its text is decoded, never tracked.
    Title,
    /// Text node, decoded against its parent element.
    Text,
    /// Comments, ignored subtrees and unknown ids.
    Skip,
}

/// Result of [`TranslationScanner::finish`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutput {
    /// Frame documents met during the scan, for the caller to register.
    pub added_documents: Vec<NodeId>,
    /// Terms found, keyed by source.
    pub translations: TranslationSet,
}

/// One scan pass over a set of roots.
///
/// Children are translated before their element's own attributes and properties, so
/// markers are replaced on the deepest possible level.
#[derive(Debug)]
pub struct TranslationScanner<'a> {
    /// Scanned tree, rewritten in place.
    tree: &'a mut Tree,
    /// Decoder.
    codec: MarkerCodec,
    /// Opt-out attributes.
    ignore: &'a IgnoreMatcher,
    /// Whether element info is recorded.
    highlights_enabled: bool,
    /// Frame documents met so far.
    added_documents: Vec<NodeId>,
    /// Decoded markers per outermost element.
    element_translations: ElementTranslations,
}

impl<'a> TranslationScanner<'a> {
    #[must_use]
    pub fn new(
        tree: &'a mut Tree,
        codec: MarkerCodec,
        ignore: &'a IgnoreMatcher,
        highlights_enabled: bool,
    ) -> Self {
        Self {
            tree,
            codec,
            ignore,
            highlights_enabled,
            added_documents: Vec::new(),
            element_translations: ElementTranslations::new(),
        }
    }

    /// Translates every node of `roots` and their subtrees.
    pub fn scan(&mut self, roots: impl IntoIterator<Item = NodeId>) -> &mut Self {
        let start = Instant::now();
        let mut count = 0_usize;
        for root in roots {
            self.translate_node(root);
            count += 1;
        }
        tracing::debug!(
            roots = count,
            elements = self.element_translations.len(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Scanned"
        );
        self
    }

    #[must_use]
    pub fn added_documents(&self) -> &[NodeId] {
        &self.added_documents
    }

    #[must_use]
    pub const fn element_translations(&self) -> &ElementTranslations {
        &self.element_translations
    }

    /// Groups the recorded markers by source term.
    ///
    /// The link of a term is resolved once, when its source is first met.
    pub fn finish(self, links: &mut LinkResolver) -> ScanOutput {
        let mut translations = TranslationSet::new();
        for (element, infos) in self.element_translations {
            for (position, records) in infos {
                for record in records {
                    let entry = translations.entry_or_insert_with(&record, || {
                        links.link(&record.source, &record.context)
                    });
                    entry.add_target(Target::new(element, position.clone()));
                }
            }
        }
        ScanOutput { added_documents: self.added_documents, translations }
    }

    /// Classifies `node` for [`Self::translate_node`].
    fn visit(&self, node: NodeId) -> Visit {
        match self.tree.kind(node) {
            Some(NodeKind::Document) => Visit::Document,
            Some(NodeKind::Element(element)) => {
                if self.is_ignored(node) {
                    return Visit::Skip;
                }
                match element.tag() {
                    "title" => Visit::Title,
                    "iframe" => Visit::Element { frame_document: element.content_document() },
                    _ => Visit::Element { frame_document: None },
                }
            }
            Some(NodeKind::Text(_)) => match self.tree.parent_element(node) {
                Some(parent) if !self.is_ignored(parent) => Visit::Text,
                _ => Visit::Skip,
            },
            Some(NodeKind::Comment(_)) | None => Visit::Skip,
        }
    }

    /// Whether an element strictly below `node` carries an ignored attribute.
    fn has_ignored_descendant(&self, node: NodeId) -> bool {
        self.tree.children(node).iter().any(|&child| {
            self.tree.element(child).is_some_and(|el| {
                self.ignore.any_ignored(el.attributes().map(|(name, _)| name))
                    || self.has_ignored_descendant(child)
            })
        })
    }

    /// Whether `element` or one of its ancestors carries an ignored attribute.
    fn is_ignored(&self, element: NodeId) -> bool {
        self.tree.ancestors(element).any(|node| {
            self.tree
                .element(node)
                .is_some_and(|el| self.ignore.any_ignored(el.attributes().map(|(name, _)| name)))
        })
    }

    /// Translates `node` and its subtree, children first.
    fn translate_node(&mut self, node: NodeId) {
        let is_element = match self.visit(node) {
            Visit::Skip => return,
            Visit::Title => {
                self.translate_property(node, Property::TextContent, false);
                return;
            }
            Visit::Text => {
                let in_title = self
                    .tree
                    .parent_element(node)
                    .and_then(|parent| self.tree.element(parent))
                    .is_some_and(|parent| parent.tag() == "title");
                let track = self.highlights_enabled && !in_title;
                self.translate_property(node, Property::TextContent, track);
                return;
            }
            Visit::Document => false,
            Visit::Element { frame_document } => {
                if let Some(document) = frame_document
                    && !self.added_documents.contains(&document)
                {
                    self.added_documents.push(document);
                }
                true
            }
        };

        let children = self.tree.children(node).to_vec();
        for child in children {
            self.translate_node(child);
        }

        if !is_element {
            return;
        }

        let attributes: Vec<(String, String)> = self
            .tree
            .element(node)
            .map(|el| el.attributes().map(|(n, v)| (n.to_string(), v.to_string())).collect())
            .unwrap_or_default();
        for (name, value) in attributes {
            self.translate_attribute(node, name, &value);
        }

        for property in Property::ALL {
            self.translate_property(node, property, self.highlights_enabled);
        }
    }

    /// Decodes one attribute value, trimmed. The attribute is only rewritten when it
    /// holds markers.
    fn translate_attribute(&mut self, element: NodeId, name: String, value: &str) {
        let Decoded::Translated { text, markers } = self.codec.decode(value.trim()) else {
            return;
        };
        self.tree.set_attribute(element, &name, text);
        if self.highlights_enabled {
            self.element_translations.push(self.tree, element, Position::Attribute(name), markers);
        }
    }

    /// Decodes a string property. Missing and empty values are skipped.
    ///
    /// The text content of an element holding an ignored subtree is left alone, since
    /// rewriting it would replace that subtree.
    fn translate_property(&mut self, node: NodeId, property: Property, track: bool) {
        if property == Property::TextContent
            && self.tree.is_element(node)
            && self.has_ignored_descendant(node)
        {
            return;
        }
        let Some(raw) = self.tree.property(node, property).filter(|value| !value.is_empty())
        else {
            return;
        };
        let Decoded::Translated { text, markers } = self.codec.decode(raw.trim()) else {
            return;
        };
        self.tree.set_property(node, property, text);
        if !track {
            return;
        }
        let element =
            if self.tree.is_element(node) { Some(node) } else { self.tree.parent_element(node) };
        if let Some(element) = element {
            self.element_translations.push(self.tree, element, property.into(), markers);
        }
    }
}
