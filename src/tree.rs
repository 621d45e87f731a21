//! Arena-backed mutable document tree.
//!
//! Stands in for the host document: elements with attributes and a form value,
//! text and comment nodes, documents (including documents embedded in frames), and
//! mutation observation over whole documents.

/// Mutation records and the observation guard
mod observer;

use std::fmt::Write as _;

use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

pub use observer::{
    MutationKind,
    MutationRecord,
    ObservationPause,
};
use observer::Observer;

use crate::types::Property;

/// Handle to a node of a [`Tree`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub const fn from_raw(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Structural errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    #[error("Unknown node {0:?}")]
    UnknownNode(NodeId),
    /// Appending would make a node its own ancestor, or move a document.
    #[error("Cannot insert {child:?} under {parent:?}")]
    HierarchyRequest { parent: NodeId, child: NodeId },
    /// Text and comment nodes cannot have children.
    #[error("Node {0:?} cannot have children")]
    NotAContainer(NodeId),
}

/// Bounding box in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// A rect with no size at the origin, i.e. an element that is not laid out.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_empty(&self) -> bool {
        self.width == 0.0 && self.height == 0.0 && self.x == 0.0 && self.y == 0.0
    }
}

/// Element payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Lowercase tag name.
    tag: String,
    /// Attributes in document order.
    attributes: Vec<(String, String)>,
    /// Form control value, if the element has one.
    value: Option<String>,
    /// Document displayed by a frame element.
    content_document: Option<NodeId>,
    /// Layout box supplied by the host.
    bounds: Option<Rect>,
}

impl Element {
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    #[must_use]
    pub const fn content_document(&self) -> Option<NodeId> {
        self.content_document
    }

    #[must_use]
    pub const fn bounds(&self) -> Option<Rect> {
        self.bounds
    }
}

/// The closed set of node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
}

/// Arena slot.
#[derive(Debug, Clone)]
struct Node {
    /// Payload.
    kind: NodeKind,
    /// Parent, `None` for documents and detached roots.
    parent: Option<NodeId>,
    /// Children in order.
    children: Vec<NodeId>,
}

/// Elements serialised without a closing tag.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "link", "meta"];

/// A forest of documents and detached nodes.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    /// Node arena, indexed by [`NodeId`].
    nodes: Vec<Node>,
    /// Mutation observation state.
    observer: Observer,
}

impl Tree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ---- construction ------------------------------------------------------------

    pub fn create_document(&mut self) -> NodeId {
        self.push(NodeKind::Document)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(Element {
            tag: tag.to_ascii_lowercase(),
            ..Element::default()
        }))
    }

    pub fn create_text(&mut self, data: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(data.into()))
    }

    pub fn create_comment(&mut self, data: impl Into<String>) -> NodeId {
        self.push(NodeKind::Comment(data.into()))
    }

    /// Appends `child` as last child of `parent`, detaching it from its old parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        match self.kind(parent) {
            None => return Err(TreeError::UnknownNode(parent)),
            Some(NodeKind::Text(_) | NodeKind::Comment(_)) => {
                return Err(TreeError::NotAContainer(parent));
            }
            Some(NodeKind::Document | NodeKind::Element(_)) => {}
        }
        match self.kind(child) {
            None => return Err(TreeError::UnknownNode(child)),
            Some(NodeKind::Document) => return Err(TreeError::HierarchyRequest { parent, child }),
            Some(_) => {}
        }
        if self.contains(child, parent) {
            return Err(TreeError::HierarchyRequest { parent, child });
        }

        self.detach(child);
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(child.0) {
            node.parent = Some(parent);
        }
        self.record(parent, MutationKind::ChildList);
        Ok(())
    }

    /// Detaches `node` from its parent. The subtree stays usable.
    pub fn remove(&mut self, node: NodeId) -> Result<(), TreeError> {
        if self.node(node).is_none() {
            return Err(TreeError::UnknownNode(node));
        }
        self.detach(node);
        Ok(())
    }

    // ---- structure ---------------------------------------------------------------

    #[must_use]
    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.node(node).map(|n| &n.kind)
    }

    #[must_use]
    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match self.kind(node) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    /// Parent, if it is an element.
    #[must_use]
    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node).filter(|&parent| self.is_element(parent))
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map_or(&[], |n| n.children.as_slice())
    }

    /// Inclusive ancestors of `node`, starting with `node` itself.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.node(node).map(|_| node), |&current| self.parent(current))
    }

    /// Whether `descendant` is `ancestor` or lies in its subtree.
    #[must_use]
    pub fn contains(&self, ancestor: NodeId, descendant: NodeId) -> bool {
        self.ancestors(descendant).any(|node| node == ancestor)
    }

    /// Topmost ancestor of `node`.
    #[must_use]
    pub fn root(&self, node: NodeId) -> Option<NodeId> {
        self.ancestors(node).last()
    }

    /// The document `node` belongs to, if it is attached to one.
    #[must_use]
    pub fn owner_document(&self, node: NodeId) -> Option<NodeId> {
        self.root(node).filter(|&root| matches!(self.kind(root), Some(NodeKind::Document)))
    }

    /// Whether `node` is attached to a document. Unknown ids are not connected.
    #[must_use]
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.owner_document(node).is_some()
    }

    /// First descendant element with the given tag, in document order.
    #[must_use]
    pub fn find_element(&self, root: NodeId, tag: &str) -> Option<NodeId> {
        self.children(root).iter().find_map(|&child| {
            if self.element(child).is_some_and(|el| el.tag == tag) {
                Some(child)
            } else {
                self.find_element(child, tag)
            }
        })
    }

    // ---- content -----------------------------------------------------------------

    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node).and_then(|el| el.attribute(name))
    }

    /// Sets an attribute, keeping its position when it already exists.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        let Some(element) = self.element_mut(node) else {
            return false;
        };
        if let Some(slot) = element.attributes.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            element.attributes.push((name.to_string(), value));
        }
        self.record(node, MutationKind::Attributes);
        true
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> bool {
        let Some(element) = self.element_mut(node) else {
            return false;
        };
        let before = element.attributes.len();
        element.attributes.retain(|(n, _)| n != name);
        let removed = element.attributes.len() != before;
        if removed {
            self.record(node, MutationKind::Attributes);
        }
        removed
    }

    /// Data of a text or comment node.
    #[must_use]
    pub fn data(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            Some(NodeKind::Text(data) | NodeKind::Comment(data)) => Some(data),
            _ => None,
        }
    }

    /// Replaces the data of a text or comment node.
    pub fn set_data(&mut self, node: NodeId, data: impl Into<String>) -> bool {
        let Some(Node { kind: NodeKind::Text(slot) | NodeKind::Comment(slot), .. }) =
            self.nodes.get_mut(node.0)
        else {
            return false;
        };
        *slot = data.into();
        self.record(node, MutationKind::CharacterData);
        true
    }

    /// `textContent`: the data of a character node, or the concatenated text of an
    /// element's descendants. Documents have none.
    #[must_use]
    pub fn text_content(&self, node: NodeId) -> Option<String> {
        match self.kind(node)? {
            NodeKind::Document => None,
            NodeKind::Text(data) | NodeKind::Comment(data) => Some(data.clone()),
            NodeKind::Element(_) => {
                let mut text = String::new();
                self.collect_text(node, &mut text);
                Some(text)
            }
        }
    }

    /// Sets `textContent`. On elements, every child is replaced by a single text node.
    pub fn set_text_content(&mut self, node: NodeId, text: impl Into<String>) -> bool {
        let text = text.into();
        match self.kind(node) {
            Some(NodeKind::Text(_) | NodeKind::Comment(_)) => self.set_data(node, text),
            Some(NodeKind::Element(_)) => {
                let children = self.node_mut(node).map(|n| std::mem::take(&mut n.children));
                for child in children.unwrap_or_default() {
                    if let Some(n) = self.nodes.get_mut(child.0) {
                        n.parent = None;
                    }
                }
                if !text.is_empty() {
                    let child = self.push(NodeKind::Text(text));
                    if let Some(n) = self.nodes.get_mut(child.0) {
                        n.parent = Some(node);
                    }
                    if let Some(n) = self.nodes.get_mut(node.0) {
                        n.children.push(child);
                    }
                }
                self.record(node, MutationKind::ChildList);
                true
            }
            _ => false,
        }
    }

    /// Reads a translatable property. `None` when the node has no string value for it.
    #[must_use]
    pub fn property(&self, node: NodeId, property: Property) -> Option<String> {
        match property {
            Property::TextContent => self.text_content(node),
            Property::Value => self.element(node).and_then(|el| el.value.clone()),
        }
    }

    /// Writes a translatable property.
    pub fn set_property(&mut self, node: NodeId, property: Property, value: String) -> bool {
        match property {
            Property::TextContent => self.set_text_content(node, value),
            Property::Value => self.set_value(node, value),
        }
    }

    /// Sets the form value. Like the DOM `value` property, this is not observed.
    pub fn set_value(&mut self, node: NodeId, value: impl Into<String>) -> bool {
        self.element_mut(node).map(|el| el.value = Some(value.into())).is_some()
    }

    /// Embeds `document` in the frame element `frame`.
    pub fn set_content_document(&mut self, frame: NodeId, document: NodeId) -> bool {
        self.element_mut(frame).map(|el| el.content_document = Some(document)).is_some()
    }

    pub fn set_bounds(&mut self, node: NodeId, bounds: Rect) -> bool {
        self.element_mut(node).map(|el| el.bounds = Some(bounds)).is_some()
    }

    /// Serialises `node` and its subtree as HTML.
    #[must_use]
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    // ---- observation -------------------------------------------------------------

    /// Starts observing the subtree of `document`.
    pub fn observe(&mut self, document: NodeId) {
        self.observer.add_document(document);
        self.observer.connect();
    }

    /// Stops observing and drops pending records.
    pub fn disconnect(&mut self) {
        self.observer.disconnect();
    }

    #[must_use]
    pub const fn is_observing(&self) -> bool {
        self.observer.is_connected()
    }

    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        self.observer.take_records()
    }

    /// Drains pending records and pauses observation until the guard is dropped.
    pub fn pause_observation(&mut self) -> ObservationPause<'_> {
        ObservationPause::new(self)
    }

    // ---- internals ---------------------------------------------------------------

    /// Allocates a detached node.
    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { kind, parent: None, children: Vec::new() });
        id
    }

    /// Arena lookup.
    fn node(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(node.0)
    }

    /// Mutable arena lookup.
    fn node_mut(&mut self, node: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node.0)
    }

    /// Mutable element payload.
    fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        match self.node_mut(node) {
            Some(Node { kind: NodeKind::Element(element), .. }) => Some(element),
            _ => None,
        }
    }

    /// Unlinks `node` from its parent, if any.
    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.node_mut(node).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|&child| child != node);
        }
        self.record(parent, MutationKind::ChildList);
    }

    /// Queues a record when `target` belongs to an observed document.
    fn record(&mut self, target: NodeId, kind: MutationKind) {
        if !self.observer.is_connected() {
            return;
        }
        if self.root(target).is_some_and(|root| self.observer.observes(root)) {
            self.observer.push(MutationRecord { target, kind });
        }
    }

    /// Appends descendant text of `node` to `out`.
    fn collect_text(&self, node: NodeId, out: &mut String) {
        for &child in self.children(node) {
            match self.kind(child) {
                Some(NodeKind::Text(data)) => out.push_str(data),
                Some(NodeKind::Element(_)) => self.collect_text(child, out),
                _ => {}
            }
        }
    }

    /// HTML serialisation worker.
    fn write_html(&self, node: NodeId, out: &mut String) {
        match self.kind(node) {
            Some(NodeKind::Document) => {
                for &child in self.children(node) {
                    self.write_html(child, out);
                }
            }
            Some(NodeKind::Element(element)) => {
                let _ = write!(out, "<{}", element.tag);
                for (name, value) in &element.attributes {
                    let _ = write!(out, " {name}=\"{}\"", escape(value, true));
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                    return;
                }
                for &child in self.children(node) {
                    self.write_html(child, out);
                }
                let _ = write!(out, "</{}>", element.tag);
            }
            Some(NodeKind::Text(data)) => out.push_str(&escape(data, false)),
            Some(NodeKind::Comment(data)) => {
                let _ = write!(out, "<!--{data}-->");
            }
            None => {}
        }
    }
}

/// Minimal HTML escaping for text and attribute values.
fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use googletest::prelude::*;
    use rstest::rstest;

    use super::*;
    use crate::test_utils::{
        append_element,
        append_text,
        new_document,
    };

    #[googletest::test]
    fn text_content_concatenates_descendants() {
        let mut tree = Tree::new();
        let (_, body) = new_document(&mut tree);
        let div = append_element(&mut tree, body, "div", &[]);
        append_text(&mut tree, div, "Hello ");
        let b = append_element(&mut tree, div, "b", &[]);
        append_text(&mut tree, b, "world");
        let comment = tree.create_comment("ignored");
        tree.append_child(div, comment).unwrap();

        expect_that!(tree.text_content(div), some(eq("Hello world")));
        expect_that!(tree.outer_html(div), eq("<div>Hello <b>world</b><!--ignored--></div>"));
    }

    #[googletest::test]
    fn set_text_content_replaces_children() {
        let mut tree = Tree::new();
        let (_, body) = new_document(&mut tree);
        let div = append_element(&mut tree, body, "div", &[]);
        let old = append_text(&mut tree, div, "a");
        append_element(&mut tree, div, "span", &[]);

        tree.set_text_content(div, "plain");

        expect_that!(tree.outer_html(div), eq("<div>plain</div>"));
        expect_that!(tree.is_connected(old), eq(false));
        expect_that!(tree.parent(old), none());
    }

    #[googletest::test]
    fn connection_follows_document_attachment() {
        let mut tree = Tree::new();
        let (document, body) = new_document(&mut tree);
        let div = append_element(&mut tree, body, "div", &[]);

        expect_that!(tree.is_connected(div), eq(true));
        expect_that!(tree.owner_document(div), some(eq(document)));

        tree.remove(div).unwrap();

        expect_that!(tree.is_connected(div), eq(false));
        expect_that!(tree.is_connected(NodeId::from_raw(9999)), eq(false));
    }

    #[rstest]
    #[case::into_itself(true)]
    #[case::into_descendant(false)]
    fn append_rejects_cycles(#[case] into_itself: bool) {
        let mut tree = Tree::new();
        let outer = tree.create_element("div");
        let inner = tree.create_element("span");
        tree.append_child(outer, inner).unwrap();

        let parent = if into_itself { outer } else { inner };

        assert_that!(
            tree.append_child(parent, outer),
            err(eq(TreeError::HierarchyRequest { parent, child: outer }))
        );
    }

    #[googletest::test]
    fn append_rejects_character_parents_and_unknown_nodes() {
        let mut tree = Tree::new();
        let text = tree.create_text("x");
        let div = tree.create_element("div");

        expect_that!(tree.append_child(text, div), err(eq(TreeError::NotAContainer(text))));
        expect_that!(
            tree.append_child(div, NodeId::from_raw(42)),
            err(eq(TreeError::UnknownNode(NodeId::from_raw(42))))
        );
    }

    #[googletest::test]
    fn contains_is_inclusive() {
        let mut tree = Tree::new();
        let (_, body) = new_document(&mut tree);
        let div = append_element(&mut tree, body, "div", &[]);
        let span = append_element(&mut tree, div, "span", &[]);

        expect_that!(tree.contains(div, div), eq(true));
        expect_that!(tree.contains(div, span), eq(true));
        expect_that!(tree.contains(span, div), eq(false));
    }

    #[googletest::test]
    fn attributes_keep_their_position() {
        let mut tree = Tree::new();
        let div = tree.create_element("DIV");
        tree.set_attribute(div, "title", "a");
        tree.set_attribute(div, "alt", "b");
        tree.set_attribute(div, "title", "c\"d");

        expect_that!(tree.outer_html(div), eq("<div title=\"c&quot;d\" alt=\"b\"></div>"));
        expect_that!(tree.remove_attribute(div, "alt"), eq(true));
        expect_that!(tree.remove_attribute(div, "alt"), eq(false));
    }

    #[googletest::test]
    fn records_mutations_only_while_observing() {
        let mut tree = Tree::new();
        let (document, body) = new_document(&mut tree);
        let div = append_element(&mut tree, body, "div", &[]);
        let text = append_text(&mut tree, div, "x");

        tree.set_attribute(div, "title", "unobserved");
        tree.observe(document);
        tree.set_attribute(div, "title", "observed");
        tree.set_data(text, "y");
        tree.set_value(div, "not recorded");
        let detached = tree.create_element("p");
        tree.set_attribute(detached, "title", "detached");

        expect_that!(
            tree.take_records(),
            elements_are![
                eq(&MutationRecord { target: div, kind: MutationKind::Attributes }),
                eq(&MutationRecord { target: text, kind: MutationKind::CharacterData }),
            ]
        );
    }

    #[googletest::test]
    fn moving_a_node_records_both_parents() {
        let mut tree = Tree::new();
        let (document, body) = new_document(&mut tree);
        let a = append_element(&mut tree, body, "div", &[]);
        let b = append_element(&mut tree, body, "div", &[]);
        let span = append_element(&mut tree, a, "span", &[]);
        tree.observe(document);

        tree.append_child(b, span).unwrap();

        expect_that!(
            tree.take_records().iter().map(|r| r.target).collect::<Vec<_>>(),
            elements_are![eq(&a), eq(&b)]
        );
    }

    #[googletest::test]
    fn pause_drains_and_resumes() {
        let mut tree = Tree::new();
        let (document, body) = new_document(&mut tree);
        tree.observe(document);
        tree.set_attribute(body, "class", "a");

        {
            let mut paused = tree.pause_observation();
            expect_that!(paused.take_pending(), len(eq(1)));
            paused.set_attribute(body, "class", "b");
            expect_that!(paused.is_observing(), eq(false));
        }

        expect_that!(tree.is_observing(), eq(true));
        expect_that!(tree.take_records(), is_empty());
        tree.set_attribute(body, "class", "c");
        expect_that!(tree.take_records(), len(eq(1)));
    }

    #[googletest::test]
    fn empty_rect_means_not_laid_out() {
        expect_that!(Rect::default().is_empty(), eq(true));
        expect_that!(Rect::new(0.0, 0.0, 10.0, 0.0).is_empty(), eq(false));
    }
}
