//! Geometry of the pointers shown around highlighted elements.

use serde::Serialize;

use crate::tree::{
    NodeId,
    Rect,
};

/// Smallest pointer side, in CSS pixels.
pub const MIN_POINTER_SIZE: f64 = 32.0;

/// Colour of a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerTone {
    /// Translated term.
    Success,
    /// Untranslated term.
    Danger,
}

impl PointerTone {
    #[must_use]
    pub const fn for_translated(translated: bool) -> Self {
        if translated { Self::Success } else { Self::Danger }
    }
}

/// A pointer drawn around one element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pointer {
    pub target: NodeId,
    /// Box of the target, grown to at least [`MIN_POINTER_SIZE`] around its centre.
    pub rect: Rect,
    pub tone: PointerTone,
}

impl Pointer {
    /// Pointer around `bounds`, or `None` when the element is not laid out.
    #[must_use]
    pub fn around(target: NodeId, bounds: Rect, translated: bool) -> Option<Self> {
        if bounds.is_empty() {
            return None;
        }
        let (x, width) = grow(bounds.x, bounds.width);
        let (y, height) = grow(bounds.y, bounds.height);
        Some(Self {
            target,
            rect: Rect::new(x, y, width, height),
            tone: PointerTone::for_translated(translated),
        })
    }
}

/// Grows a segment to [`MIN_POINTER_SIZE`], keeping its centre.
fn grow(start: f64, size: f64) -> (f64, f64) {
    if size < MIN_POINTER_SIZE {
        (start - (MIN_POINTER_SIZE - size) / 2.0, MIN_POINTER_SIZE)
    } else {
        (start, size)
    }
}

/// Pointers currently shown, at most one per element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointerOverlay {
    /// Pointers in creation order.
    pointers: Vec<Pointer>,
}

impl PointerOverlay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows a pointer around `target`.
    ///
    /// Returns `false` when `target` already has one or is not laid out.
    pub fn show(&mut self, target: NodeId, bounds: Option<Rect>, translated: bool) -> bool {
        if self.get(target).is_some() {
            return false;
        }
        let Some(pointer) = bounds.and_then(|bounds| Pointer::around(target, bounds, translated))
        else {
            return false;
        };
        self.pointers.push(pointer);
        true
    }

    pub fn clear(&mut self) {
        self.pointers.clear();
    }

    #[must_use]
    pub fn get(&self, target: NodeId) -> Option<&Pointer> {
        self.pointers.iter().find(|pointer| pointer.target == target)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pointer> {
        self.pointers.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use googletest::prelude::*;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::small(Rect::new(100.0, 50.0, 10.0, 20.0), Rect::new(89.0, 44.0, 32.0, 32.0))]
    #[case::large(Rect::new(0.0, 0.0, 200.0, 40.0), Rect::new(0.0, 0.0, 200.0, 40.0))]
    #[case::zero_size_off_origin(Rect::new(10.0, 10.0, 0.0, 0.0), Rect::new(-6.0, -6.0, 32.0, 32.0))]
    fn pointer_box_is_at_least_min_size(#[case] bounds: Rect, #[case] expected: Rect) {
        let pointer = Pointer::around(NodeId::from_raw(1), bounds, true).unwrap();

        assert_that!(pointer.rect, eq(expected));
        assert_that!(pointer.tone, eq(PointerTone::Success));
    }

    #[googletest::test]
    fn empty_rects_get_no_pointer() {
        let mut overlay = PointerOverlay::new();

        expect_that!(overlay.show(NodeId::from_raw(1), Some(Rect::default()), false), eq(false));
        expect_that!(overlay.show(NodeId::from_raw(2), None, false), eq(false));
        expect_that!(overlay.is_empty(), eq(true));
    }

    #[googletest::test]
    fn one_pointer_per_element() {
        let mut overlay = PointerOverlay::new();
        let bounds = Some(Rect::new(0.0, 0.0, 50.0, 50.0));

        expect_that!(overlay.show(NodeId::from_raw(1), bounds, false), eq(true));
        expect_that!(overlay.show(NodeId::from_raw(1), bounds, true), eq(false));
        expect_that!(overlay.len(), eq(1));
        expect_that!(
            overlay.get(NodeId::from_raw(1)).map(|p| p.tone),
            some(eq(PointerTone::Danger))
        );

        overlay.clear();
        expect_that!(overlay.is_empty(), eq(true));
    }
}
