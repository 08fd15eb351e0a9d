//! Ordered box collection for the image being edited.

use kurbo::Rect;

use crate::model::{ClassIndex, ImageSize, LabeledBox};

/// Which raw rectangle coordinates are under the pointer.
///
/// Flags refer to the rectangle as passed in, before corners are
/// reordered, so an inverted drag still knows which edge stays put.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DragEdges {
    pub x0: bool,
    pub y0: bool,
    pub x1: bool,
    pub y1: bool,
}

impl DragEdges {
    pub const NONE: DragEdges = DragEdges {
        x0: false,
        y0: false,
        x1: false,
        y1: false,
    };
}

/// Normalizes corners, clips to `bounds`, then grows any side shorter than
/// `min_len` away from the edge that is not being dragged.
///
/// When `bounds` is at least `min_len` on both axes the result is inside
/// `bounds` and at least `min_len` wide and tall.
pub fn canonicalize(rect: Rect, bounds: Rect, min_len: f64, drag: DragEdges) -> Rect {
    let (x0, x1) = canonical_axis(
        rect.x0,
        rect.x1,
        bounds.x0,
        bounds.x1,
        min_len,
        drag.x0 && !drag.x1,
    );
    let (y0, y1) = canonical_axis(
        rect.y0,
        rect.y1,
        bounds.y0,
        bounds.y1,
        min_len,
        drag.y0 && !drag.y1,
    );
    Rect::new(x0, y0, x1, y1)
}

fn canonical_axis(
    a: f64,
    b: f64,
    lo: f64,
    hi: f64,
    min_len: f64,
    first_dragged: bool,
) -> (f64, f64) {
    let a = if a.is_finite() { a } else { lo };
    let b = if b.is_finite() { b } else { lo };
    let anchor = if first_dragged { b } else { a };

    let mut start = a.min(b).clamp(lo, hi);
    let mut end = a.max(b).clamp(lo, hi);

    if end - start < min_len {
        if (anchor - start).abs() <= (anchor - end).abs() {
            end = start + min_len;
        } else {
            start = end - min_len;
        }

        if end > hi {
            end = hi;
            start = (hi - min_len).max(lo);
        }
        if start < lo {
            start = lo;
            end = (lo + min_len).min(hi);
        }
    }

    (start, end)
}

/// Insertion-ordered boxes for one image.
///
/// Insertion order doubles as draw order and hit-test order. Every write
/// goes through [`canonicalize`], so the store never holds a degenerate or
/// out-of-bounds box.
#[derive(Clone, Debug)]
pub struct BoxStore {
    boxes: Vec<LabeledBox>,
    bounds: Rect,
    min_len: f64,
}

impl BoxStore {
    pub fn new(image: ImageSize, min_len: f64) -> Self {
        Self {
            boxes: Vec::new(),
            bounds: image.bounds(),
            min_len: min_len.max(0.0),
        }
    }

    /// An empty store with no image; every box collapses to the origin.
    pub fn empty() -> Self {
        Self::new(ImageSize::new(0, 0), 0.0)
    }

    /// Drops all boxes and switches to a new image.
    pub fn reset(&mut self, image: ImageSize) {
        self.boxes.clear();
        self.bounds = image.bounds();
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn min_len(&self) -> f64 {
        self.min_len
    }

    pub fn canonicalize(&self, rect: Rect, drag: DragEdges) -> Rect {
        canonicalize(rect, self.bounds, self.min_len, drag)
    }

    /// Appends a box and returns its index.
    pub fn add(&mut self, rect: Rect, class: ClassIndex) -> usize {
        let rect = self.canonicalize(rect, DragEdges::NONE);
        self.boxes.push(LabeledBox { rect, class });
        self.boxes.len() - 1
    }

    /// Replaces the rectangle of box `index`. Returns false if out of range.
    pub fn update(&mut self, index: usize, rect: Rect) -> bool {
        self.update_dragged(index, rect, DragEdges::NONE)
    }

    /// Like [`update`](Self::update), growing short sides away from the
    /// undragged edges.
    pub fn update_dragged(&mut self, index: usize, rect: Rect, drag: DragEdges) -> bool {
        let rect = self.canonicalize(rect, drag);
        match self.boxes.get_mut(index) {
            Some(slot) => {
                slot.rect = rect;
                true
            }
            None => false,
        }
    }

    pub fn set_class(&mut self, index: usize, class: ClassIndex) -> bool {
        match self.boxes.get_mut(index) {
            Some(slot) => {
                slot.class = class;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<LabeledBox> {
        (index < self.boxes.len()).then(|| self.boxes.remove(index))
    }

    pub fn remove_last(&mut self) -> Option<LabeledBox> {
        self.boxes.pop()
    }

    pub fn clear(&mut self) {
        self.boxes.clear();
    }

    pub fn all(&self) -> &[LabeledBox] {
        &self.boxes
    }

    pub fn get(&self, index: usize) -> Option<&LabeledBox> {
        self.boxes.get(index)
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}
