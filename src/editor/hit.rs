//! Pointer hit testing against boxes and their resize handles.

use kurbo::{Point, Rect};
use serde::Serialize;

use super::space::CoordinateSpace;
use super::store::DragEdges;
use crate::model::LabeledBox;

/// A resize handle: four corners and four edge midpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum HandleKind {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Left,
    Right,
    Top,
    Bottom,
}

impl HandleKind {
    /// Scan order used by the handle phase of [`hit_test`].
    pub const ALL: [HandleKind; 8] = [
        HandleKind::TopLeft,
        HandleKind::TopRight,
        HandleKind::BottomLeft,
        HandleKind::BottomRight,
        HandleKind::Left,
        HandleKind::Right,
        HandleKind::Top,
        HandleKind::Bottom,
    ];

    /// Anchor point of this handle on `rect`, in the same space as `rect`.
    pub fn anchor(self, rect: Rect) -> Point {
        let center = rect.center();
        match self {
            HandleKind::TopLeft => Point::new(rect.x0, rect.y0),
            HandleKind::TopRight => Point::new(rect.x1, rect.y0),
            HandleKind::BottomLeft => Point::new(rect.x0, rect.y1),
            HandleKind::BottomRight => Point::new(rect.x1, rect.y1),
            HandleKind::Left => Point::new(rect.x0, center.y),
            HandleKind::Right => Point::new(rect.x1, center.y),
            HandleKind::Top => Point::new(center.x, rect.y0),
            HandleKind::Bottom => Point::new(center.x, rect.y1),
        }
    }

    /// Edges moved by dragging this handle.
    pub fn drag_edges(self) -> DragEdges {
        let (x0, y0, x1, y1) = match self {
            HandleKind::TopLeft => (true, true, false, false),
            HandleKind::TopRight => (false, true, true, false),
            HandleKind::BottomLeft => (true, false, false, true),
            HandleKind::BottomRight => (false, false, true, true),
            HandleKind::Left => (true, false, false, false),
            HandleKind::Right => (false, false, true, false),
            HandleKind::Top => (false, true, false, false),
            HandleKind::Bottom => (false, false, false, true),
        };
        DragEdges { x0, y0, x1, y1 }
    }

    /// Moves the edges of `snapshot` owned by this handle to `to`.
    ///
    /// The result may be inverted; callers canonicalize it.
    pub fn resize(self, snapshot: Rect, to: Point) -> Rect {
        let edges = self.drag_edges();
        Rect {
            x0: if edges.x0 { to.x } else { snapshot.x0 },
            y0: if edges.y0 { to.y } else { snapshot.y0 },
            x1: if edges.x1 { to.x } else { snapshot.x1 },
            y1: if edges.y1 { to.y } else { snapshot.y1 },
        }
    }

    pub fn cursor(self) -> CursorShape {
        match self {
            HandleKind::TopLeft | HandleKind::BottomRight => CursorShape::ResizeDiagonal,
            HandleKind::TopRight | HandleKind::BottomLeft => CursorShape::ResizeAntiDiagonal,
            HandleKind::Left | HandleKind::Right => CursorShape::ResizeHorizontal,
            HandleKind::Top | HandleKind::Bottom => CursorShape::ResizeVertical,
        }
    }
}

/// Pointer affordance requested from the host UI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum CursorShape {
    #[default]
    Arrow,
    Move,
    /// `\` diagonal: top-left / bottom-right.
    ResizeDiagonal,
    /// `/` diagonal: top-right / bottom-left.
    ResizeAntiDiagonal,
    ResizeHorizontal,
    ResizeVertical,
}

/// Result of a successful hit test. `handle` is `None` for a body hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hit {
    pub index: usize,
    pub handle: Option<HandleKind>,
}

/// Resolves a display-space pointer position to a box and handle.
///
/// Handles are scanned in store order, so where handle squares of two
/// boxes overlap the earlier box wins even if a later one is drawn on top.
/// Bodies are scanned in reverse store order (topmost first).
pub fn hit_test(
    pointer: Point,
    boxes: &[LabeledBox],
    space: &CoordinateSpace,
    handle_half: f64,
) -> Option<Hit> {
    for (index, labeled) in boxes.iter().enumerate() {
        for handle in HandleKind::ALL {
            let center = space.to_display(handle.anchor(labeled.rect));
            if (pointer.x - center.x).abs() <= handle_half
                && (pointer.y - center.y).abs() <= handle_half
            {
                return Some(Hit {
                    index,
                    handle: Some(handle),
                });
            }
        }
    }

    boxes
        .iter()
        .enumerate()
        .rev()
        .find(|(_, labeled)| contains_inclusive(space.rect_to_display(labeled.rect), pointer))
        .map(|(index, _)| Hit {
            index,
            handle: None,
        })
}

/// Handle squares of `rect` in display space, in [`HandleKind::ALL`] order.
pub fn handle_rects(
    rect: Rect,
    space: &CoordinateSpace,
    handle_half: f64,
) -> [(HandleKind, Rect); 8] {
    HandleKind::ALL.map(|handle| {
        let center = space.to_display(handle.anchor(rect));
        (
            handle,
            Rect::new(
                center.x - handle_half,
                center.y - handle_half,
                center.x + handle_half,
                center.y + handle_half,
            ),
        )
    })
}

fn contains_inclusive(rect: Rect, point: Point) -> bool {
    point.x >= rect.x0 && point.x <= rect.x1 && point.y >= rect.y0 && point.y <= rect.y1
}
