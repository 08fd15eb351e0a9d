//! Interactive box editing.
//!
//! [`Editor`] is a synchronous state machine: every [`InputEvent`] is fully
//! handled before the next one is accepted, and every geometric write goes
//! through [`BoxStore`] canonicalization so no event sequence can leave an
//! invalid box behind. [`Session`] wraps an editor with the image list, class
//! list and save directory it needs to be useful on its own.

mod event;
mod hit;
mod session;
mod space;
mod store;

pub use event::{BoxesChanged, EditOutcome, HostRequest, InputEvent, Key, MouseButton};
pub use hit::{handle_rects, hit_test, CursorShape, HandleKind, Hit};
pub use session::{ImageList, Session, IMAGE_EXTENSIONS};
pub use space::CoordinateSpace;
pub use store::{canonicalize, BoxStore, DragEdges};

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::model::{ClassIndex, ImageSize};

/// Wheel zoom base: one notch of `delta` scales by `WHEEL_ZOOM_BASE^delta`.
pub const WHEEL_ZOOM_BASE: f64 = 1.0015;

/// Tunables for the editor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Half the side of a handle's square hit region, in display pixels.
    pub handle_half_px: f64,
    /// Minimum box side, in image pixels.
    pub min_box_len: f64,
    /// A create gesture commits only if both sides exceed this, in image pixels.
    pub create_threshold: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            handle_half_px: 7.0,
            min_box_len: 6.0,
            create_threshold: 3.0,
        }
    }
}

/// Interaction mode, without its per-gesture data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Idle,
    Creating,
    Moving,
    Resizing,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Gesture {
    Idle,
    Creating {
        anchor: Point,
        current: Point,
    },
    Moving {
        index: usize,
        anchor: Point,
        snapshot: Rect,
    },
    Resizing {
        index: usize,
        handle: HandleKind,
        snapshot: Rect,
    },
}

/// Box editor for a single image.
#[derive(Clone, Debug)]
pub struct Editor {
    config: EditorConfig,
    space: CoordinateSpace,
    store: BoxStore,
    gesture: Gesture,
    selected: Option<usize>,
    active_class: ClassIndex,
    cursor: CursorShape,
    image: Option<ImageSize>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            config,
            space: CoordinateSpace::new(),
            store: BoxStore::new(ImageSize::new(0, 0), config.min_box_len),
            gesture: Gesture::Idle,
            selected: None,
            active_class: ClassIndex::new(0),
            cursor: CursorShape::Arrow,
            image: None,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Switches to a new image: empties the store, drops any gesture and
    /// selection. The view transform is left to the caller.
    pub fn load_image(&mut self, image: ImageSize) {
        self.store.reset(image);
        self.image = Some(image);
        self.reset_interaction();
        log::debug!("editor loaded image {image}");
    }

    /// Drops the image and its boxes; pointer input is ignored until the
    /// next [`load_image`](Self::load_image).
    pub fn unload_image(&mut self) {
        self.store.reset(ImageSize::new(0, 0));
        self.image = None;
        self.reset_interaction();
    }

    /// Back to Idle with nothing selected. Boxes are kept.
    pub fn reset_interaction(&mut self) {
        self.gesture = Gesture::Idle;
        self.selected = None;
        self.cursor = CursorShape::Arrow;
    }

    pub fn image(&self) -> Option<ImageSize> {
        self.image
    }

    pub fn space(&self) -> &CoordinateSpace {
        &self.space
    }

    pub fn space_mut(&mut self) -> &mut CoordinateSpace {
        &mut self.space
    }

    pub fn store(&self) -> &BoxStore {
        &self.store
    }

    pub fn mode(&self) -> Mode {
        match self.gesture {
            Gesture::Idle => Mode::Idle,
            Gesture::Creating { .. } => Mode::Creating,
            Gesture::Moving { .. } => Mode::Moving,
            Gesture::Resizing { .. } => Mode::Resizing,
        }
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Handle being dragged, if a resize is in progress.
    pub fn active_handle(&self) -> Option<HandleKind> {
        match self.gesture {
            Gesture::Resizing { handle, .. } => Some(handle),
            _ => None,
        }
    }

    pub fn cursor(&self) -> CursorShape {
        self.cursor
    }

    pub fn active_class(&self) -> ClassIndex {
        self.active_class
    }

    /// Class given to boxes committed by later create gestures.
    pub fn set_active_class(&mut self, class: ClassIndex) {
        self.active_class = class;
    }

    /// Live rectangle of an in-progress create gesture, in image space.
    pub fn preview(&self) -> Option<Rect> {
        match self.gesture {
            Gesture::Creating { anchor, current } => Some(self.clip(anchor, current)),
            _ => None,
        }
    }

    /// Removes every box. Returns true if anything was removed.
    pub fn clear(&mut self) -> bool {
        let had_boxes = !self.store.is_empty();
        self.store.clear();
        self.reset_interaction();
        had_boxes
    }

    /// Feeds one event through the state machine.
    pub fn handle(&mut self, event: &InputEvent) -> EditOutcome {
        let mut outcome = EditOutcome::default();
        match *event {
            InputEvent::PointerDown { position, button } => {
                if button == MouseButton::Left {
                    self.pointer_down(position);
                }
            }
            InputEvent::PointerMove { position } => self.pointer_move(position),
            InputEvent::PointerUp { position, button } => {
                if button == MouseButton::Left {
                    outcome.changed = self.pointer_up(position);
                }
            }
            InputEvent::Wheel { position, delta } => {
                self.space.zoom_at(position, WHEEL_ZOOM_BASE.powf(delta));
            }
            InputEvent::Key { key } => match key {
                Key::Delete => outcome.changed = self.delete(),
                Key::NextImage => outcome.request = Some(HostRequest::NextImage),
                Key::PreviousImage => outcome.request = Some(HostRequest::PreviousImage),
                Key::Save => outcome.request = Some(HostRequest::Save),
            },
        }
        outcome.cursor = self.cursor;
        outcome
    }

    fn pointer_down(&mut self, display: Point) {
        if self.image.is_none() {
            log::debug!("pointer down ignored: no image loaded");
            return;
        }
        if self.gesture != Gesture::Idle {
            return;
        }

        let at = self.space.to_image(display);
        let hit = hit_test(
            display,
            self.store.all(),
            &self.space,
            self.config.handle_half_px,
        );

        self.gesture = match hit {
            Some(Hit {
                index,
                handle: None,
            }) => {
                let snapshot = self.store.all()[index].rect;
                self.selected = Some(index);
                self.cursor = CursorShape::Move;
                log::debug!("moving box {index}");
                Gesture::Moving {
                    index,
                    anchor: at,
                    snapshot,
                }
            }
            Some(Hit {
                index,
                handle: Some(handle),
            }) => {
                let snapshot = self.store.all()[index].rect;
                self.selected = Some(index);
                self.cursor = handle.cursor();
                log::debug!("resizing box {index} by {handle:?}");
                Gesture::Resizing {
                    index,
                    handle,
                    snapshot,
                }
            }
            None => {
                self.selected = None;
                log::debug!("creating box at ({:.1}, {:.1})", at.x, at.y);
                Gesture::Creating {
                    anchor: at,
                    current: at,
                }
            }
        };
    }

    fn pointer_move(&mut self, display: Point) {
        let at = self.space.to_image(display);
        match self.gesture {
            Gesture::Idle => {
                let hit = hit_test(
                    display,
                    self.store.all(),
                    &self.space,
                    self.config.handle_half_px,
                );
                self.cursor = hit
                    .and_then(|hit| hit.handle)
                    .map(HandleKind::cursor)
                    .unwrap_or_default();
            }
            Gesture::Creating { anchor, .. } => {
                self.gesture = Gesture::Creating {
                    anchor,
                    current: at,
                };
            }
            Gesture::Moving {
                index,
                anchor,
                snapshot,
            } => {
                let delta: Vec2 = at - anchor;
                self.store.update(index, snapshot + delta);
            }
            Gesture::Resizing {
                index,
                handle,
                snapshot,
            } => {
                self.store
                    .update_dragged(index, handle.resize(snapshot, at), handle.drag_edges());
            }
        }
    }

    /// Ends the current gesture. Returns true if collaborators should be notified.
    fn pointer_up(&mut self, display: Point) -> bool {
        let at = self.space.to_image(display);
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        self.cursor = CursorShape::Arrow;

        match gesture {
            Gesture::Idle => false,
            Gesture::Creating { anchor, .. } => {
                let rect = self.clip(anchor, at);
                let threshold = self.config.create_threshold;
                if rect.width() > threshold && rect.height() > threshold {
                    let index = self.store.add(rect, self.active_class);
                    log::debug!("committed box {index} with class {}", self.active_class);
                } else {
                    log::debug!(
                        "discarded {:.1}x{:.1} create gesture",
                        rect.width(),
                        rect.height()
                    );
                }
                true
            }
            Gesture::Moving { index, .. } | Gesture::Resizing { index, .. } => {
                log::debug!("finished editing box {index}");
                true
            }
        }
    }

    /// Ignored while a gesture is in progress.
    fn delete(&mut self) -> bool {
        if self.gesture != Gesture::Idle {
            return false;
        }
        let removed = match self.selected.take() {
            Some(index) => self.store.remove(index),
            None => self.store.remove_last(),
        };
        removed.is_some()
    }

    /// Normalized rectangle spanning `a` and `b`, clipped to the image.
    fn clip(&self, a: Point, b: Point) -> Rect {
        let bounds = self.store.bounds();
        let rect = Rect::from_points(a, b);
        Rect::new(
            rect.x0.clamp(bounds.x0, bounds.x1),
            rect.y0.clamp(bounds.y0, bounds.y1),
            rect.x1.clamp(bounds.x0, bounds.x1),
            rect.y1.clamp(bounds.y0, bounds.y1),
        )
    }
}
