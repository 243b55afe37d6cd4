#![forbid(unsafe_code)]

//! Click-vs-drag disambiguation.
//!
//! A pointer press is *pending* until the pointer travels at least
//! [`GestureConfig::drag_threshold`] pixels from where it went down. Only then
//! does it become a drag; releasing earlier is a click.
//!
//! # Invariants
//!
//! 1. A tracker never reports `Promoted` twice for one press.
//! 2. Drag and click never both resolve for the same press: once promoted,
//!    [`PressTracker::release`] reports [`PressResolution::DragEnd`].
//! 3. Movement below the threshold leaves the tracker pending, however many
//!    move events arrive.

use crate::geometry::Point;

/// Default drag activation distance in pixels.
pub const DEFAULT_DRAG_THRESHOLD: f64 = 3.0;

/// Default width of the resize-handle band along block edges, in pixels.
pub const DEFAULT_RESIZE_HANDLE_SIZE: f64 = 8.0;

/// Thresholds for gesture recognition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Minimum euclidean distance (px) before a press becomes a drag (default: 3).
    pub drag_threshold: f64,
    /// Band width (px) along a block's edges that counts as a resize handle
    /// (default: 8).
    pub resize_handle_size: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            drag_threshold: DEFAULT_DRAG_THRESHOLD,
            resize_handle_size: DEFAULT_RESIZE_HANDLE_SIZE,
        }
    }
}

/// Whether `current` is far enough from `origin` to start a drag.
#[inline]
#[must_use]
pub fn crossed_drag_threshold(origin: Point, current: Point, threshold: f64) -> bool {
    origin.distance(current) >= threshold
}

/// Progress reported for one pointer move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PressProgress {
    /// Still below the threshold.
    Pending,
    /// This move crossed the threshold; the drag starts now.
    Promoted {
        origin: Point,
        current: Point,
    },
    /// Already dragging; pointer moved.
    Moving {
        previous: Point,
        current: Point,
    },
}

/// How a press ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PressResolution {
    /// Released before the threshold.
    Click { position: Point },
    /// Released after a drag started.
    DragEnd { origin: Point, end: Point },
}

/// Tracks one pointer press from down to up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressTracker {
    pointer_id: u32,
    origin: Point,
    last: Point,
    promoted: bool,
    threshold: f64,
}

impl PressTracker {
    /// Begin tracking a press.
    #[must_use]
    pub fn new(pointer_id: u32, origin: Point, threshold: f64) -> Self {
        Self {
            pointer_id,
            origin,
            last: origin,
            promoted: false,
            threshold: threshold.max(0.0),
        }
    }

    /// Pointer that owns the press.
    #[must_use]
    pub const fn pointer_id(&self) -> u32 {
        self.pointer_id
    }

    /// Where the press started.
    #[must_use]
    pub const fn origin(&self) -> Point {
        self.origin
    }

    /// Most recent pointer position.
    #[must_use]
    pub const fn last(&self) -> Point {
        self.last
    }

    /// Whether the press has become a drag.
    #[must_use]
    pub const fn is_promoted(&self) -> bool {
        self.promoted
    }

    /// Feed one pointer move.
    pub fn update(&mut self, current: Point) -> PressProgress {
        let previous = self.last;
        self.last = current;
        if self.promoted {
            return PressProgress::Moving { previous, current };
        }
        if crossed_drag_threshold(self.origin, current, self.threshold) {
            self.promoted = true;
            PressProgress::Promoted {
                origin: self.origin,
                current,
            }
        } else {
            PressProgress::Pending
        }
    }

    /// Resolve the press on pointer-up.
    #[must_use]
    pub fn release(self, position: Point) -> PressResolution {
        if self.promoted {
            PressResolution::DragEnd {
                origin: self.origin,
                end: position,
            }
        } else {
            PressResolution::Click { position }
        }
    }
}
