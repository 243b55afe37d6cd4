#![forbid(unsafe_code)]

//! FLIP transitions and the visual surface seam.
//!
//! The board never draws. It tells a [`VisualSurface`] where each block's box
//! is and which transform to show on top of it. Structural changes are
//! animated with First-Last-Invert-Play:
//!
//! ```text
//! first = surface.measure(id)      box as currently shown
//! apply change; surface.place(id, last)
//! invert = VisualTransform::invert(first, last)
//! play: transform eases from invert to identity
//! ```
//!
//! # Invariants
//!
//! 1. Board state already holds final values when a track starts; a
//!    transform is cosmetic and never read back by layout code.
//! 2. At most one track per block. Starting a new track replaces the old
//!    one, and because `measure` includes the live transform the new track
//!    starts from where the block is currently shown.
//! 3. A finished or cancelled track leaves the identity transform behind.
//!
//! # Failure Modes
//!
//! - Zero duration: no track is created; the identity transform is set
//!   immediately.
//! - Zero-sized `last` box: scale components fall back to 1.0.

use blockgrid_core::geometry::PixelRect;
use blockgrid_layout::BlockId;
use rustc_hash::FxHashMap;
use web_time::{Duration, Instant};

/// Easing curve over normalized time `0.0..=1.0`.
pub type EasingFn = fn(f64) -> f64;

#[must_use]
pub fn linear(t: f64) -> f64 {
    t
}

#[must_use]
pub fn ease_out_cubic(t: f64) -> f64 {
    let inv = 1.0 - t;
    1.0 - inv * inv * inv
}

#[must_use]
pub fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let k = -2.0 * t + 2.0;
        1.0 - k * k * k / 2.0
    }
}

/// Translate-then-scale transform anchored at a box's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualTransform {
    pub translate_x: f64,
    pub translate_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for VisualTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl VisualTransform {
    pub const IDENTITY: Self = Self {
        translate_x: 0.0,
        translate_y: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
    };

    #[must_use]
    pub const fn translate(dx: f64, dy: f64) -> Self {
        Self {
            translate_x: dx,
            translate_y: dy,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    /// Transform that makes a box laid out at `last` appear at `first`.
    #[must_use]
    pub fn invert(first: &PixelRect, last: &PixelRect) -> Self {
        let ratio = |a: f64, b: f64| if b > 0.0 { a / b } else { 1.0 };
        Self {
            translate_x: first.x - last.x,
            translate_y: first.y - last.y,
            scale_x: ratio(first.width, last.width),
            scale_y: ratio(first.height, last.height),
        }
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Interpolate from `self` toward identity; `t = 1.0` is identity.
    #[must_use]
    pub fn toward_identity(&self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |from: f64, to: f64| from + (to - from) * t;
        Self {
            translate_x: mix(self.translate_x, 0.0),
            translate_y: mix(self.translate_y, 0.0),
            scale_x: mix(self.scale_x, 1.0),
            scale_y: mix(self.scale_y, 1.0),
        }
    }

    /// Box shown for a layout box under this transform.
    #[must_use]
    pub fn apply(&self, rect: &PixelRect) -> PixelRect {
        PixelRect::new(
            rect.x + self.translate_x,
            rect.y + self.translate_y,
            rect.width * self.scale_x,
            rect.height * self.scale_y,
        )
    }
}

/// Host adapter for whatever draws the blocks.
pub trait VisualSurface {
    /// Box currently shown for `id`, transform included.
    fn measure(&self, id: &BlockId) -> Option<PixelRect>;

    /// Set the layout box for `id`, creating its element if needed.
    fn place(&mut self, id: &BlockId, rect: PixelRect);

    fn set_transform(&mut self, id: &BlockId, transform: VisualTransform);

    /// Live transform for `id`.
    fn transform(&self, id: &BlockId) -> VisualTransform;

    fn remove(&mut self, id: &BlockId);

    /// Ask the host to call `Board::tick` on its next paint frame.
    fn request_frame(&mut self);
}

/// In-memory surface that records boxes and transforms.
#[derive(Debug, Clone, Default)]
pub struct LayoutSurface {
    rects: FxHashMap<BlockId, PixelRect>,
    transforms: FxHashMap<BlockId, VisualTransform>,
    frames_requested: u64,
}

impl LayoutSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout box without the transform.
    pub fn rect(&self, id: &BlockId) -> Option<PixelRect> {
        self.rects.get(id).copied()
    }

    #[inline]
    pub const fn frames_requested(&self) -> u64 {
        self.frames_requested
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }
}

impl VisualSurface for LayoutSurface {
    fn measure(&self, id: &BlockId) -> Option<PixelRect> {
        let rect = self.rects.get(id)?;
        Some(self.transform(id).apply(rect))
    }

    fn place(&mut self, id: &BlockId, rect: PixelRect) {
        self.rects.insert(id.clone(), rect);
    }

    fn set_transform(&mut self, id: &BlockId, transform: VisualTransform) {
        if transform.is_identity() {
            self.transforms.remove(id);
        } else {
            self.transforms.insert(id.clone(), transform);
        }
    }

    fn transform(&self, id: &BlockId) -> VisualTransform {
        self.transforms.get(id).copied().unwrap_or_default()
    }

    fn remove(&mut self, id: &BlockId) {
        self.rects.remove(id);
        self.transforms.remove(id);
    }

    fn request_frame(&mut self) {
        self.frames_requested = self.frames_requested.saturating_add(1);
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FlipTrack {
    block_id: BlockId,
    from: VisualTransform,
    started: Instant,
}

/// Plays inverted transforms back to identity over a fixed duration.
#[derive(Debug, Clone)]
pub struct FlipAnimator {
    tracks: Vec<FlipTrack>,
    duration: Duration,
    easing: EasingFn,
}

impl FlipAnimator {
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self {
            tracks: Vec::new(),
            duration,
            easing: ease_out_cubic,
        }
    }

    #[must_use]
    pub fn with_easing(mut self, easing: EasingFn) -> Self {
        self.easing = easing;
        self
    }

    #[inline]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    /// Start (or restart) a track for `id` from `from` toward identity.
    pub fn start(
        &mut self,
        id: &BlockId,
        from: VisualTransform,
        now: Instant,
        surface: &mut dyn VisualSurface,
    ) {
        self.tracks.retain(|track| &track.block_id != id);
        if self.duration.is_zero() || from.is_identity() {
            surface.set_transform(id, VisualTransform::IDENTITY);
            return;
        }
        surface.set_transform(id, from);
        self.tracks.push(FlipTrack {
            block_id: id.clone(),
            from,
            started: now,
        });
        surface.request_frame();
    }

    /// Advance every track to `now`. Returns the number still running.
    pub fn tick(&mut self, now: Instant, surface: &mut dyn VisualSurface) -> usize {
        let duration = self.duration.as_secs_f64().max(f64::EPSILON);
        let easing = self.easing;
        self.tracks.retain(|track| {
            let elapsed = now.saturating_duration_since(track.started).as_secs_f64();
            let progress = (elapsed / duration).min(1.0);
            let transform = track.from.toward_identity(easing(progress));
            if progress >= 1.0 {
                surface.set_transform(&track.block_id, VisualTransform::IDENTITY);
                false
            } else {
                surface.set_transform(&track.block_id, transform);
                true
            }
        });
        if !self.tracks.is_empty() {
            surface.request_frame();
        }
        self.tracks.len()
    }

    /// Stop the track for `id`, snapping to identity.
    pub fn cancel(&mut self, id: &BlockId, surface: &mut dyn VisualSurface) {
        let before = self.tracks.len();
        self.tracks.retain(|track| &track.block_id != id);
        if self.tracks.len() != before {
            surface.set_transform(id, VisualTransform::IDENTITY);
        }
    }

    /// Drop the track for a block that no longer exists.
    pub(crate) fn forget(&mut self, id: &BlockId) {
        self.tracks.retain(|track| &track.block_id != id);
    }

    /// Snap every running track to its end state.
    pub fn finish_all(&mut self, surface: &mut dyn VisualSurface) {
        for track in self.tracks.drain(..) {
            surface.set_transform(&track.block_id, VisualTransform::IDENTITY);
        }
    }

    pub fn is_animating(&self, id: &BlockId) -> bool {
        self.tracks.iter().any(|track| &track.block_id == id)
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.tracks.len()
    }
}
