//! Pan and zoom gestures over the shared `ViewTransform`.
//!
//! Pinch state is an explicit session value owned here, created on
//! `pinch_start` and dropped on `pinch_end`.

use crate::config::EditorConfig;
use crate::input::Modifiers;
use nc_core::geometry::{Point, ViewTransform};

#[derive(Debug, Clone, Copy, PartialEq)]
struct PinchSession {
    distance: f64,
    midpoint: Point,
}

/// View transform plus in-flight pinch state.
#[derive(Debug, Clone, Default)]
pub struct Viewport {
    view: ViewTransform,
    pinch: Option<PinchSession>,
}

impl Viewport {
    pub fn new(view: ViewTransform) -> Self {
        Self { view, pinch: None }
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn set_view(&mut self, view: ViewTransform) {
        self.view = view;
    }

    pub fn screen_to_canvas(&self, p: Point) -> Point {
        self.view.screen_to_canvas(p)
    }

    /// Wheel/trackpad scroll. With the command modifier held it zooms
    /// about the cursor; otherwise it pans by `-delta`.
    pub fn wheel(&mut self, cursor: Point, delta: Point, modifiers: Modifiers, cfg: &EditorConfig) {
        if !delta.is_finite() {
            log::warn!("ignoring non-finite wheel delta {delta:?}");
            return;
        }
        if modifiers.command() {
            let factor = (-delta.y * cfg.wheel_zoom_sensitivity).exp();
            let target = cfg.clamp_scale(self.view.scale() * factor);
            self.view.zoom_at(cursor, target);
            log::trace!("wheel zoom to {:.3}", self.view.scale());
        } else {
            self.view.pan_by_wheel(delta);
        }
    }

    /// Keyboard zoom in/out, recentred on `center`.
    pub fn zoom_step(&mut self, center: Point, zoom_in: bool, cfg: &EditorConfig) {
        let factor = if zoom_in { cfg.zoom_step } else { 1.0 / cfg.zoom_step };
        self.view.zoom_at(center, cfg.clamp_scale(self.view.scale() * factor));
    }

    pub fn reset_zoom(&mut self) {
        self.view = ViewTransform::default();
    }

    pub fn pinch_start(&mut self, a: Point, b: Point) {
        if !a.is_finite() || !b.is_finite() {
            return;
        }
        self.pinch = Some(PinchSession {
            distance: a.distance(b),
            midpoint: a.midpoint(b),
        });
    }

    /// Scale by the change in finger distance about the new midpoint,
    /// then pan by how far the midpoint itself travelled.
    pub fn pinch_move(&mut self, a: Point, b: Point, cfg: &EditorConfig) {
        let Some(session) = self.pinch else {
            self.pinch_start(a, b);
            return;
        };
        if !a.is_finite() || !b.is_finite() {
            return;
        }
        let distance = a.distance(b);
        let midpoint = a.midpoint(b);
        if session.distance > 0.0 && distance > 0.0 {
            let target = cfg.clamp_scale(self.view.scale() * distance / session.distance);
            self.view.zoom_at(midpoint, target);
        }
        self.view.pan_by(midpoint - session.midpoint);
        self.pinch = Some(PinchSession { distance, midpoint });
    }

    pub fn pinch_end(&mut self) {
        self.pinch = None;
    }

    pub fn is_pinching(&self) -> bool {
        self.pinch.is_some()
    }
}
