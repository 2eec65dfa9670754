use crate::config::ViewportConfig;
use coursegraph_core::{Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// World-to-screen mapping: `screen = world * scale + translation`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub scale: f32,
    pub translation: Vec2,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translation: Vec2::ZERO,
        }
    }
}

impl ViewTransform {
    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        world * self.scale + self.translation
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        (screen - self.translation) * (1.0 / self.scale)
    }

    fn lerp(&self, to: &ViewTransform, t: f32) -> ViewTransform {
        ViewTransform {
            scale: self.scale + (to.scale - self.scale) * t,
            translation: self.translation + (to.translation - self.translation) * t,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    from: ViewTransform,
    to: ViewTransform,
    elapsed: Duration,
    duration: Duration,
}

/// Owns the zoom/pan state of the navigator view.
#[derive(Debug, Clone)]
pub struct ViewportController {
    config: ViewportConfig,
    size: Vec2,
    transform: ViewTransform,
    transition: Option<Transition>,
}

impl ViewportController {
    pub fn new(config: ViewportConfig, size: Vec2) -> Self {
        Self {
            config,
            size,
            transform: ViewTransform::default(),
            transition: None,
        }
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    /// Where the view will settle once any running transition finishes.
    pub fn target(&self) -> ViewTransform {
        self.transition.map_or(self.transform, |t| t.to)
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn set_size(&mut self, size: Vec2) {
        self.size = size;
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    fn clamp_scale(&self, scale: f32) -> f32 {
        scale.clamp(self.config.min_scale, self.config.max_scale)
    }

    /// Centre `bounds` in the viewport with the configured margin. Applied
    /// immediately.
    pub fn fit_to_bounds(&mut self, bounds: Rect) {
        self.transition = None;
        let center = self.size * 0.5;
        if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            self.transform = ViewTransform {
                scale: 1.0,
                translation: center,
            };
            return;
        }

        let margin = self.config.fit_margin;
        let available_w = (self.size.x - 2.0 * margin).max(1.0);
        let available_h = (self.size.y - 2.0 * margin).max(1.0);
        let scale = self.clamp_scale((available_w / bounds.width()).min(available_h / bounds.height()));
        self.transform = ViewTransform {
            scale,
            translation: center - bounds.center() * scale,
        };
        tracing::debug!(scale, "fit view to bounds");
    }

    /// Multiply the scale by `factor` around the viewport centre, animating
    /// towards the result. Repeated calls compound on the pending target.
    pub fn zoom_by(&mut self, factor: f32) {
        let from = self.transform;
        let base = self.target();
        let center = self.size * 0.5;
        let anchor = base.screen_to_world(center);
        let scale = self.clamp_scale(base.scale * factor);
        let to = ViewTransform {
            scale,
            translation: center - anchor * scale,
        };

        let duration = self.config.animation();
        if duration.is_zero() {
            self.transform = to;
            self.transition = None;
        } else {
            self.transition = Some(Transition {
                from,
                to,
                elapsed: Duration::ZERO,
                duration,
            });
        }
    }

    pub fn zoom_in(&mut self) {
        self.zoom_by(self.config.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_by(1.0 / self.config.zoom_step);
    }

    /// Advance a running transition. Returns `true` while still animating.
    pub fn tick(&mut self, dt: Duration) -> bool {
        let Some(mut transition) = self.transition else {
            return false;
        };
        transition.elapsed += dt;
        if transition.elapsed >= transition.duration {
            self.transform = transition.to;
            self.transition = None;
            return false;
        }

        let t = transition.elapsed.as_secs_f32() / transition.duration.as_secs_f32();
        let eased = t * t * (3.0 - 2.0 * t);
        self.transform = transition.from.lerp(&transition.to, eased);
        self.transition = Some(transition);
        true
    }

    /// Wheel/pinch zoom keeping the world point under `screen_point` fixed.
    pub fn zoom_at(&mut self, screen_point: Vec2, factor: f32) {
        self.transition = None;
        let anchor = self.transform.screen_to_world(screen_point);
        let scale = self.clamp_scale(self.transform.scale * factor);
        self.transform = ViewTransform {
            scale,
            translation: screen_point - anchor * scale,
        };
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.transition = None;
        self.transform.translation = self.transform.translation + delta;
    }

    pub fn restore(&mut self, transform: ViewTransform) {
        self.transition = None;
        self.transform = transform;
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        self.transform.world_to_screen(world)
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        self.transform.screen_to_world(screen)
    }

    /// Visible region in world coordinates.
    pub fn visible_world_rect(&self) -> Rect {
        Rect::from_min_max(
            self.screen_to_world(Vec2::ZERO),
            self.screen_to_world(self.size),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn controller() -> ViewportController {
        ViewportController::new(ViewportConfig::default(), Vec2::new(800.0, 600.0))
    }

    fn close(a: Vec2, b: Vec2) -> bool {
        (a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3
    }

    #[test]
    fn test_fit_centres_bounds_with_margin() {
        let mut view = controller();
        let bounds = Rect::from_min_max(Vec2::new(0.0, 0.0), Vec2::new(376.0, 100.0));
        view.fit_to_bounds(bounds);

        let t = view.transform();
        assert!((t.scale - 2.0).abs() < 1e-4);
        assert!(close(view.world_to_screen(bounds.center()), Vec2::new(400.0, 300.0)));
        assert!(close(view.world_to_screen(bounds.min), Vec2::new(24.0, 200.0)));
    }

    #[test]
    fn test_fit_clamps_tiny_scale() {
        let mut view = controller();
        view.fit_to_bounds(Rect::from_min_max(Vec2::ZERO, Vec2::new(100_000.0, 10.0)));
        assert_eq!(view.transform().scale, 0.1);
    }

    #[test]
    fn test_fit_empty_bounds_centres_origin() {
        let mut view = controller();
        view.fit_to_bounds(Rect::NOTHING);
        assert!(close(view.world_to_screen(Vec2::ZERO), Vec2::new(400.0, 300.0)));
    }

    #[test]
    fn test_zoom_by_animates_to_target() {
        let mut view = controller();
        view.zoom_by(2.0);
        assert!(view.is_animating());
        assert_eq!(view.transform().scale, 1.0);
        assert_eq!(view.target().scale, 2.0);

        assert!(view.tick(Duration::from_millis(100)));
        let mid = view.transform().scale;
        assert!(mid > 1.0 && mid < 2.0);

        assert!(!view.tick(Duration::from_millis(150)));
        assert_eq!(view.transform().scale, 2.0);
        assert!(!view.is_animating());
    }

    #[test]
    fn test_zoom_by_keeps_centre_fixed() {
        let mut view = controller();
        view.pan_by(Vec2::new(30.0, -10.0));
        let center = Vec2::new(400.0, 300.0);
        let before = view.screen_to_world(center);
        view.zoom_by(1.5);
        view.tick(Duration::from_secs(1));
        assert!(close(view.screen_to_world(center), before));
    }

    #[test]
    fn test_visible_rect_follows_pan_and_scale() {
        let mut view = controller();
        assert_eq!(
            view.visible_world_rect(),
            Rect::from_min_max(Vec2::ZERO, Vec2::new(800.0, 600.0))
        );

        view.pan_by(Vec2::new(100.0, 0.0));
        view.zoom_at(Vec2::new(100.0, 0.0), 2.0);
        let visible = view.visible_world_rect();
        assert!(close(visible.min, Vec2::new(-50.0, 0.0)));
        assert!(close(visible.max, Vec2::new(350.0, 300.0)));
    }

    #[test]
    fn test_gestures_cancel_transition() {
        let mut view = controller();
        view.zoom_by(3.0);
        view.pan_by(Vec2::new(5.0, 5.0));
        assert!(!view.is_animating());
        assert_eq!(view.transform().scale, 1.0);
        assert_eq!(view.transform().translation, Vec2::new(5.0, 5.0));
    }

    #[test]
    fn test_zoom_at_keeps_point_under_cursor() {
        let mut view = controller();
        let cursor = Vec2::new(120.0, 80.0);
        let before = view.screen_to_world(cursor);
        view.zoom_at(cursor, 1.15);
        assert!(close(view.screen_to_world(cursor), before));
    }

    #[test]
    fn test_zero_duration_applies_immediately() {
        let config = ViewportConfig {
            animation_ms: 0,
            ..Default::default()
        };
        let mut view = ViewportController::new(config, Vec2::new(100.0, 100.0));
        view.zoom_in();
        assert!(!view.is_animating());
        assert!((view.transform().scale - 1.15).abs() < 1e-5);
    }

    proptest! {
        #[test]
        fn test_scale_stays_in_range(factors in prop::collection::vec(0.01f32..50.0, 1..20)) {
            let mut view = controller();
            for (i, factor) in factors.iter().enumerate() {
                if i % 2 == 0 {
                    view.zoom_by(*factor);
                    view.tick(Duration::from_millis(50));
                } else {
                    view.zoom_at(Vec2::new(10.0, 10.0), *factor);
                }
                let scale = view.transform().scale;
                prop_assert!((0.1..=4.0).contains(&scale));
                prop_assert!((0.1..=4.0).contains(&view.target().scale));
            }
        }
    }
}
