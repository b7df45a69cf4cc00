// viewer.rs — 导览查看器根对象：把输入、热点、切换、模式、自动导览串起来
//
// Single-threaded and tick driven. The shell forwards window events and calls
// `tick` once per frame, then reads `frame()` to render and drains events to
// drive the image loader and renderer.

use glam::Vec2;

use crate::autotour::AutoTour;
use crate::camera::Camera;
use crate::config::ViewerConfig;
use crate::events::{EventBus, ImageOutcome, Stamped, StopReason, ViewerEvent};
use crate::hotspot::{HitTester, HoverChange, Marker};
use crate::input::{DeviceSample, InputController, Release};
use crate::mode::{Mode, ModeManager, MotionSensor, Presentation, Switch};
use crate::orientation::{clamp_pitch, Orientation};
use crate::tour::{Scene, TourGraph, ViewAngles};
use crate::transition::{Step, TransitionDirector};

/// Who asked for a scene change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOrigin {
    User,
    AutoTour(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub position: Vec2,
}

/// Read-only snapshot of everything the renderer and overlay need.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    /// 0 = panorama fully visible, 1 = black.
    pub veil: f32,
    pub mode: Mode,
    pub scene: usize,
    /// Size of one eye's viewport (the whole window outside vr).
    pub eye: Vec2,
    pub markers: Vec<Marker>,
    pub label: Option<Label>,
    /// Gaze fuse progress for the reticle; `None` outside gyro/vr.
    pub reticle: Option<f32>,
    pub blending: bool,
    pub auto_tour: bool,
    pub permission_denied: bool,
}

pub struct TourViewer {
    tour: TourGraph,
    cfg: ViewerConfig,
    orientation: Orientation,
    input: InputController,
    hits: HitTester,
    director: TransitionDirector,
    modes: ModeManager,
    auto_tour: AutoTour,
    bus: EventBus,
    fov: f32,
    sensitivity: f32,
    viewport: Vec2,
    /// Last head pose reported in gyro/vr.
    head: DeviceSample,
}

impl TourViewer {
    /// Build a viewer on the first scene. The first panorama is requested
    /// immediately and revealed from black.
    pub fn new(tour: TourGraph, cfg: ViewerConfig) -> Self {
        Self::build(tour, cfg, 0)
    }

    /// Build a viewer that takes over from `previous` (a freshly opened
    /// tour). Its transition tokens carry on from the old viewer's, so a
    /// late result for an old load can't be mistaken for a new one.
    pub fn succeeding(previous: &TourViewer, tour: TourGraph, cfg: ViewerConfig) -> Self {
        Self::build(tour, cfg, previous.director.last_token())
    }

    fn build(tour: TourGraph, cfg: ViewerConfig, last_token: u64) -> Self {
        let first = tour.scene_at(0).map(Scene::entry_view).unwrap_or_default();
        let mut viewer = Self {
            orientation: Orientation::new(first),
            input: InputController::new(cfg.input),
            hits: HitTester::new(cfg.hotspots),
            director: TransitionDirector::new(cfg.transition).resume_after(last_token),
            modes: ModeManager::new(tour.len()),
            auto_tour: AutoTour::new(cfg.auto_tour),
            bus: EventBus::new(),
            fov: cfg.view.fov,
            sensitivity: cfg.view.sensitivity,
            viewport: Vec2::new(1280.0, 720.0),
            head: DeviceSample::default(),
            tour,
            cfg,
        };
        viewer.rebuild_hotspots(0);
        viewer.input.freeze(&mut viewer.orientation);
        let started = viewer.director.reveal(0, first);
        viewer.announce_start(started.token, 0);
        viewer
    }

    // ---- accessors ----

    pub fn tour(&self) -> &TourGraph {
        &self.tour
    }

    pub fn mode(&self) -> Mode {
        self.modes.mode()
    }

    pub fn current_scene(&self) -> usize {
        self.modes.current_scene()
    }

    pub fn current_scene_id(&self) -> &str {
        self.tour
            .scene_at(self.current_scene())
            .map(|s| s.id.as_str())
            .unwrap_or_default()
    }

    pub fn orientation(&self) -> &Orientation {
        &self.orientation
    }

    pub fn is_blending(&self) -> bool {
        self.director.is_blending()
    }

    /// Scene being blended to, if any.
    pub fn pending_scene(&self) -> Option<usize> {
        self.director.target()
    }

    pub fn auto_tour_enabled(&self) -> bool {
        self.auto_tour.is_enabled()
    }

    pub fn permission_denied(&self) -> bool {
        self.modes.permission_denied()
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn set_sensitivity(&mut self, s: f32) {
        self.sensitivity = s.clamp(0.1, 5.0);
    }

    pub fn events(&self) -> &[Stamped] {
        self.bus.events()
    }

    pub fn drain_events(&mut self) -> Vec<Stamped> {
        self.bus.drain()
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.viewport = Vec2::new(width, height);
        }
    }

    fn eye_viewport(&self) -> Vec2 {
        if self.mode().is_stereo() {
            Vec2::new(self.viewport.x * 0.5, self.viewport.y)
        } else {
            self.viewport
        }
    }

    pub fn camera(&self) -> Camera {
        let eye = self.eye_viewport();
        Camera::new(
            self.orientation.yaw(),
            self.orientation.pitch(),
            self.fov,
            eye.x / eye.y.max(1.0),
        )
    }

    // ---- pointer / touch ----

    pub fn pointer_pressed(&mut self, x: f32, y: f32, now: f64) {
        if self.director.is_blending() {
            return;
        }
        self.stop_tour(StopReason::UserInput);
        self.input.press(Vec2::new(x, y), now, &mut self.orientation);
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32, now: f64) {
        if self.mode() != Mode::Normal {
            return;
        }
        let camera = self.camera();
        let eye = self.eye_viewport();
        self.input.motion(
            Vec2::new(x, y),
            now,
            &camera,
            eye,
            self.sensitivity,
            &mut self.orientation,
        );
    }

    pub fn pointer_released(&mut self, now: f64) {
        if let Release::Click(pos) = self.input.release(now, &mut self.orientation) {
            if self.mode() == Mode::Normal {
                self.select_at(pos.x, pos.y);
            } else {
                self.select_center();
            }
        }
    }

    pub fn pointer_left(&mut self) {
        self.input.leave();
        self.set_hover(None);
    }

    pub fn zoom(&mut self, scroll: f32) {
        let v = self.cfg.view;
        self.fov = (self.fov - scroll * 2.5).clamp(v.min_fov, v.max_fov);
    }

    pub fn reset_view(&mut self) {
        if self.director.is_blending() {
            return;
        }
        let view = self.current_entry_view();
        self.orientation.set_view(view);
        self.orientation.clear_velocity();
        self.fov = self.cfg.view.fov;
    }

    pub fn device_orientation(&mut self, sample: DeviceSample) {
        // The tour owns yaw while it runs (vr keeps it enabled).
        if !self.mode().uses_motion() {
            return;
        }
        self.head = sample;
        if self.auto_tour.is_enabled() {
            return;
        }
        let forward = self.current_entry_view();
        self.input.device_sample(sample, forward, &mut self.orientation);
    }

    // ---- selection / navigation ----

    /// Select whatever hotspot lies under a screen point.
    pub fn select_at(&mut self, x: f32, y: f32) -> bool {
        if self.director.is_blending() {
            log::debug!("selection ignored during transition");
            return false;
        }
        let eye = self.eye_viewport();
        let ray = self.camera().ray_through_pixel(x, y, eye.x, eye.y);
        match self.hits.pick(&ray) {
            Some(i) => self.activate_hotspot(i),
            None => false,
        }
    }

    /// Select whatever hotspot lies under the centre reticle.
    pub fn select_center(&mut self) -> bool {
        if self.director.is_blending() {
            return false;
        }
        let ray = self.camera().center_ray();
        match self.hits.pick(&ray) {
            Some(i) => self.activate_hotspot(i),
            None => false,
        }
    }

    fn activate_hotspot(&mut self, index: usize) -> bool {
        let Some(target) = self.hits.target(index) else {
            return false;
        };
        let id = target.hotspot.target_scene_id.clone();
        self.navigate_to_id(&id, NavigationOrigin::User)
    }

    pub fn navigate_to_id(&mut self, id: &str, origin: NavigationOrigin) -> bool {
        match self.tour.index_of(id) {
            Some(index) => self.navigate_to_index(index, origin),
            None => {
                log::warn!("hotspot target `{id}` does not exist, ignoring");
                self.bus.emit(ViewerEvent::NavigationIgnored {
                    target: id.to_string(),
                });
                false
            }
        }
    }

    pub fn navigate_to_index(&mut self, index: usize, origin: NavigationOrigin) -> bool {
        let Some(scene) = self.tour.scene_at(index) else {
            log::warn!("scene index {index} out of range");
            return false;
        };
        let entry = scene.entry_view();

        match origin {
            NavigationOrigin::User => self.stop_tour(StopReason::UserInput),
            NavigationOrigin::AutoTour(token) => {
                if !self.auto_tour.is_current(token) {
                    log::debug!("dropping stale auto tour step");
                    return false;
                }
            }
        }
        let goal = self.settled_view(entry);

        let from = self.orientation.view();
        self.input.freeze(&mut self.orientation);
        self.set_hover(None);

        let started = self.director.begin(index, from, goal);
        if let Some(old) = started.superseded {
            log::info!("transition {old} superseded by {}", started.token);
            self.bus.emit(ViewerEvent::TransitionCancelled { token: old });
            self.bus.emit(ViewerEvent::LoadCancelled { token: old });
        }
        self.announce_start(started.token, index);
        true
    }

    fn announce_start(&mut self, token: u64, index: usize) {
        let Some(scene) = self.tour.scene_at(index) else {
            return;
        };
        let path = self.tour.image_path(scene);
        log::info!("-> {} ({})", scene.id, scene.title);
        self.bus.emit(ViewerEvent::TransitionStarted {
            token,
            target: index,
        });
        self.bus.emit(ViewerEvent::LoadRequested { token, path });
    }

    fn nav_base(&self) -> usize {
        self.director.target().unwrap_or_else(|| self.current_scene())
    }

    pub fn next_scene(&mut self) -> bool {
        let i = self.tour.next_index(self.nav_base());
        self.navigate_to_index(i, NavigationOrigin::User)
    }

    pub fn previous_scene(&mut self) -> bool {
        let i = self.tour.previous_index(self.nav_base());
        self.navigate_to_index(i, NavigationOrigin::User)
    }

    /// Report the outcome of a panorama load started by `LoadRequested`.
    /// Returns false when the token is stale and the image should be dropped.
    pub fn image_loaded(&mut self, token: u64, ok: bool) -> bool {
        let outcome = if ok {
            ImageOutcome::Loaded
        } else {
            ImageOutcome::Failed
        };
        self.director.image_resolved(token, outcome)
    }

    // ---- modes / auto tour ----

    pub fn switch_mode(
        &mut self,
        requested: Mode,
        motion: &mut dyn MotionSensor,
        presentation: &mut dyn Presentation,
    ) -> Switch {
        let before = self.mode();
        let result = self
            .modes
            .switch_mode(requested, motion, presentation, &mut self.bus);
        self.after_mode_change(before);
        result
    }

    pub fn permission_resolved(
        &mut self,
        granted: bool,
        motion: &mut dyn MotionSensor,
    ) -> Option<Switch> {
        let before = self.mode();
        let result = self.modes.permission_resolved(granted, motion, &mut self.bus);
        self.after_mode_change(before);
        result
    }

    fn after_mode_change(&mut self, before: Mode) {
        let now = self.mode();
        if now == before {
            return;
        }
        if now == Mode::Gyro {
            self.stop_tour(StopReason::ModeChanged);
        }
        self.head = DeviceSample::default();
        self.input.leave();
        self.orientation.clear_velocity();
        self.set_hover(None);
    }

    pub fn set_auto_tour(&mut self, enabled: bool) -> bool {
        if enabled {
            self
                .auto_tour
                .enable(self.mode(), self.director.target(), &mut self.bus)
        } else {
            self.auto_tour.disable(StopReason::Toggled, &mut self.bus);
            false
        }
    }

    pub fn toggle_auto_tour(&mut self) -> bool {
        let on = !self.auto_tour.is_enabled();
        self.set_auto_tour(on)
    }

    fn stop_tour(&mut self, reason: StopReason) {
        self.auto_tour.disable(reason, &mut self.bus);
    }

    // ---- per frame ----

    pub fn tick(&mut self, dt: f32) {
        let dt = dt.clamp(0.0, 0.25);
        self.bus.begin_frame();

        match self.director.tick(dt) {
            Step::Nothing => {}
            Step::Swap { token, image } => {
                if image != ImageOutcome::Loaded {
                    log::warn!("transition {token} continues without its panorama ({image:?})");
                }
                self.bus.emit(ViewerEvent::PanoramaSwap { token, image });
            }
            Step::Finished { token, target } => self.finish_transition(token, target),
        }

        // Holds at WaitingForIdle while a blend runs.
        let advance = self.auto_tour.tick(
            dt,
            self.director.is_blending(),
            &mut self.orientation,
            self.modes.current_scene(),
            self.tour.len(),
        );

        if let Some(view) = self.director.view() {
            self.orientation.set_view(view);
            return;
        }

        if let Some(step) = advance {
            self.navigate_to_index(step.to, NavigationOrigin::AutoTour(step.token));
            return;
        }

        if self.mode() == Mode::Normal && !self.input.is_pressed() {
            let c = self.cfg.input;
            self.orientation.glide(dt, c.friction, c.rest_speed);
        }

        self.update_hover(dt);
    }

    fn finish_transition(&mut self, token: u64, target: usize) {
        let id = self
            .tour
            .scene_at(target)
            .map(|s| s.id.clone())
            .unwrap_or_default();
        let index = self.modes.set_current_scene(target, &id, &mut self.bus);
        self.rebuild_hotspots(index);
        let view = self.settled_view(self.current_entry_view());
        self.orientation.set_view(view);
        self.input.unfreeze();
        self.bus.emit(ViewerEvent::TransitionFinished {
            token,
            target: index,
        });
        self.auto_tour.on_scene_changed(index, &mut self.bus);
    }

    fn rebuild_hotspots(&mut self, index: usize) {
        let synthetic = self
            .tour
            .scene_at(index)
            .map(|s| s.hotspots.is_empty())
            .unwrap_or(false);
        let hotspots = self.tour.hotspots_at(index).into_owned();
        self.hits.rebuild(&hotspots, synthetic);
    }

    fn current_entry_view(&self) -> ViewAngles {
        self.tour
            .scene_at(self.current_scene())
            .map(Scene::entry_view)
            .unwrap_or_default()
    }

    /// Where the camera rests in a scene whose forward view is `entry`: with
    /// head tracking live, the last head pose is added on top so the first
    /// sample after a blend lands where the blend ended.
    fn settled_view(&self, entry: ViewAngles) -> ViewAngles {
        if !self.mode().uses_motion() || self.auto_tour.is_enabled() {
            return entry;
        }
        ViewAngles::new(
            entry.yaw + self.head.heading,
            clamp_pitch(entry.pitch + self.head.elevation),
        )
    }

    fn update_hover(&mut self, dt: f32) {
        let camera = self.camera();
        let ray = if self.mode() == Mode::Normal {
            let eye = self.eye_viewport();
            self.input
                .hover_position()
                .map(|p| camera.ray_through_pixel(p.x, p.y, eye.x, eye.y))
        } else {
            Some(camera.center_ray())
        };
        let picked = ray.and_then(|r| self.hits.pick(&r));
        self.set_hover(picked);

        if self.mode().uses_motion() {
            if let Some(i) = self.hits.tick_fuse(dt) {
                log::debug!("gaze selected hotspot {i}");
                self.activate_hotspot(i);
            }
        }
    }

    fn set_hover(&mut self, picked: Option<usize>) {
        match self.hits.update_hover(picked) {
            HoverChange::Unchanged => {}
            HoverChange::Entered(i) => {
                let target = self.hover_text(i);
                self.bus.emit(ViewerEvent::HoverChanged { target });
            }
            HoverChange::Left => self.bus.emit(ViewerEvent::HoverChanged { target: None }),
        }
    }

    /// Label for a hotspot: the target scene's title, else the hotspot text.
    fn hover_text(&self, index: usize) -> Option<String> {
        let t = self.hits.target(index)?;
        self.tour
            .get_scene(&t.hotspot.target_scene_id)
            .map(|s| s.title.clone())
            .or_else(|| t.hotspot.text.clone())
    }

    pub fn frame(&self) -> FrameState {
        let camera = self.camera();
        let eye = self.eye_viewport();
        let blending = self.director.is_blending();

        let markers = if blending {
            Vec::new()
        } else {
            self.hits.markers(&camera, eye.x, eye.y)
        };
        let label = if blending {
            None
        } else {
            self.hits.hovered().and_then(|i| {
                Some(Label {
                    text: self.hover_text(i)?,
                    position: self.hits.label_anchor(i, &camera, eye.x, eye.y)?,
                })
            })
        };

        FrameState {
            yaw: self.orientation.yaw(),
            pitch: self.orientation.pitch(),
            fov: self.fov,
            veil: self.director.veil(),
            mode: self.mode(),
            scene: self.current_scene(),
            eye,
            markers,
            label,
            reticle: self
                .mode()
                .uses_motion()
                .then(|| self.hits.fuse_progress()),
            blending,
            auto_tour: self.auto_tour.is_enabled(),
            permission_denied: self.modes.permission_denied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tour::Hotspot;

    fn tour() -> TourGraph {
        TourGraph::new(vec![
            Scene::new("a", "Alpha", "a.jpg")
                .with_initial_view(0.0, 0.0)
                .with_hotspot(Hotspot::new(0.0, 0.0, "b")),
            Scene::new("b", "Beta", "b.jpg").with_initial_view(45.0, -10.0),
        ])
        .unwrap()
    }

    fn settle(v: &mut TourViewer) {
        let token = v.director.active_token().unwrap();
        v.image_loaded(token, true);
        for _ in 0..120 {
            v.tick(1.0 / 60.0);
        }
    }

    #[test]
    fn starts_with_reveal_of_first_scene() {
        let v = TourViewer::new(tour(), ViewerConfig::default());
        assert!(v.is_blending());
        assert_eq!(v.frame().veil, 1.0);
        assert!(v.events().iter().any(|e| matches!(
            &e.event,
            ViewerEvent::LoadRequested { path, .. } if path.ends_with("a.jpg")
        )));
    }

    #[test]
    fn hover_label_uses_target_title() {
        let mut v = TourViewer::new(tour(), ViewerConfig::default());
        v.resize(800.0, 600.0);
        settle(&mut v);
        v.pointer_moved(400.0, 300.0, 3.0);
        v.tick(1.0 / 60.0);
        let f = v.frame();
        let label = f.label.expect("hotspot at centre should be hovered");
        assert_eq!(label.text, "Beta");
        assert!(label.position.y < 300.0);
        assert_eq!(f.markers.len(), 1);

        // no duplicate hover events for a still pointer
        v.drain_events();
        v.tick(1.0 / 60.0);
        assert!(!v
            .events()
            .iter()
            .any(|e| matches!(e.event, ViewerEvent::HoverChanged { .. })));
    }

    #[test]
    fn auto_tour_enabled_during_reveal_waits_for_it() {
        let mut v = TourViewer::new(tour(), ViewerConfig::default());
        assert!(v.set_auto_tour(true));
        for _ in 0..60 {
            v.tick(1.0 / 60.0);
        }
        assert!(v.is_blending());
        assert_eq!(v.orientation().yaw(), 0.0);

        settle(&mut v);
        assert!(!v.is_blending());
        assert!(v.auto_tour_enabled());
        assert!(v.orientation().yaw() < 0.0);
        assert_eq!(v.current_scene(), 0);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut v = TourViewer::new(tour(), ViewerConfig::default());
        v.zoom(100.0);
        assert_eq!(v.fov(), 30.0);
        v.zoom(-100.0);
        assert_eq!(v.fov(), 100.0);
    }

    #[test]
    fn inertia_glides_after_fling() {
        let mut v = TourViewer::new(tour(), ViewerConfig::default());
        settle(&mut v);
        v.pointer_pressed(100.0, 100.0, 10.0);
        v.pointer_moved(200.0, 100.0, 10.02);
        v.pointer_released(10.03);
        let yaw = v.orientation().yaw();
        v.tick(1.0 / 60.0);
        assert!(v.orientation().yaw() < yaw);
    }
}
