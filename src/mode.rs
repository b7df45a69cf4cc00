// mode.rs — 展示模式 (normal / gyro / vr) 与当前场景

use std::fmt;

use crate::error::PlatformError;
use crate::events::{EventBus, ViewerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Mode {
    /// Flat perspective, mouse/touch drag.
    #[default]
    Normal,
    /// Device orientation drives the camera.
    Gyro,
    /// Device orientation, stereo split screen.
    Vr,
}

impl Mode {
    pub fn uses_motion(self) -> bool {
        matches!(self, Mode::Gyro | Mode::Vr)
    }

    pub fn is_stereo(self) -> bool {
        self == Mode::Vr
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Normal => "normal",
            Mode::Gyro => "gyro",
            Mode::Vr => "vr",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// The prompt is still open; the answer arrives later (or never).
    Pending,
}

/// Device-motion collaborator.
pub trait MotionSensor {
    fn request_permission(&mut self) -> Permission;
    fn subscribe(&mut self) -> Result<(), PlatformError>;
    fn unsubscribe(&mut self);
}

/// Fullscreen / orientation-lock collaborator. Everything is best effort.
pub trait Presentation {
    fn enter_fullscreen(&mut self) -> Result<(), PlatformError>;
    fn exit_fullscreen(&mut self);
    fn lock_landscape(&mut self) -> Result<(), PlatformError>;
    fn unlock_orientation(&mut self);
}

/// Outcome of a mode switch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    Entered(Mode),
    Unchanged(Mode),
    /// Direct gyro↔vr jumps are refused and land in normal instead.
    Rejected { now: Mode },
    Denied { now: Mode },
    Pending { now: Mode },
}

impl Switch {
    pub fn mode(self) -> Mode {
        match self {
            Switch::Entered(m) | Switch::Unchanged(m) => m,
            Switch::Rejected { now } | Switch::Denied { now } | Switch::Pending { now } => now,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModeManager {
    mode: Mode,
    current_scene: usize,
    scene_count: usize,
    permission_denied: bool,
    pending: Option<Mode>,
}

impl ModeManager {
    pub fn new(scene_count: usize) -> Self {
        Self {
            mode: Mode::Normal,
            current_scene: 0,
            scene_count: scene_count.max(1),
            permission_denied: false,
            pending: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn current_scene(&self) -> usize {
        self.current_scene
    }

    /// Set when the last motion permission request was refused.
    pub fn permission_denied(&self) -> bool {
        self.permission_denied
    }

    pub fn pending_request(&self) -> Option<Mode> {
        self.pending
    }

    /// Single authority for the current scene. Wraps out-of-range indices
    /// and broadcasts the change.
    pub fn set_current_scene(&mut self, index: usize, id: &str, bus: &mut EventBus) -> usize {
        let index = index % self.scene_count;
        self.current_scene = index;
        bus.emit(ViewerEvent::SceneChanged {
            index,
            id: id.to_string(),
        });
        index
    }

    pub fn switch_mode(
        &mut self,
        requested: Mode,
        motion: &mut dyn MotionSensor,
        presentation: &mut dyn Presentation,
        bus: &mut EventBus,
    ) -> Switch {
        // A new request replaces any unanswered permission prompt.
        self.pending = None;

        if requested == self.mode {
            return Switch::Unchanged(self.mode);
        }

        match (self.mode, requested) {
            (_, Mode::Normal) => {
                self.enter_normal(motion, presentation, bus);
                Switch::Entered(Mode::Normal)
            }
            (Mode::Gyro, Mode::Vr) | (Mode::Vr, Mode::Gyro) => {
                let from = self.mode;
                log::info!("refusing direct {from} -> {requested}, returning to normal");
                bus.emit(ViewerEvent::ModeRejected { requested, from });
                self.enter_normal(motion, presentation, bus);
                Switch::Rejected { now: Mode::Normal }
            }
            (Mode::Normal, Mode::Gyro) => match motion.request_permission() {
                Permission::Granted => self.enter_gyro(motion, bus),
                Permission::Denied => self.deny(Mode::Gyro, bus),
                Permission::Pending => {
                    self.pending = Some(Mode::Gyro);
                    bus.emit(ViewerEvent::PermissionPending {
                        requested: Mode::Gyro,
                    });
                    Switch::Pending { now: self.mode }
                }
            },
            (Mode::Normal, Mode::Vr) => {
                self.enter_vr(motion, presentation, bus);
                Switch::Entered(Mode::Vr)
            }
            // requested == current handled above
            (_, _) => Switch::Unchanged(self.mode),
        }
    }

    /// Answer to a permission prompt that was pending. Ignored when the
    /// request was superseded in the meantime.
    pub fn permission_resolved(
        &mut self,
        granted: bool,
        motion: &mut dyn MotionSensor,
        bus: &mut EventBus,
    ) -> Option<Switch> {
        let requested = self.pending.take()?;
        if self.mode != Mode::Normal {
            return None;
        }
        Some(match (requested, granted) {
            (Mode::Gyro, true) => self.enter_gyro(motion, bus),
            (Mode::Gyro, false) => self.deny(Mode::Gyro, bus),
            _ => return None,
        })
    }

    fn enter_gyro(&mut self, motion: &mut dyn MotionSensor, bus: &mut EventBus) -> Switch {
        if let Err(e) = motion.subscribe() {
            log::warn!("device orientation unavailable: {e}");
            return self.deny(Mode::Gyro, bus);
        }
        self.permission_denied = false;
        self.set_mode(Mode::Gyro, bus);
        Switch::Entered(Mode::Gyro)
    }

    fn deny(&mut self, requested: Mode, bus: &mut EventBus) -> Switch {
        log::warn!("motion permission denied, staying in {}", self.mode);
        self.permission_denied = true;
        bus.emit(ViewerEvent::PermissionDenied { requested });
        Switch::Denied { now: self.mode }
    }

    fn enter_vr(
        &mut self,
        motion: &mut dyn MotionSensor,
        presentation: &mut dyn Presentation,
        bus: &mut EventBus,
    ) {
        // Best effort: none of these failures keep us out of vr.
        if let Err(e) = presentation.enter_fullscreen() {
            log::info!("fullscreen not available: {e}");
        }
        if let Err(e) = presentation.lock_landscape() {
            log::info!("orientation lock not available: {e}");
        }
        match motion.request_permission() {
            Permission::Granted => {
                if let Err(e) = motion.subscribe() {
                    log::warn!("vr without head tracking: {e}");
                }
            }
            other => log::warn!("vr without head tracking (permission {other:?})"),
        }
        self.set_mode(Mode::Vr, bus);
    }

    fn enter_normal(
        &mut self,
        motion: &mut dyn MotionSensor,
        presentation: &mut dyn Presentation,
        bus: &mut EventBus,
    ) {
        motion.unsubscribe();
        presentation.unlock_orientation();
        presentation.exit_fullscreen();
        self.set_mode(Mode::Normal, bus);
    }

    fn set_mode(&mut self, to: Mode, bus: &mut EventBus) {
        let from = self.mode;
        if from == to {
            return;
        }
        self.mode = to;
        log::info!("mode {from} -> {to}");
        bus.emit(ViewerEvent::ModeChanged { from, to });
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Scripted motion sensor for tests.
    #[derive(Debug)]
    pub struct FakeMotion {
        pub answer: Permission,
        pub subscribed: bool,
        pub requests: usize,
    }

    impl FakeMotion {
        pub fn answering(answer: Permission) -> Self {
            Self {
                answer,
                subscribed: false,
                requests: 0,
            }
        }
    }

    impl MotionSensor for FakeMotion {
        fn request_permission(&mut self) -> Permission {
            self.requests += 1;
            self.answer
        }
        fn subscribe(&mut self) -> Result<(), PlatformError> {
            self.subscribed = true;
            Ok(())
        }
        fn unsubscribe(&mut self) {
            self.subscribed = false;
        }
    }

    /// Presentation that supports nothing, like most desktop browsers'
    /// orientation lock.
    #[derive(Debug, Default)]
    pub struct NoPresentation {
        pub fullscreen: bool,
        pub exits: usize,
    }

    impl Presentation for NoPresentation {
        fn enter_fullscreen(&mut self) -> Result<(), PlatformError> {
            Err(PlatformError::Unsupported("fullscreen"))
        }
        fn exit_fullscreen(&mut self) {
            self.exits += 1;
        }
        fn lock_landscape(&mut self) -> Result<(), PlatformError> {
            Err(PlatformError::Unsupported("orientation lock"))
        }
        fn unlock_orientation(&mut self) {}
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeMotion, NoPresentation};
    use super::*;

    fn setup(answer: Permission) -> (ModeManager, FakeMotion, NoPresentation, EventBus) {
        (
            ModeManager::new(3),
            FakeMotion::answering(answer),
            NoPresentation::default(),
            EventBus::new(),
        )
    }

    #[test]
    fn starts_in_normal() {
        let (m, ..) = setup(Permission::Granted);
        assert_eq!(m.mode(), Mode::Normal);
        assert_eq!(m.current_scene(), 0);
    }

    #[test]
    fn gyro_requires_permission() {
        let (mut m, mut motion, mut pres, mut bus) = setup(Permission::Denied);
        let r = m.switch_mode(Mode::Gyro, &mut motion, &mut pres, &mut bus);
        assert_eq!(r, Switch::Denied { now: Mode::Normal });
        assert_eq!(m.mode(), Mode::Normal);
        assert!(m.permission_denied());
        assert!(!motion.subscribed);
        assert!(bus
            .events()
            .iter()
            .any(|e| e.event == ViewerEvent::PermissionDenied { requested: Mode::Gyro }));

        motion.answer = Permission::Granted;
        let r = m.switch_mode(Mode::Gyro, &mut motion, &mut pres, &mut bus);
        assert_eq!(r, Switch::Entered(Mode::Gyro));
        assert!(motion.subscribed);
        assert!(!m.permission_denied());
    }

    #[test]
    fn vr_entered_even_without_fullscreen() {
        let (mut m, mut motion, mut pres, mut bus) = setup(Permission::Denied);
        let r = m.switch_mode(Mode::Vr, &mut motion, &mut pres, &mut bus);
        assert_eq!(r, Switch::Entered(Mode::Vr));
        assert_eq!(m.mode(), Mode::Vr);
    }

    #[test]
    fn gyro_to_vr_lands_in_normal() {
        let (mut m, mut motion, mut pres, mut bus) = setup(Permission::Granted);
        m.switch_mode(Mode::Gyro, &mut motion, &mut pres, &mut bus);
        let r = m.switch_mode(Mode::Vr, &mut motion, &mut pres, &mut bus);
        assert_eq!(r, Switch::Rejected { now: Mode::Normal });
        assert_eq!(m.mode(), Mode::Normal);
        assert!(!motion.subscribed);
    }

    #[test]
    fn vr_to_gyro_lands_in_normal() {
        let (mut m, mut motion, mut pres, mut bus) = setup(Permission::Granted);
        m.switch_mode(Mode::Vr, &mut motion, &mut pres, &mut bus);
        let r = m.switch_mode(Mode::Gyro, &mut motion, &mut pres, &mut bus);
        assert_eq!(r.mode(), Mode::Normal);
        assert_eq!(m.mode(), Mode::Normal);
    }

    #[test]
    fn normal_always_releases_everything() {
        let (mut m, mut motion, mut pres, mut bus) = setup(Permission::Granted);
        m.switch_mode(Mode::Vr, &mut motion, &mut pres, &mut bus);
        assert!(motion.subscribed);
        m.switch_mode(Mode::Normal, &mut motion, &mut pres, &mut bus);
        assert!(!motion.subscribed);
        assert_eq!(pres.exits, 1);
    }

    #[test]
    fn pending_permission_resolves_later() {
        let (mut m, mut motion, mut pres, mut bus) = setup(Permission::Pending);
        let r = m.switch_mode(Mode::Gyro, &mut motion, &mut pres, &mut bus);
        assert_eq!(r, Switch::Pending { now: Mode::Normal });
        assert_eq!(m.pending_request(), Some(Mode::Gyro));

        let r = m.permission_resolved(true, &mut motion, &mut bus);
        assert_eq!(r, Some(Switch::Entered(Mode::Gyro)));
        assert_eq!(m.permission_resolved(true, &mut motion, &mut bus), None);
    }

    #[test]
    fn pending_permission_dropped_by_later_switch() {
        let (mut m, mut motion, mut pres, mut bus) = setup(Permission::Pending);
        m.switch_mode(Mode::Gyro, &mut motion, &mut pres, &mut bus);
        motion.answer = Permission::Granted;
        m.switch_mode(Mode::Vr, &mut motion, &mut pres, &mut bus);
        assert_eq!(m.permission_resolved(true, &mut motion, &mut bus), None);
        assert_eq!(m.mode(), Mode::Vr);
    }

    #[test]
    fn set_current_scene_wraps_and_broadcasts() {
        let (mut m, _, _, mut bus) = setup(Permission::Granted);
        assert_eq!(m.set_current_scene(4, "b", &mut bus), 1);
        assert_eq!(m.current_scene(), 1);
        assert_eq!(
            bus.events()[0].event,
            ViewerEvent::SceneChanged { index: 1, id: "b".into() }
        );
    }
}
