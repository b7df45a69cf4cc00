// platform.rs — 桌面端的全屏与"陀螺仪"实现
//
// Desktop windows have no motion sensor, so gyro/vr head tracking is emulated
// from the keyboard (I/K pitch, J/L heading). The permission answer comes from
// the --motion launch option.

use std::sync::Arc;

use panorama_tour::config::MotionPolicy;
use panorama_tour::error::PlatformError;
use panorama_tour::input::DeviceSample;
use panorama_tour::mode::{MotionSensor, Permission, Presentation};
use winit::event::VirtualKeyCode;
use winit::window::{Fullscreen, Window};

pub struct WindowPresentation {
    window: Arc<Window>,
}

impl WindowPresentation {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }

    pub fn is_fullscreen(&self) -> bool {
        self.window.fullscreen().is_some()
    }

    pub fn toggle_fullscreen(&mut self) {
        if self.is_fullscreen() {
            self.window.set_fullscreen(None);
        } else {
            self.window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        }
    }
}

impl Presentation for WindowPresentation {
    fn enter_fullscreen(&mut self) -> Result<(), PlatformError> {
        if self.window.current_monitor().is_none() {
            return Err(PlatformError::Unsupported("fullscreen"));
        }
        self.window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        Ok(())
    }

    fn exit_fullscreen(&mut self) {
        self.window.set_fullscreen(None);
    }

    fn lock_landscape(&mut self) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported("orientation lock"))
    }

    fn unlock_orientation(&mut self) {}
}

/// Degrees per second while a steering key is held.
const KEY_RATE: f32 = 60.0;

#[derive(Debug, Default, Clone, Copy)]
struct Held {
    left: bool,
    right: bool,
    up: bool,
    down: bool,
}

pub struct EmulatedMotion {
    policy: MotionPolicy,
    subscribed: bool,
    held: Held,
    sample: DeviceSample,
}

impl EmulatedMotion {
    pub fn new(policy: MotionPolicy) -> Self {
        Self {
            policy,
            subscribed: false,
            held: Held::default(),
            sample: DeviceSample::default(),
        }
    }

    /// Feed a key transition. Returns true if the key steers the sensor.
    pub fn key(&mut self, key: VirtualKeyCode, pressed: bool) -> bool {
        let slot = match key {
            VirtualKeyCode::J => &mut self.held.left,
            VirtualKeyCode::L => &mut self.held.right,
            VirtualKeyCode::I => &mut self.held.up,
            VirtualKeyCode::K => &mut self.held.down,
            _ => return false,
        };
        *slot = pressed;
        true
    }

    /// Advance the emulated head pose. `None` while not subscribed.
    pub fn poll_sample(&mut self, dt: f32) -> Option<DeviceSample> {
        if !self.subscribed {
            return None;
        }
        let axis = |neg: bool, pos: bool| (pos as i32 - neg as i32) as f32;
        self.sample.heading += axis(self.held.left, self.held.right) * KEY_RATE * dt;
        self.sample.elevation = (self.sample.elevation
            + axis(self.held.down, self.held.up) * KEY_RATE * dt)
            .clamp(-90.0, 90.0);
        Some(self.sample)
    }
}

impl MotionSensor for EmulatedMotion {
    fn request_permission(&mut self) -> Permission {
        match self.policy {
            MotionPolicy::Granted => Permission::Granted,
            MotionPolicy::Pending => Permission::Pending,
            MotionPolicy::Denied | MotionPolicy::None => Permission::Denied,
        }
    }

    fn subscribe(&mut self) -> Result<(), PlatformError> {
        if self.policy == MotionPolicy::None {
            return Err(PlatformError::Unsupported("device orientation"));
        }
        self.subscribed = true;
        self.sample = DeviceSample::default();
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.subscribed = false;
        self.held = Held::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_drives_permission() {
        assert_eq!(
            EmulatedMotion::new(MotionPolicy::Denied).request_permission(),
            Permission::Denied
        );
        assert_eq!(
            EmulatedMotion::new(MotionPolicy::Pending).request_permission(),
            Permission::Pending
        );
        assert!(EmulatedMotion::new(MotionPolicy::None).subscribe().is_err());
    }

    #[test]
    fn keys_steer_only_when_subscribed() {
        let mut m = EmulatedMotion::new(MotionPolicy::Granted);
        assert!(m.key(VirtualKeyCode::L, true));
        assert!(m.poll_sample(1.0).is_none());

        m.subscribe().unwrap();
        let s = m.poll_sample(0.5).unwrap();
        assert_eq!(s.heading, 30.0);
        assert_eq!(s.elevation, 0.0);

        m.unsubscribe();
        m.subscribe().unwrap();
        assert_eq!(m.poll_sample(1.0).unwrap().heading, 0.0);
    }
}
