// input.rs — 拖拽 / 触摸 / 设备方向 输入处理

use glam::Vec2;

use crate::camera::Camera;
use crate::config::InputConfig;
use crate::orientation::Orientation;
use crate::tour::ViewAngles;

/// One device-orientation reading, already normalised by the platform into
/// an absolute heading (yaw) and elevation (pitch), in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeviceSample {
    pub heading: f32,
    pub elevation: f32,
}

/// Result of releasing the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Release {
    /// The pointer barely moved: treat as a tap/click at this position.
    Click(Vec2),
    /// A drag ended; inertia (if any) carries on.
    DragEnd,
    /// Nothing was pressed, or input is frozen.
    Ignored,
}

#[derive(Debug, Clone, Copy)]
struct Press {
    origin: Vec2,
    last: Vec2,
    last_time: f64,
    travel: f32,
}

/// Translates pointer and motion input into orientation changes.
#[derive(Debug, Clone)]
pub struct InputController {
    cfg: InputConfig,
    press: Option<Press>,
    hover_pos: Option<Vec2>,
    frozen: bool,
}

impl InputController {
    pub fn new(cfg: InputConfig) -> Self {
        Self {
            cfg,
            press: None,
            hover_pos: None,
            frozen: false,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.press.is_some()
    }

    /// True once the pointer has travelled beyond the click slop.
    pub fn is_dragging(&self) -> bool {
        self.press
            .map(|p| p.travel > self.cfg.click_slop_px)
            .unwrap_or(false)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Last pointer position while not pressed, used for hover testing.
    pub fn hover_position(&self) -> Option<Vec2> {
        if self.press.is_some() {
            None
        } else {
            self.hover_pos
        }
    }

    /// Drop any press in progress and kill inertia. Used while a transition
    /// owns the orientation.
    pub fn freeze(&mut self, orientation: &mut Orientation) {
        self.frozen = true;
        self.press = None;
        orientation.clear_velocity();
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    pub fn press(&mut self, pos: Vec2, now: f64, orientation: &mut Orientation) -> bool {
        if self.frozen {
            return false;
        }
        orientation.clear_velocity();
        self.press = Some(Press {
            origin: pos,
            last: pos,
            last_time: now,
            travel: 0.0,
        });
        true
    }

    /// Pointer moved. While pressed this rotates the view; otherwise it only
    /// updates the hover position.
    pub fn motion(
        &mut self,
        pos: Vec2,
        now: f64,
        camera: &Camera,
        viewport: Vec2,
        sensitivity: f32,
        orientation: &mut Orientation,
    ) {
        self.hover_pos = Some(pos);
        if self.frozen {
            return;
        }
        let Some(mut press) = self.press else {
            return;
        };

        let mut delta = pos - press.last;
        press.travel = press.travel.max((pos - press.origin).length());
        press.last = pos;

        let dt = (now - press.last_time) as f32;
        press.last_time = now;
        self.press = Some(press);

        // Axis lock: a mostly-horizontal drag should not drift vertically.
        let (ax, ay) = (delta.x.abs(), delta.y.abs());
        if ax > ay * self.cfg.axis_lock_ratio {
            delta.y *= self.cfg.off_axis_damping;
        } else if ay > ax * self.cfg.axis_lock_ratio {
            delta.x *= self.cfg.off_axis_damping;
        }

        let dpp = camera.degrees_per_pixel(viewport.x, viewport.y) * sensitivity;
        let d_yaw = -delta.x * dpp.x;
        let d_pitch = delta.y * dpp.y;
        orientation.rotate_by(d_yaw, d_pitch);

        if dt > 1e-4 {
            let max = self.cfg.max_velocity;
            orientation.set_velocity(
                (d_yaw / dt).clamp(-max, max),
                (d_pitch / dt).clamp(-max, max),
            );
        }
    }

    pub fn release(&mut self, now: f64, orientation: &mut Orientation) -> Release {
        let Some(press) = self.press.take() else {
            return Release::Ignored;
        };
        if self.frozen {
            return Release::Ignored;
        }

        if press.travel <= self.cfg.click_slop_px {
            orientation.clear_velocity();
            return Release::Click(press.last);
        }

        // A pointer that rested before lifting should not fling.
        if (now - press.last_time) as f32 > self.cfg.rest_before_release_secs {
            orientation.clear_velocity();
        }
        Release::DragEnd
    }

    /// The pointer left the window: end the press without a click.
    pub fn leave(&mut self) {
        self.press = None;
        self.hover_pos = None;
    }

    /// Map a device-orientation reading onto the camera, offset by the
    /// scene's own forward direction.
    pub fn device_sample(
        &self,
        sample: DeviceSample,
        forward: ViewAngles,
        orientation: &mut Orientation,
    ) {
        if self.frozen {
            return;
        }
        orientation.set(forward.yaw + sample.heading, forward.pitch + sample.elevation);
    }
}
