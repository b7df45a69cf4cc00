// orientation.rs — 相机朝向状态 (yaw / pitch + 惯性角速度)

use crate::tour::ViewAngles;

/// Hard pitch bound in degrees. Keeps the camera away from the poles where
/// yaw becomes degenerate.
pub const PITCH_LIMIT: f32 = 85.0;

pub fn clamp_pitch(pitch: f32) -> f32 {
    if pitch.is_nan() {
        return 0.0;
    }
    pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT)
}

/// Viewing direction and angular velocity of the virtual camera.
///
/// Yaw is unbounded; it wraps implicitly through the trigonometry of the
/// camera. Pitch is clamped in exactly one place, [`Orientation::write`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Orientation {
    yaw: f32,
    pitch: f32,
    velocity_yaw: f32,
    velocity_pitch: f32,
}

impl Orientation {
    pub fn new(view: ViewAngles) -> Self {
        let mut o = Self::default();
        o.set_view(view);
        o
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn view(&self) -> ViewAngles {
        ViewAngles::new(self.yaw, self.pitch)
    }

    /// Angular velocity in degrees per second.
    pub fn velocity(&self) -> (f32, f32) {
        (self.velocity_yaw, self.velocity_pitch)
    }

    fn write(&mut self, yaw: f32, pitch: f32) {
        if yaw.is_finite() {
            self.yaw = yaw;
        }
        self.pitch = clamp_pitch(pitch);
    }

    pub fn set(&mut self, yaw: f32, pitch: f32) {
        self.write(yaw, pitch);
    }

    pub fn set_view(&mut self, view: ViewAngles) {
        self.write(view.yaw, view.pitch);
    }

    pub fn rotate_by(&mut self, d_yaw: f32, d_pitch: f32) {
        self.write(self.yaw + d_yaw, self.pitch + d_pitch);
    }

    pub fn set_velocity(&mut self, yaw: f32, pitch: f32) {
        self.velocity_yaw = if yaw.is_finite() { yaw } else { 0.0 };
        self.velocity_pitch = if pitch.is_finite() { pitch } else { 0.0 };
    }

    pub fn clear_velocity(&mut self) {
        self.velocity_yaw = 0.0;
        self.velocity_pitch = 0.0;
    }

    pub fn is_gliding(&self) -> bool {
        self.velocity_yaw != 0.0 || self.velocity_pitch != 0.0
    }

    /// Advance one frame of inertial glide: move by velocity × dt, then decay
    /// the velocity by `exp(-friction × dt)`. Components slower than
    /// `rest_speed` snap to zero.
    pub fn glide(&mut self, dt: f32, friction: f32, rest_speed: f32) {
        if !self.is_gliding() || dt <= 0.0 {
            return;
        }

        self.rotate_by(self.velocity_yaw * dt, self.velocity_pitch * dt);

        // Pitch pinned against the limit: stop pushing into it.
        if self.pitch.abs() >= PITCH_LIMIT && self.pitch.signum() == self.velocity_pitch.signum() {
            self.velocity_pitch = 0.0;
        }

        let decay = (-friction * dt).exp();
        self.velocity_yaw *= decay;
        self.velocity_pitch *= decay;

        if self.velocity_yaw.abs() < rest_speed {
            self.velocity_yaw = 0.0;
        }
        if self.velocity_pitch.abs() < rest_speed {
            self.velocity_pitch = 0.0;
        }
    }
}

/// Hermite smoothstep on [0, 1].
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Quadratic ease-in-out on [0, 1].
pub fn ease_in_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

/// Interpolate yaw along the shortest arc.
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    let mut delta = (to - from) % 360.0;
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta < -180.0 {
        delta += 360.0;
    }
    from + delta * t
}
