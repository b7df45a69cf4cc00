// autotour.rs — 自动导览：整圈旋转后前进到下一个场景

use crate::config::AutoTourConfig;
use crate::events::{EventBus, StopReason, ViewerEvent};
use crate::mode::Mode;
use crate::orientation::{ease_in_out, Orientation};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    WaitingForIdle,
    Rotating { elapsed: f32, start_yaw: f32, pitch: f32 },
    /// Navigation to `expected` was requested; waiting for the scene change.
    Advancing { expected: usize },
}

/// What the tour wants the viewer to do this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub to: usize,
    pub token: u64,
}

#[derive(Debug, Clone)]
pub struct AutoTour {
    cfg: AutoTourConfig,
    enabled: bool,
    token: u64,
    stage: Stage,
}

impl AutoTour {
    pub fn new(cfg: AutoTourConfig) -> Self {
        Self {
            cfg,
            enabled: false,
            token: 0,
            stage: Stage::WaitingForIdle,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// True if `token` belongs to the run that is still active.
    pub fn is_current(&self, token: u64) -> bool {
        self.enabled && token == self.token
    }

    /// Start the tour. Refused in gyro mode, where device orientation owns
    /// the camera. Enabling an already running tour changes nothing.
    /// `pending` is the scene a running transition is heading to; the tour
    /// picks up from there once it lands.
    pub fn enable(&mut self, mode: Mode, pending: Option<usize>, bus: &mut EventBus) -> bool {
        if mode == Mode::Gyro {
            log::info!("auto tour is not available in gyro mode");
            return false;
        }
        if self.enabled {
            return true;
        }
        self.enabled = true;
        self.token += 1;
        self.stage = match pending {
            Some(expected) => Stage::Advancing { expected },
            None => Stage::WaitingForIdle,
        };
        bus.emit(ViewerEvent::AutoTourStarted);
        true
    }

    /// Stop the tour. Returns false (and emits nothing) when already stopped.
    pub fn disable(&mut self, reason: StopReason, bus: &mut EventBus) -> bool {
        if !self.enabled {
            return false;
        }
        self.enabled = false;
        self.token += 1;
        self.stage = Stage::WaitingForIdle;
        log::info!("auto tour stopped ({reason:?})");
        bus.emit(ViewerEvent::AutoTourStopped { reason });
        true
    }

    /// A scene change happened. Changes the tour did not ask for end it.
    pub fn on_scene_changed(&mut self, index: usize, bus: &mut EventBus) {
        if !self.enabled {
            return;
        }
        match self.stage {
            Stage::Advancing { expected } if expected == index => {
                self.stage = Stage::WaitingForIdle;
            }
            _ => {
                self.disable(StopReason::ExternalNavigation, bus);
            }
        }
    }

    pub fn tick(
        &mut self,
        dt: f32,
        transitioning: bool,
        orientation: &mut Orientation,
        current: usize,
        scene_count: usize,
    ) -> Option<Advance> {
        if !self.enabled {
            return None;
        }

        match self.stage {
            Stage::WaitingForIdle => {
                if transitioning {
                    return None;
                }
                orientation.clear_velocity();
                self.stage = Stage::Rotating {
                    elapsed: 0.0,
                    start_yaw: orientation.yaw(),
                    pitch: orientation.pitch(),
                };
                None
            }
            Stage::Rotating {
                elapsed,
                start_yaw,
                pitch,
            } => {
                let elapsed = elapsed + dt.max(0.0);
                let p = if self.cfg.sweep_secs > 0.0 {
                    ease_in_out(elapsed / self.cfg.sweep_secs)
                } else {
                    1.0
                };
                orientation.set(start_yaw + self.cfg.sweep * p, pitch);

                if p < 1.0 {
                    self.stage = Stage::Rotating {
                        elapsed,
                        start_yaw,
                        pitch,
                    };
                    return None;
                }
                let to = (current + 1) % scene_count.max(1);
                self.stage = Stage::Advancing { expected: to };
                Some(Advance {
                    to,
                    token: self.token,
                })
            }
            Stage::Advancing { .. } => None,
        }
    }
}
