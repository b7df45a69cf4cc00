// transition.rs — 场景切换：淡出到黑 → 等待贴图 → 淡入，同时插值朝向
//
// Only one blend exists at a time. Every blend carries a generation token;
// starting a new blend while one is running supersedes it and the old token
// becomes stale, so late image completions for it are ignored.

use crate::config::TransitionConfig;
use crate::events::ImageOutcome;
use crate::orientation::{lerp_angle, smoothstep};
use crate::tour::ViewAngles;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FadingOut,
    /// Fully black, waiting for the next panorama (bounded by the load timeout).
    Holding,
    FadingIn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Blend {
    pub token: u64,
    pub target: usize,
    stage: Stage,
    veil: f32,
    start: ViewAngles,
    goal: ViewAngles,
    motion_elapsed: f32,
    motion_duration: f32,
    waited: f32,
    image: Option<ImageOutcome>,
}

impl Blend {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn view(&self) -> ViewAngles {
        let p = if self.motion_duration > 0.0 {
            smoothstep(self.motion_elapsed / self.motion_duration)
        } else {
            1.0
        };
        ViewAngles::new(
            lerp_angle(self.start.yaw, self.goal.yaw, p),
            self.start.pitch + (self.goal.pitch - self.start.pitch) * p,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Blending(Blend),
}

/// Result of one director tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Nothing,
    /// The screen is black; present the new panorama now.
    Swap { token: u64, image: ImageOutcome },
    Finished { token: u64, target: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Started {
    pub token: u64,
    /// Token of the blend this one replaced.
    pub superseded: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TransitionDirector {
    cfg: TransitionConfig,
    phase: Phase,
    last_token: u64,
}

impl TransitionDirector {
    pub fn new(cfg: TransitionConfig) -> Self {
        Self {
            cfg,
            phase: Phase::Idle,
            last_token: 0,
        }
    }

    /// Continue numbering after `last_token`, so tokens issued by an earlier
    /// director are never handed out again.
    pub fn resume_after(mut self, last_token: u64) -> Self {
        self.last_token = self.last_token.max(last_token);
        self
    }

    /// Most recently issued token, 0 before the first blend.
    pub fn last_token(&self) -> u64 {
        self.last_token
    }

    fn half(&self) -> f32 {
        (self.cfg.duration * 0.5).max(1e-3)
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_blending(&self) -> bool {
        matches!(self.phase, Phase::Blending(_))
    }

    pub fn active_token(&self) -> Option<u64> {
        match &self.phase {
            Phase::Blending(b) => Some(b.token),
            Phase::Idle => None,
        }
    }

    pub fn target(&self) -> Option<usize> {
        match &self.phase {
            Phase::Blending(b) => Some(b.target),
            Phase::Idle => None,
        }
    }

    /// 0 = fully visible, 1 = black.
    pub fn veil(&self) -> f32 {
        match &self.phase {
            Phase::Blending(b) => b.veil,
            Phase::Idle => 0.0,
        }
    }

    /// Orientation dictated by the running blend.
    pub fn view(&self) -> Option<ViewAngles> {
        match &self.phase {
            Phase::Blending(b) => Some(b.view()),
            Phase::Idle => None,
        }
    }

    fn next_token(&mut self) -> u64 {
        self.last_token += 1;
        self.last_token
    }

    /// Start blending towards `target`. `from` is the orientation currently on
    /// screen; a superseded blend hands over its veil level so nothing jumps.
    pub fn begin(&mut self, target: usize, from: ViewAngles, goal: ViewAngles) -> Started {
        let (veil, superseded) = match &self.phase {
            Phase::Blending(b) => (b.veil, Some(b.token)),
            Phase::Idle => (0.0, None),
        };
        let half = self.half();
        let token = self.next_token();
        self.phase = Phase::Blending(Blend {
            token,
            target,
            stage: Stage::FadingOut,
            veil,
            start: from,
            goal,
            motion_elapsed: 0.0,
            motion_duration: half * (1.0 - veil) + half,
            waited: 0.0,
            image: None,
        });
        Started { token, superseded }
    }

    /// Start from black with no rotation (first scene after launch).
    pub fn reveal(&mut self, target: usize, goal: ViewAngles) -> Started {
        let superseded = self.active_token();
        let token = self.next_token();
        self.phase = Phase::Blending(Blend {
            token,
            target,
            stage: Stage::Holding,
            veil: 1.0,
            start: goal,
            goal,
            motion_elapsed: 0.0,
            motion_duration: 0.0,
            waited: 0.0,
            image: None,
        });
        Started { token, superseded }
    }

    /// Record the load result for `token`. Stale tokens are ignored.
    pub fn image_resolved(&mut self, token: u64, outcome: ImageOutcome) -> bool {
        match &mut self.phase {
            Phase::Blending(b) if b.token == token && b.image.is_none() => {
                b.image = Some(outcome);
                true
            }
            _ => false,
        }
    }

    pub fn tick(&mut self, dt: f32) -> Step {
        let dt = dt.max(0.0);
        let half = self.half();
        let timeout = self.cfg.load_timeout;

        let Phase::Blending(b) = &mut self.phase else {
            return Step::Nothing;
        };
        b.waited += dt;

        if b.stage == Stage::FadingOut {
            b.veil = (b.veil + dt / half).min(1.0);
            b.motion_elapsed += dt;
            if b.veil >= 1.0 {
                b.stage = Stage::Holding;
            }
        }

        if b.stage == Stage::Holding {
            if b.image.is_none() && b.waited >= timeout {
                log::warn!(
                    "panorama for transition {} not ready after {:.1}s",
                    b.token,
                    b.waited
                );
                b.image = Some(ImageOutcome::TimedOut);
            }
            return match b.image {
                Some(image) => {
                    b.stage = Stage::FadingIn;
                    Step::Swap {
                        token: b.token,
                        image,
                    }
                }
                None => Step::Nothing,
            };
        }

        // FadingIn
        b.veil = (b.veil - dt / half).max(0.0);
        b.motion_elapsed += dt;
        if b.veil > 0.0 {
            return Step::Nothing;
        }

        let (token, target) = (b.token, b.target);
        self.phase = Phase::Idle;
        Step::Finished { token, target }
    }
}
