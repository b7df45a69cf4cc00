// hotspot.rs — 热点命中检测：射线 vs 激活球、悬停去重、凝视确认

use glam::{Vec2, Vec3};

use crate::camera::{direction, ray_sphere, Camera, Ray};
use crate::config::HotspotConfig;
use crate::tour::Hotspot;

/// A hotspot placed in the active scene.
#[derive(Debug, Clone, PartialEq)]
pub struct HotspotTarget {
    pub hotspot: Hotspot,
    pub center: Vec3,
    pub activation_radius: f32,
    pub visual_radius: f32,
}

/// Hover state change reported by [`HitTester::update_hover`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverChange {
    Unchanged,
    Entered(usize),
    Left,
}

/// Screen-space marker for the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub index: usize,
    pub position: Vec2,
    /// Projected marker radius in pixels.
    pub radius: f32,
    pub hovered: bool,
}

#[derive(Debug, Clone)]
pub struct HitTester {
    cfg: HotspotConfig,
    targets: Vec<HotspotTarget>,
    hovered: Option<usize>,
    dwell: f32,
    fuse_fired: bool,
}

impl HitTester {
    pub fn new(cfg: HotspotConfig) -> Self {
        Self {
            cfg,
            targets: Vec::new(),
            hovered: None,
            dwell: 0.0,
            fuse_fired: false,
        }
    }

    /// Replace the placed hotspots. `synthetic` marks the fallback forward
    /// link, which is drawn a little smaller.
    pub fn rebuild(&mut self, hotspots: &[Hotspot], synthetic: bool) {
        let size = if synthetic {
            self.cfg.fallback_size
        } else {
            self.cfg.size
        };
        self.targets = hotspots
            .iter()
            .map(|hs| HotspotTarget {
                hotspot: hs.clone(),
                center: direction(hs.yaw, hs.pitch) * self.cfg.radius,
                activation_radius: size * self.cfg.activation_scale,
                visual_radius: size * self.cfg.visual_scale,
            })
            .collect();
        self.clear_hover();
    }

    pub fn clear(&mut self) {
        self.targets.clear();
        self.clear_hover();
    }

    pub fn targets(&self) -> &[HotspotTarget] {
        &self.targets
    }

    pub fn target(&self, index: usize) -> Option<&HotspotTarget> {
        self.targets.get(index)
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    /// Closest hotspot whose activation sphere the ray passes through.
    pub fn pick(&self, ray: &Ray) -> Option<usize> {
        let mut best: Option<(f32, usize)> = None;
        for (i, t) in self.targets.iter().enumerate() {
            let Some(dist) = ray_sphere(ray, t.center, t.activation_radius) else {
                continue;
            };
            match best {
                Some((bd, _)) if bd <= dist => {}
                _ => best = Some((dist, i)),
            }
        }
        best.map(|(_, i)| i)
    }

    /// Record what is under the pointer/reticle. Only reports a change when
    /// the hovered hotspot actually differs from last time.
    pub fn update_hover(&mut self, picked: Option<usize>) -> HoverChange {
        if picked == self.hovered {
            return HoverChange::Unchanged;
        }
        self.hovered = picked;
        self.dwell = 0.0;
        self.fuse_fired = false;
        match picked {
            Some(i) => HoverChange::Entered(i),
            None => HoverChange::Left,
        }
    }

    pub fn clear_hover(&mut self) {
        self.hovered = None;
        self.dwell = 0.0;
        self.fuse_fired = false;
    }

    /// Advance the gaze-dwell timer. Returns the hovered hotspot once when
    /// the dwell completes; looking away and back re-arms it.
    pub fn tick_fuse(&mut self, dt: f32) -> Option<usize> {
        let i = self.hovered?;
        if self.fuse_fired {
            return None;
        }
        self.dwell += dt.max(0.0);
        if self.dwell >= self.cfg.fuse_secs {
            self.fuse_fired = true;
            return Some(i);
        }
        None
    }

    /// Dwell progress in 0..1 for the reticle.
    pub fn fuse_progress(&self) -> f32 {
        if self.hovered.is_none() || self.cfg.fuse_secs <= 0.0 {
            return 0.0;
        }
        (self.dwell / self.cfg.fuse_secs).clamp(0.0, 1.0)
    }

    fn projected_radius(&self, target: &HotspotTarget, camera: &Camera, height: f32) -> f32 {
        let half = (camera.fov_y.to_radians() * 0.5).tan();
        let dist = target.center.length().max(1e-3);
        target.visual_radius / (dist * half) * height * 0.5
    }

    /// Visible markers in screen space.
    pub fn markers(&self, camera: &Camera, width: f32, height: f32) -> Vec<Marker> {
        self.targets
            .iter()
            .enumerate()
            .filter_map(|(i, t)| {
                let position = camera.project(t.center, width, height)?;
                Some(Marker {
                    index: i,
                    position,
                    radius: self.projected_radius(t, camera, height),
                    hovered: self.hovered == Some(i),
                })
            })
            .collect()
    }

    /// Where to anchor a label: just above the projected marker.
    pub fn label_anchor(
        &self,
        index: usize,
        camera: &Camera,
        width: f32,
        height: f32,
    ) -> Option<Vec2> {
        let t = self.targets.get(index)?;
        let p = camera.project(t.center, width, height)?;
        let r = self.projected_radius(t, camera, height);
        Some(Vec2::new(p.x, p.y - r - 12.0))
    }
}
