// tour.rs — 场景图：全景节点与热点连接

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TourError;

const BUILTIN_TOUR: &str = include_str!("../assets/tour.json");

/// A viewing direction in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewAngles {
    pub yaw: f32,
    pub pitch: f32,
}

impl ViewAngles {
    pub const fn new(yaw: f32, pitch: f32) -> Self {
        Self { yaw, pitch }
    }
}

/// Directional link from one scene to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub yaw: f32,
    pub pitch: f32,
    #[serde(alias = "sceneId")]
    pub target_scene_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Hotspot {
    pub fn new(yaw: f32, pitch: f32, target: impl Into<String>) -> Self {
        Self {
            yaw,
            pitch,
            target_scene_id: target.into(),
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// One equirectangular panorama node of the tour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_view: Option<ViewAngles>,
    #[serde(default, rename = "hotSpots")]
    pub hotspots: Vec<Hotspot>,
}

impl Scene {
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subtitle: None,
            url: url.into(),
            initial_view: None,
            hotspots: Vec::new(),
        }
    }

    pub fn with_initial_view(mut self, yaw: f32, pitch: f32) -> Self {
        self.initial_view = Some(ViewAngles::new(yaw, pitch));
        self
    }

    pub fn with_hotspot(mut self, hotspot: Hotspot) -> Self {
        self.hotspots.push(hotspot);
        self
    }

    /// Orientation the camera settles on when entering this scene.
    /// Unclamped; the orientation state clamps pitch when it is applied.
    pub fn entry_view(&self) -> ViewAngles {
        self.initial_view.unwrap_or_default()
    }
}

/// Immutable, ordered collection of scenes with id lookup.
#[derive(Debug, Clone)]
pub struct TourGraph {
    scenes: Vec<Scene>,
    by_id: HashMap<String, usize>,
    base_dir: Option<PathBuf>,
}

impl TourGraph {
    pub fn new(scenes: Vec<Scene>) -> Result<Self, TourError> {
        if scenes.is_empty() {
            return Err(TourError::EmptyTour);
        }

        let mut by_id = HashMap::with_capacity(scenes.len());
        for (i, scene) in scenes.iter().enumerate() {
            if scene.id.trim().is_empty() {
                return Err(TourError::EmptySceneId(i));
            }
            if by_id.insert(scene.id.clone(), i).is_some() {
                return Err(TourError::DuplicateScene(scene.id.clone()));
            }
        }

        // Dangling links are tolerated: hitting one is a no-op navigation.
        for scene in &scenes {
            for hs in &scene.hotspots {
                if !by_id.contains_key(&hs.target_scene_id) {
                    log::warn!(
                        "scene `{}` links to unknown scene `{}`",
                        scene.id,
                        hs.target_scene_id
                    );
                }
            }
        }

        Ok(Self {
            scenes,
            by_id,
            base_dir: None,
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self, TourError> {
        let scenes: Vec<Scene> = serde_json::from_str(text)?;
        Self::new(scenes)
    }

    /// Load a tour file. Image urls are resolved relative to its directory.
    pub fn load(path: &Path) -> Result<Self, TourError> {
        let text = std::fs::read_to_string(path).map_err(|source| TourError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut graph = Self::from_json_str(&text)?;
        graph.base_dir = path.parent().map(Path::to_path_buf);
        log::info!("loaded tour {:?} ({} scenes)", path, graph.len());
        Ok(graph)
    }

    /// The tour shipped with the viewer. Images are looked up next to the
    /// executable first, then under the working directory.
    pub fn builtin() -> Result<Self, TourError> {
        let mut graph = Self::from_json_str(BUILTIN_TOUR)?;
        graph.base_dir = Some(builtin_base_dir());
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn get_scene(&self, id: &str) -> Option<&Scene> {
        self.by_id.get(id).map(|&i| &self.scenes[i])
    }

    pub fn list_scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scene_at(&self, index: usize) -> Option<&Scene> {
        self.scenes.get(index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn wrap_index(&self, index: isize) -> usize {
        let n = self.scenes.len() as isize;
        (((index % n) + n) % n) as usize
    }

    pub fn next_index(&self, index: usize) -> usize {
        self.wrap_index(index as isize + 1)
    }

    pub fn previous_index(&self, index: usize) -> usize {
        self.wrap_index(index as isize - 1)
    }

    /// Hotspots shown for the scene at `index`. A scene without configured
    /// links gets one forward hotspot to the next scene in list order.
    pub fn hotspots_at(&self, index: usize) -> Cow<'_, [Hotspot]> {
        let Some(scene) = self.scenes.get(index) else {
            return Cow::Borrowed(&[]);
        };
        if !scene.hotspots.is_empty() {
            return Cow::Borrowed(&scene.hotspots);
        }
        let next = &self.scenes[self.next_index(index)];
        Cow::Owned(vec![Hotspot::new(0.0, 0.0, next.id.clone())])
    }

    /// Filesystem location of a scene's panorama. A leading `/` in the url
    /// is relative to the tour root, as on the web server it came from.
    pub fn image_path(&self, scene: &Scene) -> PathBuf {
        let rel = scene.url.trim_start_matches('/');
        match &self.base_dir {
            Some(dir) => dir.join(rel),
            None => PathBuf::from(rel),
        }
    }
}

fn builtin_base_dir() -> PathBuf {
    let exe_assets = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|d| d.join("assets")));
    match exe_assets {
        Some(dir) if dir.exists() => dir,
        _ => PathBuf::from("assets"),
    }
}
