// i18n.rs — 运行时多语言文案
//
// Strings come from, in order:
//   1) assets/i18n/<lang>.json          ({ "key": "value" })
//   2) assets/i18n.json                 ({ "<lang>": { "key": "value" } })
//   3) the built-in English table
// Lookup: tr("key") / tr_with("key", &[("name", ...)]) with {name} placeholders.
// Language comes from --lang or TOUR_LANG (see LaunchOptions).

use once_cell::sync::{Lazy, OnceCell};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

pub const DEFAULT_LANG: &str = "en";

/// Languages offered in the language menu: (code, native name).
pub const LANGUAGES: &[(&str, &str)] = &[("en", "English"), ("zh-Hans", "简体中文")];

static BUILTIN: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("app.title", "Panorama Tour"),
        ("menu.tour", "Tour"),
        ("menu.tour.open", "Open tour…"),
        ("menu.tour.builtin", "Built-in tour"),
        ("menu.tour.prev", "Previous scene"),
        ("menu.tour.next", "Next scene"),
        ("menu.tour.scenes", "Scene list"),
        ("menu.tour.exit", "Exit"),
        ("menu.mode", "Mode"),
        ("menu.mode.normal", "Normal"),
        ("menu.mode.gyro", "Gyroscope"),
        ("menu.mode.vr", "VR"),
        ("menu.mode.autotour", "Auto tour"),
        ("menu.view", "View"),
        ("menu.view.reset", "Reset view"),
        ("menu.view.fullscreen", "Fullscreen (F11)"),
        ("menu.view.sensitivity", "Sensitivity"),
        ("menu.view.fov", "FOV"),
        ("menu.language", "Language"),
        ("mode.normal", "Normal"),
        ("mode.gyro", "Gyro"),
        ("mode.vr", "VR"),
        ("status.scene", "{index}/{count} {title}"),
        ("status.view", "Yaw {yaw}°  Pitch {pitch}°  FOV {fov}°"),
        ("status.loading", "Loading…"),
        ("status.fps", "FPS {fps}"),
        ("status.autotour", "Auto tour"),
        ("status.permission_denied", "Motion permission denied"),
        ("status.permission_pending", "Waiting for motion permission…"),
        ("status.load_failed", "Could not load panorama: {path}"),
        ("status.tour_failed", "Could not open tour: {error}"),
        ("hint.empty", "Drop a tour .json here or use Tour → Open"),
        ("hint.gaze", "Look at a marker to move"),
        ("dialog.tour_filter", "Tour description"),
    ])
});

#[derive(Debug, Clone)]
pub struct I18n {
    pub lang: String,
    map: HashMap<String, String>,
}

static I18N: OnceCell<RwLock<I18n>> = OnceCell::new();

fn load_json_map(path: &Path) -> Option<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(map) => Some(map),
        Err(e) => {
            log::warn!("ignoring malformed string table {}: {e}", path.display());
            None
        }
    }
}

fn load_multi_lang_json(path: &Path, lang: &str) -> Option<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).ok()?;
    let mut all: HashMap<String, HashMap<String, String>> = serde_json::from_str(&text).ok()?;
    all.remove(lang)
}

/// Look for `assets/<rel>` next to the executable, then under the working dir.
fn find_asset(rel: &Path) -> Option<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    exe_dir
        .into_iter()
        .chain(std::iter::once(PathBuf::new()))
        .map(|base| base.join("assets").join(rel))
        .find(|p| p.exists())
}

fn load_lang(lang: &str) -> HashMap<String, String> {
    let per_lang = Path::new("i18n").join(format!("{lang}.json"));
    if let Some(m) = find_asset(&per_lang).and_then(|p| load_json_map(&p)) {
        return m;
    }
    if let Some(m) =
        find_asset(Path::new("i18n.json")).and_then(|p| load_multi_lang_json(&p, lang))
    {
        return m;
    }
    if lang != DEFAULT_LANG {
        log::info!("no string table for `{lang}`, using English");
    }
    HashMap::new()
}

/// Initialize global i18n. Safe to call again to switch language at runtime.
pub fn init(lang: impl Into<String>) {
    let lang = lang.into();
    let map = load_lang(&lang);
    let i = I18n { lang, map };

    if let Some(lock) = I18N.get() {
        if let Ok(mut w) = lock.write() {
            *w = i;
        }
    } else {
        let _ = I18N.set(RwLock::new(i));
    }
}

pub fn current_lang() -> String {
    I18N.get()
        .and_then(|l| l.read().ok().map(|i| i.lang.clone()))
        .unwrap_or_else(|| DEFAULT_LANG.to_string())
}

/// Localized text for `key`. Missing keys fall back to English, then to the key.
pub fn tr(key: &str) -> String {
    let loaded = I18N
        .get()
        .and_then(|l| l.read().ok())
        .and_then(|i| i.map.get(key).cloned());
    loaded
        .or_else(|| BUILTIN.get(key).map(|s| s.to_string()))
        .unwrap_or_else(|| key.to_string())
}

/// `tr` plus `{name}` substitution. Unknown placeholders are left as-is.
pub fn tr_with(key: &str, args: &[(&str, String)]) -> String {
    let mut s = tr(key);
    for (k, v) in args {
        s = s.replace(&format!("{{{k}}}"), v);
    }
    s
}
