// loader.rs — 后台线程解码全景图，按切换令牌标记结果

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

use image::io::Reader as ImageReader;
use image::GenericImageView;

pub struct Loaded {
    pub token: u64,
    pub path: PathBuf,
    pub image: Result<image::RgbaImage, String>,
}

/// One decode thread per request; results come back over a channel and are
/// dropped if their token was cancelled in the meantime.
pub struct ThreadLoader {
    tx: Sender<Loaded>,
    rx: Receiver<Loaded>,
    in_flight: HashSet<u64>,
}

impl ThreadLoader {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            tx,
            rx,
            in_flight: HashSet::new(),
        }
    }

    pub fn is_loading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn request(&mut self, token: u64, path: PathBuf) {
        self.in_flight.insert(token);
        let tx = self.tx.clone();
        thread::spawn(move || {
            log::info!("loading panorama {}", path.display());
            let image = decode(&path);
            if let Err(e) = &image {
                log::error!("panorama {} failed: {e}", path.display());
            }
            // receiver gone means the window closed
            let _ = tx.send(Loaded { token, path, image });
        });
    }

    pub fn cancel(&mut self, token: u64) {
        if self.in_flight.remove(&token) {
            log::debug!("load {token} cancelled");
        }
    }

    pub fn cancel_all(&mut self) {
        self.in_flight.clear();
    }

    /// Next finished load that is still wanted.
    pub fn poll(&mut self) -> Option<Loaded> {
        while let Ok(done) = self.rx.try_recv() {
            if self.in_flight.remove(&done.token) {
                return Some(done);
            }
            log::debug!("dropping stale panorama {}", done.path.display());
        }
        None
    }
}

impl Default for ThreadLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(path: &Path) -> Result<image::RgbaImage, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let img = ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)
        .and_then(|mut r| {
            r.no_limits();
            r.decode()
        })
        .map_err(|e| e.to_string())?;
    let (w, h) = img.dimensions();
    log::info!("decoded {}x{} from {}", w, h, path.display());
    Ok(img.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait(loader: &mut ThreadLoader) -> Option<Loaded> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(done) = loader.poll() {
                return Some(done);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn missing_file_reports_error() {
        let mut loader = ThreadLoader::new();
        loader.request(7, PathBuf::from("definitely/not/here.jpg"));
        let done = wait(&mut loader).expect("no result");
        assert_eq!(done.token, 7);
        assert!(done.image.is_err());
        assert!(!loader.is_loading());
    }

    #[test]
    fn decodes_png() {
        let path = std::env::temp_dir().join(format!("tour-loader-{}.png", std::process::id()));
        image::RgbaImage::from_pixel(4, 2, image::Rgba([9, 8, 7, 255]))
            .save(&path)
            .unwrap();
        let mut loader = ThreadLoader::new();
        loader.request(1, path.clone());
        let done = wait(&mut loader).expect("no result");
        let img = done.image.unwrap();
        assert_eq!(img.dimensions(), (4, 2));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn cancelled_result_is_dropped() {
        let mut loader = ThreadLoader::new();
        loader.request(3, PathBuf::from("missing-a.jpg"));
        loader.cancel(3);
        loader.request(4, PathBuf::from("missing-b.jpg"));
        let done = wait(&mut loader).expect("no result");
        assert_eq!(done.token, 4);
    }
}
