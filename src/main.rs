// main.rs — 窗口、事件循环，以及导览核心与渲染/加载之间的连接

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod loader;
mod platform;
mod renderer;
mod ui;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use loader::ThreadLoader;
use panorama_tour::events::ImageOutcome;
use panorama_tour::i18n::{self, tr, tr_with};
use panorama_tour::{
    LaunchOptions, Mode, NavigationOrigin, TourGraph, TourViewer, ViewerConfig, ViewerEvent,
};
use platform::{EmulatedMotion, WindowPresentation};
use renderer::Renderer;
use ui::{UiAction, UiState};

use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Window, WindowBuilder},
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = LaunchOptions::from_env();
    i18n::init(opts.lang.clone());

    let cfg = match &opts.config {
        Some(path) => ViewerConfig::load(path).unwrap_or_else(|e| {
            log::error!("{e}; using default settings");
            ViewerConfig::default()
        }),
        None => ViewerConfig::default(),
    };

    let tour = match initial_tour(opts.tour.as_deref()) {
        Ok(t) => t,
        Err(e) => {
            log::error!("cannot start: {e}");
            std::process::exit(1);
        }
    };

    let event_loop = EventLoop::new();
    let window = match WindowBuilder::new()
        .with_title(tr("app.title"))
        .with_inner_size(LogicalSize::new(1280, 720))
        .build(&event_loop)
    {
        Ok(w) => Arc::new(w),
        Err(e) => {
            log::error!("cannot open window: {e}");
            std::process::exit(1);
        }
    };

    let renderer = match pollster::block_on(Renderer::new(window.clone())) {
        Ok(r) => r,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    let mut app = App::new(window, renderer, tour, cfg, &opts);

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;
        match event {
            Event::WindowEvent { event, .. } => {
                if app.window_event(event) {
                    *control_flow = ControlFlow::Exit;
                }
            }
            Event::RedrawRequested(_) => {
                if app.redraw() {
                    *control_flow = ControlFlow::Exit;
                }
            }
            Event::MainEventsCleared => app.window.request_redraw(),
            _ => {}
        }
    });
}

/// The tour named on the command line, or the built-in one if it cannot be read.
fn initial_tour(path: Option<&Path>) -> Result<TourGraph, panorama_tour::TourError> {
    if let Some(path) = path {
        match TourGraph::load(path) {
            Ok(t) => return Ok(t),
            Err(e) => log::error!("{e}; falling back to the built-in tour"),
        }
    }
    TourGraph::builtin()
}

struct App {
    window: Arc<Window>,
    renderer: Renderer,
    viewer: TourViewer,
    cfg: ViewerConfig,
    loader: ThreadLoader,
    presentation: WindowPresentation,
    motion: EmulatedMotion,
    ui: UiState,

    started: Instant,
    last_tick: Instant,
    cursor: PhysicalPosition<f64>,
    touch: Option<u64>,

    fps_window_start: Instant,
    frame_count: u32,
}

impl App {
    fn new(
        window: Arc<Window>,
        renderer: Renderer,
        tour: TourGraph,
        cfg: ViewerConfig,
        opts: &LaunchOptions,
    ) -> Self {
        let mut viewer = TourViewer::new(tour, cfg);
        viewer.resize(renderer.size.width as f32, renderer.size.height as f32);
        let now = Instant::now();
        Self {
            presentation: WindowPresentation::new(window.clone()),
            motion: EmulatedMotion::new(opts.motion),
            ui: UiState::new(opts.lang.clone()),
            window,
            renderer,
            viewer,
            cfg,
            loader: ThreadLoader::new(),
            started: now,
            last_tick: now,
            cursor: PhysicalPosition::new(0.0, 0.0),
            touch: None,
            fps_window_start: now,
            frame_count: 0,
        }
    }

    fn clock(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Returns true when the app should exit.
    fn window_event(&mut self, event: WindowEvent) -> bool {
        let response = self.renderer.egui_state.on_event(&self.renderer.egui_ctx, &event);
        let released = matches!(
            event,
            WindowEvent::MouseInput {
                state: ElementState::Released,
                ..
            }
        );
        // a drag that ends over a panel still has to be released
        if response.consumed && !released {
            return false;
        }

        let now = self.clock();
        match event {
            WindowEvent::CloseRequested => return true,

            WindowEvent::Resized(size) => self.resize(size),
            WindowEvent::ScaleFactorChanged { new_inner_size, .. } => self.resize(*new_inner_size),

            WindowEvent::KeyboardInput { input, .. } => {
                let pressed = input.state == ElementState::Pressed;
                if let Some(key) = input.virtual_keycode {
                    if self.motion.key(key, pressed) || !pressed {
                        return false;
                    }
                    return self.key(key);
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = position;
                self.viewer
                    .pointer_moved(position.x as f32, position.y as f32, now);
            }
            WindowEvent::CursorLeft { .. } => self.viewer.pointer_left(),
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    self.viewer
                        .pointer_pressed(self.cursor.x as f32, self.cursor.y as f32, now)
                }
                ElementState::Released => self.viewer.pointer_released(now),
            },

            WindowEvent::Touch(touch) => self.touch(touch, now),

            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 20.0,
                };
                self.viewer.zoom(scroll);
            }

            WindowEvent::DroppedFile(path) => {
                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    self.open_tour(&path);
                } else {
                    log::warn!("ignoring dropped file {}", path.display());
                }
            }

            _ => {}
        }
        false
    }

    fn resize(&mut self, size: winit::dpi::PhysicalSize<u32>) {
        self.renderer.resize(size);
        self.viewer.resize(size.width as f32, size.height as f32);
    }

    // Single-finger touch behaves like the mouse; extra fingers are ignored.
    fn touch(&mut self, touch: Touch, now: f64) {
        let (x, y) = (touch.location.x as f32, touch.location.y as f32);
        match touch.phase {
            TouchPhase::Started if self.touch.is_none() => {
                self.touch = Some(touch.id);
                self.viewer.pointer_moved(x, y, now);
                self.viewer.pointer_pressed(x, y, now);
            }
            TouchPhase::Moved if self.touch == Some(touch.id) => {
                self.viewer.pointer_moved(x, y, now);
            }
            TouchPhase::Ended if self.touch == Some(touch.id) => {
                self.touch = None;
                self.viewer.pointer_released(now);
                self.viewer.pointer_left();
            }
            TouchPhase::Cancelled if self.touch == Some(touch.id) => {
                self.touch = None;
                self.viewer.pointer_left();
            }
            _ => {}
        }
    }

    fn key(&mut self, key: VirtualKeyCode) -> bool {
        let action = match key {
            VirtualKeyCode::O => UiAction::OpenTour,
            VirtualKeyCode::F11 => UiAction::ToggleFullscreen,
            VirtualKeyCode::Left => UiAction::Previous,
            VirtualKeyCode::Right => UiAction::Next,
            VirtualKeyCode::Space => UiAction::ToggleAutoTour,
            VirtualKeyCode::R => UiAction::ResetView,
            VirtualKeyCode::N | VirtualKeyCode::Escape => UiAction::SetMode(Mode::Normal),
            VirtualKeyCode::G => UiAction::SetMode(Mode::Gyro),
            VirtualKeyCode::V => UiAction::SetMode(Mode::Vr),
            VirtualKeyCode::Return => {
                self.viewer.select_center();
                return false;
            }
            _ => return false,
        };
        self.apply(action)
    }

    fn open_tour(&mut self, path: &Path) {
        match TourGraph::load(path) {
            Ok(tour) => {
                self.ui.message = None;
                self.replace_tour(tour);
            }
            Err(e) => {
                log::error!("{e}");
                self.ui.message = Some(tr_with("status.tour_failed", &[("error", e.to_string())]));
            }
        }
    }

    fn replace_tour(&mut self, tour: TourGraph) {
        self.viewer
            .switch_mode(Mode::Normal, &mut self.motion, &mut self.presentation);
        self.loader.cancel_all();
        self.renderer.clear_staged();
        self.viewer = TourViewer::succeeding(&self.viewer, tour, self.cfg);
        self.viewer.resize(
            self.renderer.size.width as f32,
            self.renderer.size.height as f32,
        );
        self.ui.permission_pending = false;
    }

    /// Returns true when the app should exit.
    fn apply(&mut self, action: UiAction) -> bool {
        match action {
            UiAction::OpenTour => {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter(tr("dialog.tour_filter"), &["json"])
                    .pick_file()
                {
                    self.open_tour(&path);
                }
            }
            UiAction::BuiltinTour => match TourGraph::builtin() {
                Ok(t) => self.replace_tour(t),
                Err(e) => log::error!("{e}"),
            },
            UiAction::Exit => return true,
            UiAction::Previous => {
                self.viewer.previous_scene();
            }
            UiAction::Next => {
                self.viewer.next_scene();
            }
            UiAction::GoTo(i) => {
                self.viewer.navigate_to_index(i, NavigationOrigin::User);
            }
            UiAction::SetMode(mode) => {
                let result = self
                    .viewer
                    .switch_mode(mode, &mut self.motion, &mut self.presentation);
                log::debug!("switch to {mode}: {result:?}");
            }
            UiAction::ToggleAutoTour => {
                self.viewer.toggle_auto_tour();
            }
            UiAction::ResetView => self.viewer.reset_view(),
            UiAction::ToggleFullscreen => self.presentation.toggle_fullscreen(),
            UiAction::SetLanguage(code) => {
                i18n::init(code.clone());
                self.ui.lang = code;
                self.update_title();
            }
            UiAction::SetSensitivity(s) => self.viewer.set_sensitivity(s),
            UiAction::AnswerPermission(granted) => {
                self.ui.permission_pending = false;
                self.viewer.permission_resolved(granted, &mut self.motion);
            }
        }
        self.ui.fullscreen = self.presentation.is_fullscreen();
        false
    }

    fn update_title(&self) {
        let title = match self.viewer.tour().scene_at(self.viewer.current_scene()) {
            Some(scene) if !self.viewer.is_blending() => {
                format!("{} · {}", scene.title, tr("app.title"))
            }
            _ => tr("app.title"),
        };
        self.window.set_title(&title);
    }

    fn poll_loader(&mut self) {
        while let Some(done) = self.loader.poll() {
            let ok = done.image.is_ok();
            if !self.viewer.image_loaded(done.token, ok) {
                continue;
            }
            match done.image {
                Ok(img) => self.renderer.stage(done.token, img),
                Err(_) => {
                    self.ui.message = Some(tr_with(
                        "status.load_failed",
                        &[("path", done.path.display().to_string())],
                    ));
                }
            }
        }
    }

    fn handle_viewer_events(&mut self) {
        for stamped in self.viewer.drain_events() {
            match stamped.event {
                ViewerEvent::LoadRequested { token, path } => self.loader.request(token, path),
                ViewerEvent::LoadCancelled { token } => {
                    self.loader.cancel(token);
                    self.renderer.discard_staged(token);
                }
                ViewerEvent::PanoramaSwap { token, image } => {
                    if self.renderer.swap_to_staged(token) {
                        self.ui.message = None;
                    } else if image == ImageOutcome::TimedOut {
                        log::warn!("showing placeholder for transition {token}");
                    }
                }
                ViewerEvent::SceneChanged { .. } => self.update_title(),
                ViewerEvent::PermissionPending { .. } => self.ui.permission_pending = true,
                ViewerEvent::PermissionDenied { .. } | ViewerEvent::ModeChanged { .. } => {
                    self.ui.permission_pending = false;
                    self.ui.fullscreen = self.presentation.is_fullscreen();
                }
                _ => {}
            }
        }
    }

    /// Returns true when the app should exit.
    fn redraw(&mut self) -> bool {
        let now = Instant::now();
        let dt = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;

        self.frame_count += 1;
        let window_secs = now.duration_since(self.fps_window_start).as_secs_f32();
        if window_secs >= 1.0 {
            self.ui.fps = self.frame_count as f32 / window_secs;
            self.frame_count = 0;
            self.fps_window_start = now;
        }

        if let Some(sample) = self.motion.poll_sample(dt) {
            self.viewer.device_orientation(sample);
        }
        self.poll_loader();
        self.viewer.tick(dt);
        self.handle_viewer_events();
        self.ui.loading = self.loader.is_loading();

        let frame = self.viewer.frame();
        self.renderer.update_camera(&frame);

        let mut actions = Vec::new();
        let viewer = &self.viewer;
        let ui_state = &mut self.ui;
        let result = self.renderer.render_with_ui(&self.window, |ctx| {
            actions = ui::draw_ui(ctx, viewer, &frame, ui_state);
        });

        match result {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost) => self.renderer.resize(self.renderer.size),
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("GPU out of memory");
                return true;
            }
            Err(e) => log::warn!("render error: {e:?}"),
        }

        actions.into_iter().any(|a| self.apply(a))
    }
}
