// ui.rs — 菜单、场景列表、状态栏以及热点/准星叠加层

use egui::{Align2, Color32, FontId, LayerId, Pos2, Stroke};
use panorama_tour::i18n::{self, tr, tr_with};
use panorama_tour::{FrameState, Mode, TourViewer};

/// What the user asked for this frame; applied by the event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    OpenTour,
    BuiltinTour,
    Exit,
    Previous,
    Next,
    GoTo(usize),
    SetMode(Mode),
    ToggleAutoTour,
    ResetView,
    ToggleFullscreen,
    SetLanguage(String),
    SetSensitivity(f32),
    AnswerPermission(bool),
}

pub struct UiState {
    pub show_scenes: bool,
    pub show_fps: bool,
    pub fps: f32,
    pub loading: bool,
    pub fullscreen: bool,
    pub permission_pending: bool,
    pub lang: String,
    pub message: Option<String>,
}

impl UiState {
    pub fn new(lang: String) -> Self {
        Self {
            show_scenes: true,
            show_fps: false,
            fps: 0.0,
            loading: false,
            fullscreen: false,
            permission_pending: false,
            lang,
            message: None,
        }
    }
}

fn mode_label(mode: Mode) -> String {
    match mode {
        Mode::Normal => tr("mode.normal"),
        Mode::Gyro => tr("mode.gyro"),
        Mode::Vr => tr("mode.vr"),
    }
}

pub fn draw_ui(
    ctx: &egui::Context,
    viewer: &TourViewer,
    frame: &FrameState,
    state: &mut UiState,
) -> Vec<UiAction> {
    let mut actions = Vec::new();

    // vr keeps the screen clear apart from the per-eye overlay
    if frame.mode != Mode::Vr {
        menu_bar(ctx, viewer, frame, state, &mut actions);
        if state.show_scenes {
            scene_list(ctx, viewer, frame, &mut actions);
        }
        status_bar(ctx, viewer, frame, state);
    }
    permission_prompt(ctx, state, &mut actions);
    overlay(ctx, viewer, frame);

    actions
}

fn menu_bar(
    ctx: &egui::Context,
    viewer: &TourViewer,
    frame: &FrameState,
    state: &mut UiState,
    actions: &mut Vec<UiAction>,
) {
    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.menu_button(tr("menu.tour"), |ui| {
                if ui.button(tr("menu.tour.open")).clicked() {
                    actions.push(UiAction::OpenTour);
                    ui.close_menu();
                }
                if ui.button(tr("menu.tour.builtin")).clicked() {
                    actions.push(UiAction::BuiltinTour);
                    ui.close_menu();
                }
                ui.separator();
                if ui.button(tr("menu.tour.prev")).clicked() {
                    actions.push(UiAction::Previous);
                }
                if ui.button(tr("menu.tour.next")).clicked() {
                    actions.push(UiAction::Next);
                }
                ui.checkbox(&mut state.show_scenes, tr("menu.tour.scenes"));
                ui.separator();
                if ui.button(tr("menu.tour.exit")).clicked() {
                    actions.push(UiAction::Exit);
                }
            });

            ui.menu_button(tr("menu.mode"), |ui| {
                for mode in [Mode::Normal, Mode::Gyro, Mode::Vr] {
                    let label = tr(&format!("menu.mode.{}", mode_key(mode)));
                    if ui.radio(frame.mode == mode, label).clicked() {
                        actions.push(UiAction::SetMode(mode));
                        ui.close_menu();
                    }
                }
                ui.separator();
                let can_tour = frame.mode != Mode::Gyro;
                let mut on = frame.auto_tour;
                if ui
                    .add_enabled(can_tour, egui::Checkbox::new(&mut on, tr("menu.mode.autotour")))
                    .clicked()
                {
                    actions.push(UiAction::ToggleAutoTour);
                }
            });

            ui.menu_button(tr("menu.view"), |ui| {
                if ui.button(tr("menu.view.reset")).clicked() {
                    actions.push(UiAction::ResetView);
                    ui.close_menu();
                }
                let mut fs = state.fullscreen;
                if ui.checkbox(&mut fs, tr("menu.view.fullscreen")).clicked() {
                    actions.push(UiAction::ToggleFullscreen);
                }
                ui.separator();
                let mut s = viewer.sensitivity();
                if ui
                    .add(egui::Slider::new(&mut s, 0.1..=5.0).text(tr("menu.view.sensitivity")))
                    .changed()
                {
                    actions.push(UiAction::SetSensitivity(s));
                }
                ui.checkbox(&mut state.show_fps, "FPS");
            });

            ui.menu_button(tr("menu.language"), |ui| {
                for (code, name) in i18n::LANGUAGES {
                    if ui.radio(state.lang == *code, *name).clicked() {
                        actions.push(UiAction::SetLanguage(code.to_string()));
                        ui.close_menu();
                    }
                }
            });

            ui.separator();
            if ui.button("◀").clicked() {
                actions.push(UiAction::Previous);
            }
            if ui.button("▶").clicked() {
                actions.push(UiAction::Next);
            }
        });
    });
}

fn mode_key(mode: Mode) -> &'static str {
    match mode {
        Mode::Normal => "normal",
        Mode::Gyro => "gyro",
        Mode::Vr => "vr",
    }
}

fn scene_list(
    ctx: &egui::Context,
    viewer: &TourViewer,
    frame: &FrameState,
    actions: &mut Vec<UiAction>,
) {
    egui::SidePanel::left("scene_list")
        .resizable(true)
        .default_width(200.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                for (i, scene) in viewer.tour().list_scenes().iter().enumerate() {
                    let selected = i == frame.scene;
                    if ui.selectable_label(selected, scene.title.as_str()).clicked() && !selected {
                        actions.push(UiAction::GoTo(i));
                    }
                    if let Some(sub) = &scene.subtitle {
                        ui.label(egui::RichText::new(sub.as_str()).small().weak());
                    }
                }
            });
        });
}

fn status_bar(ctx: &egui::Context, viewer: &TourViewer, frame: &FrameState, state: &UiState) {
    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if state.loading || frame.blending {
                ui.label(egui::RichText::new(tr("status.loading")).color(Color32::YELLOW));
                ui.label("|");
            }
            if let Some(scene) = viewer.tour().scene_at(frame.scene) {
                ui.label(tr_with(
                    "status.scene",
                    &[
                        ("index", (frame.scene + 1).to_string()),
                        ("count", viewer.tour().len().to_string()),
                        ("title", scene.title.clone()),
                    ],
                ));
                ui.label("|");
            }
            ui.label(mode_label(frame.mode));
            ui.label("|");
            ui.label(tr_with(
                "status.view",
                &[
                    ("yaw", format!("{:.1}", frame.yaw.rem_euclid(360.0))),
                    ("pitch", format!("{:.1}", frame.pitch)),
                    ("fov", format!("{:.1}", frame.fov)),
                ],
            ));
            if frame.auto_tour {
                ui.label("|");
                ui.label(egui::RichText::new(tr("status.autotour")).color(Color32::LIGHT_BLUE));
            }
            if frame.permission_denied {
                ui.label("|");
                ui.label(
                    egui::RichText::new(tr("status.permission_denied")).color(Color32::LIGHT_RED),
                );
            }
            if let Some(msg) = &state.message {
                ui.label("|");
                ui.label(egui::RichText::new(msg.as_str()).color(Color32::LIGHT_RED));
            }
            if state.show_fps {
                ui.label("|");
                let fps = tr_with("status.fps", &[("fps", format!("{:.1}", state.fps))]);
                ui.label(egui::RichText::new(fps).color(Color32::GREEN));
            }
        });
    });
}

fn permission_prompt(ctx: &egui::Context, state: &UiState, actions: &mut Vec<UiAction>) {
    if !state.permission_pending {
        return;
    }
    egui::Window::new(tr("menu.mode.gyro"))
        .collapsible(false)
        .resizable(false)
        .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label(tr("status.permission_pending"));
            ui.horizontal(|ui| {
                if ui.button("✔").clicked() {
                    actions.push(UiAction::AnswerPermission(true));
                }
                if ui.button("✖").clicked() {
                    actions.push(UiAction::AnswerPermission(false));
                }
            });
        });
}

/// Hotspot markers, hover label and gaze reticle, drawn under the panels.
/// Frame geometry is in physical pixels; egui paints in points.
fn overlay(ctx: &egui::Context, viewer: &TourViewer, frame: &FrameState) {
    let painter = ctx.layer_painter(LayerId::background());
    let scale = 1.0 / ctx.pixels_per_point();
    let eyes: &[f32] = if frame.mode.is_stereo() {
        &[0.0, frame.eye.x]
    } else {
        &[0.0]
    };
    let to_pos = |x: f32, y: f32| Pos2::new(x * scale, y * scale);

    for &offset in eyes {
        for m in &frame.markers {
            let center = to_pos(m.position.x + offset, m.position.y);
            let r = (m.radius * scale).clamp(6.0, 80.0);
            let fill = if m.hovered {
                Color32::from_rgba_unmultiplied(255, 255, 255, 140)
            } else {
                Color32::from_rgba_unmultiplied(255, 255, 255, 60)
            };
            painter.circle(center, r, fill, Stroke::new(2.0, Color32::WHITE));
        }

        if let Some(label) = &frame.label {
            painter.text(
                to_pos(label.position.x + offset, label.position.y),
                Align2::CENTER_BOTTOM,
                &label.text,
                FontId::proportional(18.0),
                Color32::WHITE,
            );
        }

        if let Some(progress) = frame.reticle {
            let c = to_pos(offset + frame.eye.x * 0.5, frame.eye.y * 0.5);
            painter.circle_stroke(c, 10.0, Stroke::new(2.0, Color32::WHITE));
            if progress > 0.0 {
                painter.circle_filled(c, 10.0 * progress, Color32::from_rgb(80, 200, 255));
            }
        }
    }

    if frame.mode == Mode::Normal && !frame.blending {
        if let Some(scene) = viewer.tour().scene_at(frame.scene) {
            if let Some(sub) = &scene.subtitle {
                let rect = ctx.available_rect();
                painter.text(
                    Pos2::new(rect.center().x, rect.bottom() - 40.0),
                    Align2::CENTER_BOTTOM,
                    sub,
                    FontId::proportional(16.0),
                    Color32::from_white_alpha(220),
                );
            }
        }
    } else if frame.mode == Mode::Gyro && frame.markers.is_empty() && !frame.blending {
        let rect = ctx.screen_rect();
        painter.text(
            Pos2::new(rect.center().x, rect.bottom() - 60.0),
            Align2::CENTER_BOTTOM,
            tr("hint.gaze"),
            FontId::proportional(14.0),
            Color32::from_white_alpha(200),
        );
    }
}
