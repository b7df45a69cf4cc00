use approx::assert_abs_diff_eq;
use panorama_tour::error::PlatformError;
use panorama_tour::events::StopReason;
use panorama_tour::input::DeviceSample;
use panorama_tour::mode::{MotionSensor, Permission, Presentation};
use panorama_tour::orientation::PITCH_LIMIT;
use panorama_tour::{
    Hotspot, Mode, NavigationOrigin, Scene, Stamped, Switch, TourGraph, TourViewer, ViewerConfig,
    ViewerEvent,
};

const DT: f32 = 1.0 / 60.0;

struct Motion {
    answer: Permission,
    subscribed: bool,
}

impl Motion {
    fn answering(answer: Permission) -> Self {
        Self {
            answer,
            subscribed: false,
        }
    }
}

impl MotionSensor for Motion {
    fn request_permission(&mut self) -> Permission {
        self.answer
    }
    fn subscribe(&mut self) -> Result<(), PlatformError> {
        self.subscribed = true;
        Ok(())
    }
    fn unsubscribe(&mut self) {
        self.subscribed = false;
    }
}

#[derive(Default)]
struct Screen {
    fullscreen: bool,
}

impl Presentation for Screen {
    fn enter_fullscreen(&mut self) -> Result<(), PlatformError> {
        self.fullscreen = true;
        Ok(())
    }
    fn exit_fullscreen(&mut self) {
        self.fullscreen = false;
    }
    fn lock_landscape(&mut self) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported("orientation lock"))
    }
    fn unlock_orientation(&mut self) {}
}

fn small_tour() -> TourGraph {
    TourGraph::new(vec![
        Scene::new("a", "Alpha", "a.jpg")
            .with_initial_view(10.0, 5.0)
            .with_hotspot(Hotspot::new(10.0, 5.0, "b")),
        Scene::new("b", "Beta", "b.jpg")
            .with_initial_view(45.0, -10.0)
            .with_hotspot(Hotspot::new(45.0, -10.0, "a")),
        Scene::new("c", "Gamma", "c.jpg").with_initial_view(-30.0, 0.0),
    ])
    .unwrap()
}

fn viewer(tour: TourGraph) -> TourViewer {
    let mut v = TourViewer::new(tour, ViewerConfig::default());
    v.resize(800.0, 600.0);
    v
}

fn latest_load_token(events: &[Stamped]) -> Option<u64> {
    events.iter().rev().find_map(|e| match e.event {
        ViewerEvent::LoadRequested { token, .. } => Some(token),
        _ => None,
    })
}

/// Answer the pending load and run the transition to completion.
fn settle(v: &mut TourViewer) -> Vec<Stamped> {
    let mut seen = v.drain_events();
    if let Some(token) = latest_load_token(&seen) {
        v.image_loaded(token, true);
    }
    for _ in 0..600 {
        if !v.is_blending() {
            break;
        }
        v.tick(DT);
    }
    assert!(!v.is_blending(), "transition never finished");
    seen.extend(v.drain_events());
    seen
}

fn count(events: &[Stamped], pred: impl Fn(&ViewerEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(&e.event)).count()
}

/// Shortest distance between two headings, degrees.
fn heading_gap(a: f32, b: f32) -> f32 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

#[test]
fn first_scene_is_revealed_at_its_initial_view() {
    let mut v = viewer(small_tour());
    let events = settle(&mut v);
    assert_eq!(v.current_scene(), 0);
    assert_eq!(v.orientation().yaw(), 10.0);
    assert_eq!(v.orientation().pitch(), 5.0);
    assert_eq!(v.frame().veil, 0.0);
    assert_eq!(
        count(&events, |e| matches!(e, ViewerEvent::SceneChanged { index: 0, .. })),
        1
    );
}

#[test]
fn initial_pitch_outside_limit_is_clamped() {
    let tour = TourGraph::new(vec![
        Scene::new("up", "Up", "up.jpg").with_initial_view(0.0, 120.0),
        Scene::new("down", "Down", "down.jpg").with_initial_view(0.0, -400.0),
    ])
    .unwrap();
    let mut v = viewer(tour);
    settle(&mut v);
    assert_eq!(v.orientation().pitch(), PITCH_LIMIT);

    v.next_scene();
    settle(&mut v);
    assert_eq!(v.orientation().pitch(), -PITCH_LIMIT);
}

#[test]
fn dragging_never_leaves_pitch_bounds() {
    let mut v = viewer(small_tour());
    settle(&mut v);
    let mut t = 1.0;
    for sweep in [3000.0_f32, -6000.0, 9000.0] {
        v.pointer_pressed(400.0, 300.0, t);
        for step in 1..=20 {
            t += 0.016;
            v.pointer_moved(400.0 + step as f32 * 3.0, 300.0 + sweep * step as f32 / 20.0, t);
            let p = v.orientation().pitch();
            assert!((-PITCH_LIMIT..=PITCH_LIMIT).contains(&p), "pitch {p}");
        }
        v.pointer_released(t);
        for _ in 0..60 {
            v.tick(DT);
            let p = v.orientation().pitch();
            assert!((-PITCH_LIMIT..=PITCH_LIMIT).contains(&p), "pitch {p}");
        }
    }
}

#[test]
fn round_trip_lands_on_initial_view() {
    let mut v = viewer(small_tour());
    settle(&mut v);

    assert!(v.navigate_to_id("b", NavigationOrigin::User));
    settle(&mut v);
    assert_eq!(v.current_scene_id(), "b");
    assert_eq!((v.orientation().yaw(), v.orientation().pitch()), (45.0, -10.0));

    // look around before going back
    v.pointer_pressed(100.0, 100.0, 5.0);
    v.pointer_moved(300.0, 250.0, 5.1);
    v.pointer_released(5.5);

    assert!(v.navigate_to_id("a", NavigationOrigin::User));
    settle(&mut v);
    assert_eq!(v.current_scene_id(), "a");
    assert_eq!((v.orientation().yaw(), v.orientation().pitch()), (10.0, 5.0));
}

#[test]
fn superseding_request_finishes_once_at_the_newest_target() {
    let mut v = viewer(small_tour());
    settle(&mut v);

    v.navigate_to_index(1, NavigationOrigin::User);
    let first = latest_load_token(v.events()).unwrap();
    for _ in 0..10 {
        v.tick(DT);
    }
    let veil = v.frame().veil;
    assert!(veil > 0.0 && veil < 1.0);

    v.navigate_to_index(2, NavigationOrigin::User);
    let second = latest_load_token(v.events()).unwrap();
    assert_ne!(first, second);
    assert!(v.frame().veil >= veil, "veil must not jump back");

    assert!(!v.image_loaded(first, true), "stale load must be ignored");
    let events = settle(&mut v);

    assert_eq!(
        count(&events, |e| matches!(e, ViewerEvent::TransitionFinished { .. })),
        1
    );
    assert_eq!(
        count(&events, |e| matches!(
            e,
            ViewerEvent::TransitionCancelled { token } if *token == first
        )),
        1
    );
    assert_eq!(
        count(&events, |e| matches!(e, ViewerEvent::LoadCancelled { token } if *token == first)),
        1
    );
    assert_eq!(v.current_scene(), 2);
    assert_eq!(v.orientation().yaw(), -30.0);
}

#[test]
fn failed_or_stalled_load_still_completes() {
    let mut v = viewer(small_tour());
    settle(&mut v);

    v.navigate_to_index(1, NavigationOrigin::User);
    let token = latest_load_token(v.events()).unwrap();
    assert!(v.image_loaded(token, false));
    for _ in 0..120 {
        v.tick(DT);
    }
    assert_eq!(v.current_scene(), 1);

    // never answered: the load timeout releases the veil
    v.navigate_to_index(2, NavigationOrigin::User);
    for _ in 0..(60 * 8) {
        v.tick(DT);
    }
    assert!(!v.is_blending());
    assert_eq!(v.current_scene(), 2);
}

#[test]
fn selection_is_ignored_while_blending() {
    let mut v = viewer(small_tour());
    settle(&mut v);
    v.navigate_to_index(2, NavigationOrigin::User);
    assert!(!v.select_center());
    assert!(!v.select_at(400.0, 300.0));
    assert_eq!(v.pending_scene(), Some(2));
}

#[test]
fn hotspot_to_unknown_scene_is_a_no_op() {
    let tour = TourGraph::new(vec![
        Scene::new("a", "Alpha", "a.jpg")
            .with_initial_view(20.0, 0.0)
            .with_hotspot(Hotspot::new(20.0, 0.0, "nowhere")),
        Scene::new("b", "Beta", "b.jpg"),
    ])
    .unwrap();
    let mut v = viewer(tour);
    settle(&mut v);

    assert!(!v.select_center());
    assert!(!v.is_blending());
    assert_eq!(v.current_scene(), 0);
    assert_eq!((v.orientation().yaw(), v.orientation().pitch()), (20.0, 0.0));
    assert_eq!(
        count(v.events(), |e| matches!(
            e,
            ViewerEvent::NavigationIgnored { target } if target == "nowhere"
        )),
        1
    );
    assert_eq!(
        count(v.events(), |e| matches!(e, ViewerEvent::LoadRequested { .. })),
        0
    );
}

#[test]
fn builtin_gate_hotspot_leads_to_inside_gate() {
    let mut v = viewer(TourGraph::builtin().unwrap());
    settle(&mut v);
    assert_eq!(v.current_scene_id(), "spot1");

    let mut motion = Motion::answering(Permission::Granted);
    let mut screen = Screen::default();
    assert_eq!(
        v.switch_mode(Mode::Gyro, &mut motion, &mut screen),
        Switch::Entered(Mode::Gyro)
    );

    // turn the head towards the gate marker
    v.device_orientation(DeviceSample {
        heading: 175.0,
        elevation: -15.0,
    });
    assert!(v.select_center());
    settle(&mut v);

    // the head pose carries over onto the new scene's forward view
    assert_eq!(v.current_scene_id(), "spot2");
    assert_eq!((v.orientation().yaw(), v.orientation().pitch()), (175.0, -15.0));
}

#[test]
fn gyro_view_does_not_jump_when_a_transition_ends() {
    let mut v = viewer(small_tour());
    settle(&mut v);
    let mut motion = Motion::answering(Permission::Granted);
    let mut screen = Screen::default();
    v.switch_mode(Mode::Gyro, &mut motion, &mut screen);

    let head = DeviceSample {
        heading: 90.0,
        elevation: 0.0,
    };
    v.device_orientation(head);
    assert_eq!(v.orientation().yaw(), 100.0);

    assert!(v.navigate_to_index(1, NavigationOrigin::User));
    let token = latest_load_token(&v.drain_events()).unwrap();
    v.image_loaded(token, true);

    let mut last = v.orientation().yaw();
    for _ in 0..600 {
        v.device_orientation(head);
        v.tick(DT);
        if !v.is_blending() {
            break;
        }
        last = v.orientation().yaw();
    }
    assert!(!v.is_blending());
    assert_eq!(v.current_scene(), 1);

    v.device_orientation(head);
    v.tick(DT);
    assert!(heading_gap(v.orientation().yaw(), last) < 1.0);
    assert!(heading_gap(v.orientation().yaw(), 45.0 + 90.0) < 1e-3);
    assert_abs_diff_eq!(v.orientation().pitch(), -10.0);
}

#[test]
fn scene_without_hotspots_links_forward_with_wrap() {
    let mut v = viewer(TourGraph::builtin().unwrap());
    settle(&mut v);
    let last = v.tour().len() - 1;
    assert!(v.tour().scene_at(last).unwrap().hotspots.is_empty());

    v.navigate_to_index(last, NavigationOrigin::User);
    settle(&mut v);
    assert_eq!(v.frame().markers.len(), 1);

    assert!(v.select_center());
    settle(&mut v);
    assert_eq!(v.current_scene(), 0);
}

#[test]
fn replacement_viewer_never_reuses_load_tokens() {
    let mut old = viewer(small_tour());
    settle(&mut old);
    old.navigate_to_index(2, NavigationOrigin::User);
    let old_tokens: Vec<u64> = old
        .drain_events()
        .iter()
        .filter_map(|e| match e.event {
            ViewerEvent::LoadRequested { token, .. } => Some(token),
            _ => None,
        })
        .collect();
    assert!(!old_tokens.is_empty());

    let new = TourViewer::succeeding(&old, small_tour(), ViewerConfig::default());
    let first = latest_load_token(new.events()).unwrap();
    assert!(old_tokens.iter().all(|&t| t < first));
}

#[test]
fn direct_gyro_vr_switches_land_in_normal() {
    let mut v = viewer(small_tour());
    settle(&mut v);
    let mut motion = Motion::answering(Permission::Granted);
    let mut screen = Screen::default();

    v.switch_mode(Mode::Gyro, &mut motion, &mut screen);
    assert_eq!(
        v.switch_mode(Mode::Vr, &mut motion, &mut screen),
        Switch::Rejected { now: Mode::Normal }
    );
    assert_eq!(v.mode(), Mode::Normal);
    assert!(!motion.subscribed);

    v.switch_mode(Mode::Vr, &mut motion, &mut screen);
    assert!(screen.fullscreen);
    assert_eq!(
        v.switch_mode(Mode::Gyro, &mut motion, &mut screen),
        Switch::Rejected { now: Mode::Normal }
    );
    assert_eq!(v.mode(), Mode::Normal);
    assert!(!screen.fullscreen);
}

#[test]
fn denied_permission_keeps_normal_mode() {
    let mut v = viewer(small_tour());
    settle(&mut v);
    let mut motion = Motion::answering(Permission::Denied);
    let mut screen = Screen::default();

    assert_eq!(
        v.switch_mode(Mode::Gyro, &mut motion, &mut screen),
        Switch::Denied { now: Mode::Normal }
    );
    assert!(v.permission_denied());
    assert!(v.frame().permission_denied);

    // vr still works without head tracking
    assert_eq!(
        v.switch_mode(Mode::Vr, &mut motion, &mut screen),
        Switch::Entered(Mode::Vr)
    );
}

#[test]
fn pending_permission_resolves_later() {
    let mut v = viewer(small_tour());
    settle(&mut v);
    let mut motion = Motion::answering(Permission::Pending);
    let mut screen = Screen::default();

    assert_eq!(
        v.switch_mode(Mode::Gyro, &mut motion, &mut screen),
        Switch::Pending { now: Mode::Normal }
    );
    assert_eq!(v.mode(), Mode::Normal);
    assert_eq!(
        v.permission_resolved(true, &mut motion),
        Some(Switch::Entered(Mode::Gyro))
    );
    assert!(motion.subscribed);
    // nothing left to resolve
    assert_eq!(v.permission_resolved(true, &mut motion), None);
}

#[test]
fn auto_tour_and_gyro_exclude_each_other() {
    let mut v = viewer(small_tour());
    settle(&mut v);
    let mut motion = Motion::answering(Permission::Granted);
    let mut screen = Screen::default();

    assert!(v.set_auto_tour(true));
    v.switch_mode(Mode::Gyro, &mut motion, &mut screen);
    assert!(!v.auto_tour_enabled());
    assert_eq!(
        count(v.events(), |e| matches!(
            e,
            ViewerEvent::AutoTourStopped {
                reason: StopReason::ModeChanged
            }
        )),
        1
    );

    assert!(!v.set_auto_tour(true));
    assert!(!v.auto_tour_enabled());
}

#[test]
fn stopping_auto_tour_twice_reports_once() {
    let mut v = viewer(small_tour());
    settle(&mut v);
    v.set_auto_tour(true);
    v.set_auto_tour(false);
    v.set_auto_tour(false);
    assert_eq!(
        count(v.events(), |e| matches!(e, ViewerEvent::AutoTourStopped { .. })),
        1
    );
}

#[test]
fn auto_tour_rotates_then_advances_and_keeps_going() {
    let mut v = viewer(small_tour());
    settle(&mut v);
    assert!(v.set_auto_tour(true));
    let start_yaw = v.orientation().yaw();

    let mut frames = 0;
    while !v.is_blending() && frames < 60 * 13 {
        v.tick(DT);
        frames += 1;
    }
    assert!(v.is_blending(), "auto tour never advanced");
    assert!(frames >= 60 * 10);
    assert_eq!(v.pending_scene(), Some(1));
    assert!(v.orientation().yaw() < start_yaw - 300.0);

    settle(&mut v);
    assert_eq!(v.current_scene(), 1);
    assert!(v.auto_tour_enabled());
}

#[test]
fn user_input_stops_auto_tour() {
    let mut v = viewer(small_tour());
    settle(&mut v);
    v.set_auto_tour(true);
    for _ in 0..30 {
        v.tick(DT);
    }
    v.pointer_pressed(10.0, 10.0, 2.0);
    assert!(!v.auto_tour_enabled());
    assert_eq!(
        count(v.events(), |e| matches!(
            e,
            ViewerEvent::AutoTourStopped {
                reason: StopReason::UserInput
            }
        )),
        1
    );
}

#[test]
fn gaze_fuse_selects_in_vr() {
    let mut v = viewer(small_tour());
    settle(&mut v);
    let mut motion = Motion::answering(Permission::Granted);
    let mut screen = Screen::default();
    v.switch_mode(Mode::Vr, &mut motion, &mut screen);
    assert_abs_diff_eq!(v.frame().eye.x, 400.0);

    for _ in 0..(60 * 2) {
        v.tick(DT);
        if v.is_blending() {
            break;
        }
    }
    assert_eq!(v.pending_scene(), Some(1));
}

#[test]
fn hover_changes_are_reported_once() {
    let mut v = viewer(small_tour());
    settle(&mut v);
    for _ in 0..5 {
        v.pointer_moved(400.0, 300.0, 1.0);
        v.tick(DT);
    }
    v.pointer_left();
    v.tick(DT);
    let hovers: Vec<_> = v
        .events()
        .iter()
        .filter_map(|e| match &e.event {
            ViewerEvent::HoverChanged { target } => Some(target.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(hovers, vec![Some("Beta".to_string()), None]);
}
