// events.rs — 类型化事件总线 (取代字符串广播事件)

use std::path::PathBuf;

use crate::mode::Mode;

/// Why the auto tour stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Toggled,
    UserInput,
    ModeChanged,
    ExternalNavigation,
}

/// How a transition obtained its panorama.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutcome {
    Loaded,
    Failed,
    TimedOut,
}

/// Everything the core tells the outside world. The shell drains these each
/// frame and forwards them to the loader, renderer and chrome.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    ModeChanged { from: Mode, to: Mode },
    /// A direct gyro↔vr jump was refused; the viewer fell back to normal.
    ModeRejected { requested: Mode, from: Mode },
    PermissionDenied { requested: Mode },
    PermissionPending { requested: Mode },
    SceneChanged { index: usize, id: String },
    NavigationIgnored { target: String },
    LoadRequested { token: u64, path: PathBuf },
    LoadCancelled { token: u64 },
    TransitionStarted { token: u64, target: usize },
    TransitionCancelled { token: u64 },
    /// Screen is fully veiled: swap the panorama for `token`'s image.
    PanoramaSwap { token: u64, image: ImageOutcome },
    TransitionFinished { token: u64, target: usize },
    HoverChanged { target: Option<String> },
    AutoTourStarted,
    AutoTourStopped { reason: StopReason },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stamped {
    pub frame_index: u64,
    pub event: ViewerEvent,
}

#[derive(Debug, Default)]
pub struct EventBus {
    frame_index: u64,
    events: Vec<Stamped>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_frame(&mut self) {
        self.frame_index += 1;
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn emit(&mut self, event: ViewerEvent) {
        log::debug!("[frame {}] {:?}", self.frame_index, event);
        self.events.push(Stamped {
            frame_index: self.frame_index,
            event,
        });
    }

    pub fn events(&self) -> &[Stamped] {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<Stamped> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_events_with_frame_index() {
        let mut bus = EventBus::new();
        bus.begin_frame();
        bus.begin_frame();
        bus.emit(ViewerEvent::AutoTourStarted);
        assert_eq!(bus.events().len(), 1);
        assert_eq!(bus.events()[0].frame_index, 2);
    }

    #[test]
    fn drain_clears_events() {
        let mut bus = EventBus::new();
        bus.emit(ViewerEvent::LoadCancelled { token: 3 });
        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
        assert!(bus.events().is_empty());
    }
}
