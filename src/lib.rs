//! Navigation and orientation core for a 360° panorama virtual tour.
//!
//! Everything here is single threaded and driven by [`TourViewer::tick`]; the
//! binary owns the window, GPU and image decoding and talks to the core
//! through method calls and drained [`events::ViewerEvent`]s.

pub mod autotour;
pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod hotspot;
pub mod i18n;
pub mod input;
pub mod mode;
pub mod orientation;
pub mod tour;
pub mod transition;
pub mod viewer;

pub use config::{LaunchOptions, ViewerConfig};
pub use error::{PlatformError, TourError};
pub use events::{Stamped, ViewerEvent};
pub use mode::{Mode, Switch};
pub use tour::{Hotspot, Scene, TourGraph, ViewAngles};
pub use viewer::{FrameState, Label, NavigationOrigin, TourViewer};
