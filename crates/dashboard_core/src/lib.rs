//! Status reconciliation core for the multi-material printer dashboard.
//!
//! Inbound channel events are merged into a single [`store::ViewModelStore`]
//! by the [`normalizer`], projected by [`render`], and written to a
//! [`render::UiSink`]. [`runtime::Dashboard`] ties those to the reconnecting
//! [`transport`] and the controller's REST API.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod files;
pub mod normalizer;
pub mod prefs;
pub mod render;
pub mod runtime;
pub mod state;
pub mod store;
pub mod timer;
pub mod transport;

pub use api::ControllerApi;
pub use config::{load_settings, Settings};
pub use error::{ClientError, ConfigError, PreferenceError};
pub use prefs::Preferences;
pub use render::{DashboardView, MemorySink, Target, Tier, UiSink};
pub use runtime::{Dashboard, DashboardHandle};
pub use store::ViewModelStore;
