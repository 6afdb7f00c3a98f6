//! Guardian SOS - On-device drop detection and emergency alert dispatch
//!
//! Guardian watches the accelerometer for sudden drops, gives the user a short
//! window to cancel, and otherwise sends an SOS to their emergency contacts:
//! motion sampling → drop detection → confirmation countdown → audio capture
//! → alert submission.
//!
//! ## Modules
//!
//! - **Pipeline**: [`SafetyMonitor`] drives manual SOS and automatic drop detection
//! - **Adapters**: ports for the sensor, microphone, location service and backend
//! - **History**: alerts received from other users and their resolution

pub mod adapters;
pub mod audio;
pub mod config;
pub mod confirmation;
pub mod contacts;
pub mod context;
pub mod detector;
pub mod dispatcher;
pub mod error;
pub mod history;
pub mod notice;
pub mod pipeline;
pub mod sampler;
pub mod schema;
pub mod settings;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::SosConfig;
pub use contacts::{ContactBook, EmailPolicy};
pub use context::SessionContext;
pub use detector::{DetectorState, DropDetector};
pub use dispatcher::AlertDispatcher;
pub use error::{SosError, SubmitError};
pub use notice::{LogPresenter, Notice, Presenter};
pub use pipeline::{Collaborators, DropWatch, SafetyMonitor};
pub use settings::Settings;
pub use types::{
    AlertType, DeliveryReport, DispatchOutcome, EmergencyContact, Location, MotionSample,
    UserProfile,
};

/// Crate version, reported by the CLI and the doctor command
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
