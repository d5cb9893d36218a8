//! `schoolbus` - client library for the school bus tracking backend
//!
//! This library provides the REST client, resource models, the driver
//! boarding/disembarking workflow fed by QR scans, daily reports and the
//! parent status view used by the `busctl` binary.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod listing;
pub mod logging;
pub mod models;
pub mod parent;
pub mod recorder;
pub mod report;
pub mod scanner;
pub mod session;

pub use api::ApiClient;
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use models::Direction;
pub use recorder::{BoardingBackend, DriverContext, Notice, Recorder, RecorderState};
pub use session::{Session, SessionStore};
