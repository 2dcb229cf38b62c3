//! Traffic congestion prediction service for Kigali roads.
//!
//! A classifier and its categorical encoders are loaded once at startup and
//! served over HTTP: `POST /predict`, `GET /health`, `GET /model-info`, plus a
//! browser form at `/`.

pub mod config;
pub mod encoder;
pub mod error;
pub mod http;
pub mod labels;
pub mod model;
pub mod service;
pub mod types;
pub mod validate;

pub use error::{PredictionError, StartupError, ValidationErrors};
pub use service::{PredictionService, ServiceError};
