pub mod api;
pub mod config;
pub mod dto;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::api::client::ApiClient;
pub use crate::api::TestBackend;
pub use crate::services::attempt_controller::{
    AppLifecycle, AttemptController, Screen, SessionEvent,
};
