pub mod app;
pub mod app_state;
pub mod command;
pub mod config;
pub mod control;
pub mod domain;
pub mod error;
pub mod notify;
pub mod probe;
pub mod status;
pub mod telemetry;
pub mod transport;
