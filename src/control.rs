pub mod auth;
pub mod client;

pub use auth::{AccessToken, AuthError, CredentialProvider};
pub use client::{ControlPlane, ControlPlaneError, WorkloadAction};
