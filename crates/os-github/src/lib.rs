//! Concrete GitHub clients and the logic that picks one at startup.

pub mod factory;
pub mod gh;
pub mod rest;
pub mod secrets;
pub mod wire;

pub use factory::{ClientChoice, ClientConfig, GhEnv, build_client, client_from_env, resolve_choice};
pub use gh::{GhCliClient, SystemGhEnv};
pub use rest::TokenClient;
pub use secrets::EnvSecretStore;
