//! Shared pieces of the `shelf` command line
//!
//! Configuration loading, logging setup and the composition root live here so
//! integration tests can reach them.

pub mod app;
pub mod config;
pub mod logging;
pub mod util;

pub use app::App;
pub use config::AppConfig;
