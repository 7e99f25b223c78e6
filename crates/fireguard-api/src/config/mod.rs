// Configuration loading and parsing
//
// This module snapshots the process environment (optionally seeded from a
// `.<environment>.env` file) and exposes typed accessors over it. Consumers
// receive a `ConfigService` explicitly instead of reading `std::env` directly.

pub mod env;
pub mod server;

pub use env::{ConfigError, ConfigService, DEFAULT_ENVIRONMENT};
pub use server::ServerConfig;
