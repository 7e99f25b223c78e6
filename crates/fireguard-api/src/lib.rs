// Fireguard API Library
// Decision: Shared library for the server binary and integration tests

// HTTP routes and layers
pub mod api;

// Authentication module
pub mod auth;

// Configuration provider
pub mod config;
