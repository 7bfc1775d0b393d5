// Library interface for medibook-server
// Exposes modules for integration testing

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod cert;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
