pub mod client;
pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod reporter;
pub mod ui;
