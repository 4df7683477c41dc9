pub mod config;
pub mod connectors;
pub mod core;
pub mod error;
pub mod logging;
pub mod notify;
pub mod report;
pub mod server;
pub mod strategies;
pub mod types;
pub mod utils;
