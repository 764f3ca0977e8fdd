pub mod error;
pub mod logging;
pub mod models;
pub mod schedule;
pub mod settings;
