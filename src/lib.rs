pub mod cli;
pub mod config;
pub mod detect;
pub mod platform;
pub mod report;
pub mod store;
