#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod eval;
pub mod governance;
pub mod models;
pub mod orchestrator;
pub mod planner;
pub mod semantic;
pub mod sqlite;
pub mod telemetry;
pub mod tools;
pub mod utils;

pub use cli::app::{Cli, Command};
