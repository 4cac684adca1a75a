pub mod cli;
pub mod config;

mod app_config;
mod commands;
mod context;
mod logging;
mod terminal;
