#![allow(dead_code)]

use colored::{Colorize, CustomColor};
use std::io::Write;

pub const MLCTL_BLUE: CustomColor = CustomColor {
    r: 0,
    g: 120,
    b: 212,
};

fn tag() -> colored::ColoredString {
    "mlctl".custom_color(MLCTL_BLUE)
}

/// Routes library `log` records through the same `[mlctl] level: message`
/// layout as the print macros. `RUST_LOG` overrides the default `warn` level.
pub fn init_logger(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format(|buf, record| {
            let level = record.level().to_string().to_lowercase();
            writeln!(buf, "[{}] {}: {}", tag(), level.bold(), record.args())
        })
        .try_init();
}

pub fn print_err(err_message: &str) {
    eprintln!("[{}] {}: {}", tag(), "error".red().bold(), err_message);
}

#[macro_export]
macro_rules! print_err {
    ($($arg:tt)*) => {
        $crate::logging::print_err(&format!($($arg)*));
    };
}

pub fn print_warn(warn_message: &str) {
    eprintln!("[{}] {}: {}", tag(), "warning".yellow().bold(), warn_message);
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        $crate::logging::print_warn(&format!($($arg)*));
    };
}

pub fn print_info(info_message: &str) {
    println!("[{}] {}: {}", tag(), "info".cyan().bold(), info_message);
}

#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        $crate::logging::print_info(&format!($($arg)*));
    };
}

#[cfg(debug_assertions)]
pub fn print_debug(debug_message: &str) {
    println!("[{}] {}: {}", tag(), "debug".green().bold(), debug_message);
}

#[cfg(not(debug_assertions))]
pub fn print_debug(_debug_message: &str) {}

#[macro_export]
macro_rules! print_debug {
    ($($arg:tt)*) => {
        #[cfg(debug_assertions)]
        $crate::logging::print_debug(&format!($($arg)*));
    };
}

pub fn print_success(success_message: &str) {
    println!("[{}] {}: {}", tag(), "success".green().bold(), success_message);
}

#[macro_export]
macro_rules! print_success {
    ($($arg:tt)*) => {
        $crate::logging::print_success(&format!($($arg)*));
    };
}
