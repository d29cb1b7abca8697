pub mod check;
pub mod context;
pub mod make_patch;
pub mod mark_applied;
pub mod read_patch;
pub mod show_applied;
pub mod verify;
pub mod write_manifest;

use crate::output::{self, Verbosity};
use colored::Colorize;

fn quiet() -> bool {
    output::get_verbosity() == Verbosity::Quiet
}

pub fn print_success(message: &str) {
    if quiet() {
        return;
    }
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_info(message: &str) {
    if quiet() {
        return;
    }
    println!("{} {}", "ℹ".blue().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}
