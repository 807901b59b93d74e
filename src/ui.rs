//! Emoji-decorated status output for the terminal.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Display;
use std::time::Duration;

pub fn success(msg: impl Display) {
    println!("✅ {}", style(msg).green());
}

pub fn info(msg: impl Display) {
    println!("📦 {}", msg);
}

pub fn warn(msg: impl Display) {
    println!("⚠️  {}", style(msg).yellow());
}

pub fn failure(msg: impl Display) {
    println!("❌ {}", style(msg).red());
}

pub fn dry_run(msg: impl Display) {
    println!("🔍 {} {}", style("[DRY RUN]").yellow().bold(), msg);
}

pub fn header(title: impl Display) {
    println!("\n{}", style(title).magenta().bold());
    println!("─────────────────────────────────────────");
}

pub fn item(msg: impl Display) {
    println!("  • {}", msg);
}

pub fn path(path: &std::path::Path) -> console::StyledObject<String> {
    style(path.display().to_string()).blue().bold()
}

/// Spinner shown while an external command runs
pub fn spinner(msg: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(template);
    }
    pb.set_message(msg.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
