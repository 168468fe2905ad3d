use colored::Colorize;
use serde::Serialize;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_failure(msg: &str) {
    println!("{} {}", "✗".red(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("{}: {}", label.cyan(), value);
}

pub fn print_step(step: &str) {
    println!("{} {}", "→".blue(), step.bold());
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
