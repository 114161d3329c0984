//! User-facing messages
//!
//! Progress goes to stdout, warnings and errors to stderr. Colors only when
//! the stream is a terminal and NO_COLOR is unset.

use owo_colors::OwoColorize;
use std::io::IsTerminal;

fn color_stdout() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

fn color_stderr() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

pub fn info(msg: impl AsRef<str>) {
    println!("{}", msg.as_ref());
}

pub fn ok(msg: impl AsRef<str>) {
    if color_stdout() {
        println!("{}", msg.as_ref().green());
    } else {
        println!("{}", msg.as_ref());
    }
}

pub fn warn(msg: impl AsRef<str>) {
    let line = format!("Warning: {}", msg.as_ref());
    if color_stderr() {
        eprintln!("{}", line.yellow());
    } else {
        eprintln!("{}", line);
    }
}

pub fn error(msg: impl AsRef<str>) {
    let line = format!("Error: {}", msg.as_ref());
    if color_stderr() {
        eprintln!("{}", line.red().bold());
    } else {
        eprintln!("{}", line);
    }
}

/// "lab" -> "Lab"
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 3600000 kHz -> "3.60 GHz"
pub fn format_khz(khz: u64) -> String {
    if khz >= 1_000_000 {
        format!("{:.2} GHz", khz as f64 / 1_000_000.0)
    } else {
        format!("{} MHz", khz / 1_000)
    }
}
