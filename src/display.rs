//! Colored CLI display utilities for backend output.
//!
//! This module provides functions for printing colored, formatted output
//! to the terminal while queries and streaming operations run.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::backend::{ClientError, StreamEvent};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Maximum length for truncated log messages.
const DEFAULT_MAX_LEN: usize = 200;

/// Truncate a string to a maximum length, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize, raw_mode: bool) -> String {
    if raw_mode || s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

/// Print the start of a streaming operation.
pub fn print_operation_start(name: &str) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "[START]".blue().bold(),
        name.cyan()
    );
    let _ = io::stdout().flush();
}

/// Print text produced by a streaming session, one line at a time.
pub fn print_stream_text(text: &str, raw_mode: bool) {
    for line in text.lines() {
        let line = truncate(line, DEFAULT_MAX_LEN, raw_mode);
        if line.starts_with("[error]") {
            println!("{}", line.red());
        } else if line.starts_with("[warning]") {
            println!("{}", line.yellow());
        } else if line.starts_with("Download") {
            println!("{}", line.blue());
        } else if line.starts_with('[') {
            println!("{}", line.cyan());
        } else {
            println!("{line}");
        }
    }
    let _ = io::stdout().flush();
}

/// Print one stream event as a compact JSON line.
pub fn print_event_json(event: &StreamEvent) {
    match serde_json::to_string(event) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("{} {}", "[ERROR]".red().bold(), e),
    }
    let _ = io::stdout().flush();
}

/// Print successful completion of a streaming operation.
pub fn print_complete(name: &str) {
    println!(
        "{} {} {} completed",
        timestamp().dimmed(),
        "[DONE]".green().bold(),
        name
    );
    let _ = io::stdout().flush();
}

/// Print failure of a streaming operation.
pub fn print_failure(name: &str, message: &str) {
    println!(
        "{} {} {} failed: {}",
        timestamp().dimmed(),
        "[FAILED]".red().bold(),
        name,
        message.red()
    );
    let _ = io::stdout().flush();
}

/// Print a one-shot command error.
pub fn print_client_error(err: &ClientError) {
    eprintln!(
        "{} {} {}",
        "[ERROR]".red().bold(),
        err.kind.as_str().yellow(),
        err.message
    );
    if let Some(details) = &err.details {
        eprintln!("        {}", details.dimmed());
    }
    if err.kind.is_retryable() {
        eprintln!("        {}", "(transient, retry later)".dimmed());
    }
}

/// Print a query result as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("{} {}", "[ERROR]".red().bold(), e),
    }
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}
