//! Output formatting utilities

use admission_lib::ResourceList;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Render rows as a rounded table
pub fn print_table<T: Tabled>(rows: &[T]) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Quantity for a resource, `-` when unset
pub fn format_quantity(list: Option<&ResourceList>, resource: &str) -> String {
    list.and_then(|list| list.get(resource))
        .map(|quantity| quantity.0.clone())
        .unwrap_or_else(|| "-".to_string())
}

/// Adjustment notes, highlighted when present
pub fn format_notes(notes: Option<&Vec<String>>) -> String {
    match notes {
        Some(notes) if !notes.is_empty() => notes.join("\n").yellow().to_string(),
        _ => String::new(),
    }
}
