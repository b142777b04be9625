//! Output formatting helpers: tables, success/info/warning lines.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Table};

pub fn print_table(headers: Vec<&str>, rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(headers.iter().map(|h| Cell::new(h).fg(comfy_table::Color::Cyan)));
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}

pub fn print_success(message: &str) {
    println!("{} {}", "\u{2713}".green().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "\u{2139}".blue().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "\u{26a0}".yellow().bold(), message);
}
