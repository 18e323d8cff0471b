use colored::*;
use tracing::info;

pub const TOTAL_WIDTH: usize = 64;
/// Events under this target are written without a level symbol.
pub const TARGET: &str = "gummy::print";

pub fn print(msg: &str) {
    info!(target: "gummy::print", "{msg}");
}

pub fn banner() {
    let text = format!("⟦ GUMMY v{} ⟧", env!("CARGO_PKG_VERSION"));
    let sep = "═".repeat(TOTAL_WIDTH.saturating_sub(console::measure_text_width(&text)) / 2);
    print(&format!(
        "{}{}{}",
        sep.bright_black(),
        text.bright_green().bold(),
        sep.bright_black()
    ));
}

pub fn header(msg: &str) {
    let formatted = format!("⟦ {} ⟧", msg);
    let dash_count = TOTAL_WIDTH.saturating_sub(console::measure_text_width(&formatted));
    let left = dash_count / 2;
    let right = dash_count - left;

    let line = format!(
        "{}{}{}",
        "─".repeat(left).bright_black(),
        formatted.to_uppercase().bright_green(),
        "─".repeat(right).bright_black()
    );
    print(&line);
}

pub fn fat_separator() {
    print(&format!("{}", "═".repeat(TOTAL_WIDTH).bright_black()));
}

pub fn print_status<T: AsRef<str>>(msg: T) {
    print(&format!("{} {}", ">".bright_black(), msg.as_ref()));
}

pub fn centerln(msg: &str) {
    let space = " ".repeat(TOTAL_WIDTH.saturating_sub(console::measure_text_width(msg)) / 2);
    print(&format!("{space}{msg}"));
}

/// Prints a multi-line block such as a rendered table, one event per line.
pub fn block(text: &str) {
    for line in text.lines() {
        print(line);
    }
}

pub fn no_results() {
    header("nothing found");
    centerln(&"The inventory is empty".red().bold().to_string());
}
