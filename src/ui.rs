use colored::{ColoredString, Colorize};
use topology::ApplyResult;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{}/{}]", num, total).blue().bold(), msg);
}

/// Colored status symbol for an apply result
pub fn result_symbol(result: &ApplyResult) -> ColoredString {
    match result {
        ApplyResult::NoChange => result.symbol().dimmed(),
        ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => {
            result.symbol().green()
        }
        ApplyResult::Failed { .. } => result.symbol().red(),
        ApplyResult::Skipped { .. } => result.symbol().yellow(),
    }
}

/// Short label for an apply result
pub fn result_label(result: &ApplyResult) -> String {
    match result {
        ApplyResult::NoChange => "unchanged".to_string(),
        ApplyResult::Created => "created".to_string(),
        ApplyResult::Modified => "modified".to_string(),
        ApplyResult::Removed => "removed".to_string(),
        ApplyResult::Failed { error } => format!("failed: {}", error),
        ApplyResult::Skipped { reason } => format!("skipped: {}", reason),
    }
}

/// Truncate a string for display, keeping the start
pub fn truncate(value: &str, max_len: usize) -> String {
    if value.chars().count() <= max_len {
        value.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = value.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

// ============================================================================
// Tests
// ============================================================================
