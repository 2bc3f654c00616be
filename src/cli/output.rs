//! What nestset prints
//!
//! Status lines go through `colored`, which honours NO_COLOR and friends.
//! Tree and dump rows stay uncoloured so they can be piped.

use colored::Colorize;

use crate::domain::DumpEntry;

/// Error line on stderr
pub fn error(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

/// Non-fatal notice on stderr, e.g. an empty store
pub fn warning(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "warning".yellow(), msg);
}

/// Passed consistency check
pub fn success(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{} {}", "✓".green(), msg);
}

/// Failed consistency check
pub fn failure(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{} {}", "✗".red(), msg);
}

/// `Created:`, `Moved:` and the like after a mutation
pub fn action(label: &str, msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}: {}", label.green(), msg);
}

pub fn header(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// One `name: value` line of `info`
pub fn detail(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {}", msg);
}

/// Tree and dump rows, uncoloured
pub fn info(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg);
}

/// Tab separated dump row: level, key, parent, left, right, first/last flags, path.
/// Missing values print as `-`.
pub fn dump_row(entry: &DumpEntry) -> String {
    let (left, right) = entry.node.bounds().unwrap_or_default();
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}{}\t{}",
        entry.level,
        entry.key,
        entry.parent.map(|k| k.to_string()).unwrap_or_else(|| "-".into()),
        left,
        right,
        if entry.first { "F" } else { "-" },
        if entry.last { "L" } else { "-" },
        entry.path.as_deref().unwrap_or("-"),
    )
}
