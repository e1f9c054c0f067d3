//! A handful of semantic styles for the run summary line.
//!
//! Grounded on `worktrunk::styling`'s anstyle constants; this crate has
//! nowhere near that module's table/diff rendering surface, so only the
//! success/failure pair and the auto-detecting print macros are kept.

use anstyle::{AnsiColor, Color, Style};

pub use anstream::println;

pub const SUCCESS: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));
pub const FAILURE: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));

pub fn paint(style: Style, text: &str) -> String {
    format!("{style}{text}{style:#}")
}
