//! Inline `run` annotations.
//!
//! An annotation looks like ``run [name]`command`[(Display Name)]`` anywhere
//! in free-form text. The scanner finds them; the helpers here turn a match
//! into the labels shown above the annotated line.

mod scanner;

pub use scanner::scan;

use std::ops::Range;

use crate::config::Settings;

const ELLIPSIS: &str = "...";
const PLAY_SYMBOL: &str = "▶︎";

/// A single `run` annotation found in a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation<'a> {
    /// Named session to run in; `None` means the default session
    pub terminal_name: Option<&'a str>,
    /// Raw body between the delimiters, untrimmed
    pub command: &'a str,
    /// Text of the `(...)` suffix, if present and non-empty
    pub display_name: Option<&'a str>,
    /// Byte range of the annotation, starting at the `run` keyword
    pub span: Range<usize>,
}

/// Length limits used when building labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    pub max_custom_name_length: usize,
    pub max_display_length: usize,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            max_custom_name_length: 50,
            max_display_length: 15,
        }
    }
}

impl From<&Settings> for DisplayOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            max_custom_name_length: settings.max_custom_name_length,
            max_display_length: settings.max_display_length,
        }
    }
}

impl<'a> Annotation<'a> {
    /// The command as it should be sent to a shell: the body with surrounding
    /// whitespace and blank lines removed.
    pub fn execution_command(&self) -> &'a str {
        self.command.trim()
    }

    /// Display name after truncation and sanitization, `None` if nothing
    /// printable is left.
    pub fn sanitized_display_name(&self, max_len: usize) -> Option<String> {
        self.display_name
            .map(|name| sanitize_display_name(name, max_len))
            .filter(|name| !name.is_empty())
    }

    /// Label for the clickable affordance above the annotation.
    pub fn title(&self, options: &DisplayOptions) -> String {
        if let Some(name) = self.sanitized_display_name(options.max_custom_name_length) {
            return format!("{PLAY_SYMBOL} {name}");
        }

        let command = single_line(self.execution_command());
        let run_text = truncate_for_display(&command, options.max_display_length);
        match self.terminal_name {
            Some(terminal) => format!("{PLAY_SYMBOL} Run `{run_text}` in terminal \"{terminal}\""),
            None => format!("{PLAY_SYMBOL} Run `{run_text}` in the terminal"),
        }
    }

    /// Untruncated description of what clicking the label does.
    pub fn tooltip(&self) -> String {
        let mut tooltip = format!("{PLAY_SYMBOL} Run `{}`", self.execution_command());
        if let Some(terminal) = self.terminal_name {
            tooltip.push_str(&format!(" in terminal \"{terminal}\""));
        }
        tooltip
    }
}

/// Shorten `name` to `max_len` characters (ending in `...`) when it is
/// longer, then strip `<` and `>`.
pub fn sanitize_display_name(name: &str, max_len: usize) -> String {
    let truncated = if name.chars().count() > max_len {
        let keep = max_len.saturating_sub(ELLIPSIS.len());
        let head: String = name.chars().take(keep).collect();
        format!("{head}{ELLIPSIS}")
    } else {
        name.to_string()
    };
    truncated.replace(['<', '>'], "")
}

/// Cut a command to `max_len` characters plus `...` for labels. The command
/// that gets executed is never shortened.
pub fn truncate_for_display(command: &str, max_len: usize) -> String {
    if command.chars().count() > max_len {
        let head: String = command.chars().take(max_len).collect();
        format!("{head}{ELLIPSIS}")
    } else {
        command.to_string()
    }
}

fn single_line(command: &str) -> String {
    command.lines().map(str::trim).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(text: &str) -> Annotation<'_> {
        scan(text).next().expect("annotation")
    }

    #[test]
    fn test_long_display_name_is_truncated() {
        let name = "A".repeat(60);
        let sanitized = sanitize_display_name(&name, 50);
        assert_eq!(sanitized.chars().count(), 50);
        assert!(sanitized.ends_with("..."));
    }

    #[test]
    fn test_display_name_at_limit_is_kept() {
        let name = "B".repeat(50);
        assert_eq!(sanitize_display_name(&name, 50), name);
    }

    #[test]
    fn test_display_name_angle_brackets_removed() {
        assert_eq!(sanitize_display_name("<Test>", 50), "Test");
        assert_eq!(sanitize_display_name("a & \"b\"", 50), "a & \"b\"");
    }

    #[test]
    fn test_command_truncated_for_display_only() {
        let command = "a".repeat(50);
        let shown = truncate_for_display(&command, 15);
        assert_eq!(shown, format!("{}...", "a".repeat(15)));
        assert_eq!(truncate_for_display("npm install", 15), "npm install");
    }

    #[test]
    fn test_title_with_display_name() {
        let annotation = first(" run `npm install`(Install Dependencies)");
        assert_eq!(
            annotation.title(&DisplayOptions::default()),
            "▶︎ Install Dependencies"
        );
    }

    #[test]
    fn test_title_default_terminal() {
        let annotation = first(" run `npm install`");
        assert_eq!(
            annotation.title(&DisplayOptions::default()),
            "▶︎ Run `npm install` in the terminal"
        );
    }

    #[test]
    fn test_title_named_terminal_and_truncation() {
        let annotation = first(" run test`cargo test --workspace --all-features`");
        assert_eq!(
            annotation.title(&DisplayOptions::default()),
            "▶︎ Run `cargo test --wo...` in terminal \"test\""
        );
    }

    #[test]
    fn test_title_falls_back_when_display_name_sanitizes_to_nothing() {
        let annotation = first(" run `ls`(<>)");
        assert_eq!(
            annotation.title(&DisplayOptions::default()),
            "▶︎ Run `ls` in the terminal"
        );
    }

    #[test]
    fn test_multiline_command_is_trimmed_for_execution() {
        let annotation = first(" run ```\n  cargo build\n```");
        assert_eq!(annotation.execution_command(), "cargo build");

        let annotation = first(" run ```\ncd src\nls\n```");
        assert_eq!(annotation.execution_command(), "cd src\nls");
        assert_eq!(
            annotation.title(&DisplayOptions::default()),
            "▶︎ Run `cd src ls` in the terminal"
        );
    }

    #[test]
    fn test_tooltip() {
        let annotation = first(" run dev`npm run dev`(Start)");
        assert_eq!(annotation.tooltip(), "▶︎ Run `npm run dev` in terminal \"dev\"");
    }
}
