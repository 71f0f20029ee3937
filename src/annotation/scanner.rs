use std::ops::Range;

use super::Annotation;

const KEYWORD: &str = "run";
const MAX_DELIMITER_WIDTH: usize = 3;

/// Scan `text` for `run [name]`cmd`[(display)]` annotations.
///
/// The returned iterator is lazy and borrows from `text`; calling `scan`
/// again restarts from the beginning.
pub fn scan(text: &str) -> Annotations<'_> {
    Annotations { text, pos: 0 }
}

/// Iterator over the annotations of a text, in source order.
#[derive(Debug, Clone)]
pub struct Annotations<'a> {
    text: &'a str,
    /// Byte offset where the next search starts
    pos: usize,
}

impl<'a> Iterator for Annotations<'a> {
    type Item = Annotation<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.text.len() {
            let start = find_keyword(self.text, self.pos)?;
            match parse_at(self.text, start) {
                Some(annotation) => {
                    self.pos = annotation.span.end;
                    if annotation.command.trim().is_empty() {
                        continue;
                    }
                    return Some(annotation);
                }
                None => self.pos = start + KEYWORD.len(),
            }
        }
        None
    }
}

/// Find the next `run` keyword at or after `from` that sits at the start of
/// the text or right after a whitespace character.
fn find_keyword(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i + KEYWORD.len() <= bytes.len() {
        if bytes[i..i + KEYWORD.len()].eq_ignore_ascii_case(KEYWORD.as_bytes())
            && preceded_by_whitespace(text, i)
        {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn preceded_by_whitespace(text: &str, i: usize) -> bool {
    // `i` points at an ASCII byte, so it is always a char boundary
    text[..i].chars().next_back().map_or(true, char::is_whitespace)
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn has_line_break(s: &str) -> bool {
    s.contains(['\n', '\r'])
}

/// Try to read a complete annotation whose keyword starts at `start`.
fn parse_at(text: &str, start: usize) -> Option<Annotation<'_>> {
    let mut i = start + KEYWORD.len();

    // One or more whitespace characters after the keyword
    let rest = &text[i..];
    let ws_len = rest.len() - rest.trim_start().len();
    if ws_len == 0 {
        return None;
    }
    i += ws_len;

    let name_len = text[i..].bytes().take_while(|b| is_name_byte(*b)).count();
    let terminal_name = (name_len > 0).then(|| &text[i..i + name_len]);
    i += name_len;

    let width = text[i..].bytes().take_while(|b| *b == b'`').count();
    if width == 0 || width > MAX_DELIMITER_WIDTH {
        return None;
    }
    let delimiter = &text[i..i + width];
    i += width;

    let close = i + text[i..].find(delimiter)?;
    let command = &text[i..close];
    if width < MAX_DELIMITER_WIDTH && has_line_break(command) {
        return None;
    }

    let (display_name, end) = parse_display_suffix(text, close + width);

    Some(Annotation {
        terminal_name,
        command,
        display_name,
        span: Range { start, end },
    })
}

/// Read an optional `(display name)` directly after the closing delimiter.
/// Returns the name (if non-empty) and the end offset of the annotation.
fn parse_display_suffix(text: &str, after_close: usize) -> (Option<&str>, usize) {
    let Some(rest) = text[after_close..].strip_prefix('(') else {
        return (None, after_close);
    };
    match rest.find(')') {
        Some(len) if !has_line_break(&rest[..len]) => {
            let name = &rest[..len];
            let end = after_close + 1 + len + 1;
            ((!name.is_empty()).then_some(name), end)
        }
        _ => (None, after_close),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(text: &str) -> Vec<&str> {
        scan(text).map(|a| a.command).collect()
    }

    #[test]
    fn test_single_backtick_command() {
        let found: Vec<_> = scan(" run `npm install`").collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].command, "npm install");
        assert_eq!(found[0].terminal_name, None);
        assert_eq!(found[0].display_name, None);
    }

    #[test]
    fn test_double_and_triple_backticks() {
        assert_eq!(commands(" run ``node --version``"), vec!["node --version"]);
        assert_eq!(commands(" run ```echo \"test\"```"), vec!["echo \"test\""]);
    }

    #[test]
    fn test_named_terminal() {
        let found: Vec<_> = scan(" run dev`npm run dev`").collect();
        assert_eq!(found[0].terminal_name, Some("dev"));
        assert_eq!(found[0].command, "npm run dev");

        let found: Vec<_> = scan(" run build-2_x`make`").collect();
        assert_eq!(found[0].terminal_name, Some("build-2_x"));
    }

    #[test]
    fn test_display_name() {
        let found: Vec<_> = scan(" run `npm install`(Install Dependencies)").collect();
        assert_eq!(found[0].command, "npm install");
        assert_eq!(found[0].display_name, Some("Install Dependencies"));

        let found: Vec<_> = scan(" run dev`npm run dev`(Start Server)").collect();
        assert_eq!(found[0].terminal_name, Some("dev"));
        assert_eq!(found[0].display_name, Some("Start Server"));
    }

    #[test]
    fn test_display_name_stops_at_first_paren() {
        let text = " run `ls`(List (all)) files";
        let found: Vec<_> = scan(text).collect();
        assert_eq!(found[0].display_name, Some("List (all"));
        assert_eq!(&text[found[0].span.clone()], "run `ls`(List (all)");
    }

    #[test]
    fn test_empty_or_unclosed_suffix_is_not_a_display_name() {
        let found: Vec<_> = scan(" run `ls`()").collect();
        assert_eq!(found[0].display_name, None);
        assert_eq!(found[0].span.end, " run `ls`()".len());

        let found: Vec<_> = scan(" run `ls`(oops\n)").collect();
        assert_eq!(found[0].display_name, None);
        assert_eq!(found[0].span.end, " run `ls`".len());
    }

    #[test]
    fn test_space_before_suffix_is_not_consumed() {
        let found: Vec<_> = scan(" run `ls` (List)").collect();
        assert_eq!(found[0].display_name, None);
    }

    #[test]
    fn test_no_match_without_keyword() {
        assert!(commands("`npm install`").is_empty());
        assert!(commands("please execute `ls`").is_empty());
    }

    #[test]
    fn test_keyword_needs_whitespace_or_start_before_it() {
        assert!(commands(" xrun `cmd`").is_empty());
        assert!(commands("rerun `cmd`").is_empty());
        assert_eq!(commands("run `cmd`"), vec!["cmd"]);
        assert_eq!(commands("intro\nrun `cmd`"), vec!["cmd"]);
        assert_eq!(commands("\trun `cmd`"), vec!["cmd"]);
    }

    #[test]
    fn test_keyword_needs_whitespace_after_it() {
        assert!(commands(" run`cmd`").is_empty());
        assert!(commands(" running `cmd`").is_empty());
    }

    #[test]
    fn test_keyword_is_case_insensitive() {
        assert_eq!(commands(" RUN `a`\n Run `b`"), vec!["a", "b"]);
    }

    #[test]
    fn test_name_must_touch_delimiter() {
        assert!(commands(" run dev `npm start`").is_empty());
    }

    #[test]
    fn test_multiple_matches_in_order() {
        let found: Vec<_> = scan(" run `a`\n run `b`\n run x`c`").collect();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].command, "a");
        assert_eq!(found[1].command, "b");
        assert_eq!(found[2].command, "c");
        assert_eq!(found[2].terminal_name, Some("x"));
    }

    #[test]
    fn test_delimiter_width_must_match() {
        // a single backtick closes at the first backtick
        assert_eq!(commands(" run `a``b`"), vec!["a"]);
        // a double backtick is not closed by a single one
        assert_eq!(commands(" run ``echo `x` y``"), vec!["echo `x` y"]);
        // triple allows embedded single and double backticks
        assert_eq!(commands(" run ```a `b` ``c`` d```"), vec!["a `b` ``c`` d"]);
        // never closed
        assert!(commands(" run ``echo`").is_empty());
    }

    #[test]
    fn test_more_than_three_backticks_is_rejected() {
        assert!(commands(" run ````x````").is_empty());
    }

    #[test]
    fn test_triple_backticks_span_lines() {
        let text = " run ```\ncargo build\ncargo test\n```";
        let found: Vec<_> = scan(text).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].command, "\ncargo build\ncargo test\n");
        assert_eq!(found[0].span, 1..text.len());
    }

    #[test]
    fn test_single_backtick_does_not_span_lines() {
        assert!(commands(" run `cargo\nbuild`").is_empty());
        assert_eq!(commands(" run `cargo\n run `ls`"), vec!["ls"]);
    }

    #[test]
    fn test_blank_bodies_are_skipped() {
        assert!(commands(" run ```   ```").is_empty());
        assert_eq!(commands(" run `  ` then run `ls`"), vec!["ls"]);
    }

    #[test]
    fn test_span_starts_at_keyword() {
        let text = "see: run t`ls -la`(List)";
        let found: Vec<_> = scan(text).collect();
        assert_eq!(&text[found[0].span.clone()], "run t`ls -la`(List)");
    }

    #[test]
    fn test_scan_is_restartable() {
        let text = " run `a` run `b`";
        assert_eq!(scan(text).count(), 2);
        assert_eq!(scan(text).count(), 2);
    }

    #[test]
    fn test_non_ascii_text_around_annotations() {
        let text = "é run `ls` — ünïcode run `pwd`(Wo bin ich?)";
        let found: Vec<_> = scan(text).collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].command, "pwd");
        assert_eq!(found[1].display_name, Some("Wo bin ich?"));
    }
}
