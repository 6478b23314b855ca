//! Section/option event source
//!
//! Tokenizes the INI-like rule file format and streams its contents to a
//! [`SectionHandler`] in file order. The handler decides what the sections
//! and options mean; this module only knows about lines.
//!
//! ```text
//! # full-line comment
//! [section name]
//! option = value          ; inline comment
//! other: value
//!   continued value       (indented, continues the previous value)
//!   next = value          (indented, but `=` before any `:` starts a new option)
//! ```

use crate::error::{AuthzError, AuthzResult};

/// Receiver of section/option events
pub trait SectionHandler {
    /// A `[section]` header was read
    fn open_section(&mut self, section: &str) -> AuthzResult<()>;

    /// An option of the currently open section was read
    fn add_value(&mut self, section: &str, option: &str, value: &str) -> AuthzResult<()>;

    /// The section ends (next header or end of input)
    fn close_section(&mut self, section: &str) -> AuthzResult<()>;
}

/// Option waiting for possible continuation lines
struct PendingOption {
    line: usize,
    name: String,
    value: String,
}

/// Stream `text` to `handler`, stopping at the first error
pub fn parse_source<H: SectionHandler + ?Sized>(text: &str, handler: &mut H) -> AuthzResult<()> {
    let mut section: Option<String> = None;
    let mut pending: Option<PendingOption> = None;

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim_end_matches('\r');
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        // Continuation of the previous option's value
        if line.starts_with(char::is_whitespace)
            && !starts_option(trimmed)
            && let Some(option) = pending.as_mut()
        {
            let extra = strip_inline_comment(trimmed);
            if !extra.is_empty() {
                if !option.value.is_empty() {
                    option.value.push(' ');
                }
                option.value.push_str(extra);
            }
            continue;
        }

        if let Some(option) = pending.take() {
            emit(handler, section.as_deref(), option)?;
        }

        if trimmed.starts_with('[') {
            let name = parse_header(trimmed, line_no)?;
            if let Some(previous) = section.take() {
                handler.close_section(&previous)?;
            }
            handler.open_section(&name)?;
            section = Some(name);
            continue;
        }

        pending = Some(parse_option(trimmed, line_no)?);
    }

    if let Some(option) = pending.take() {
        emit(handler, section.as_deref(), option)?;
    }
    if let Some(last) = section {
        handler.close_section(&last)?;
    }

    Ok(())
}

fn emit<H: SectionHandler + ?Sized>(
    handler: &mut H,
    section: Option<&str>,
    option: PendingOption,
) -> AuthzResult<()> {
    let Some(section) = section else {
        return Err(AuthzError::syntax(
            option.line,
            format!("option '{}' appears before any section", option.name),
        ));
    };
    handler.add_value(section, &option.name, &option.value)
}

/// The header ends at the first `]` followed only by whitespace or a
/// comment, so glob brackets inside the name survive.
fn parse_header(trimmed: &str, line_no: usize) -> AuthzResult<String> {
    let mut closers = trimmed.match_indices(']').map(|(i, _)| i).peekable();
    if closers.peek().is_none() {
        return Err(AuthzError::syntax(line_no, "unterminated section header"));
    }

    let end = closers.find(|&i| {
        let rest = trimmed[i + 1..].trim_start();
        rest.is_empty() || rest.starts_with('#') || rest.starts_with(';')
    });
    let Some(end) = end else {
        return Err(AuthzError::syntax(
            line_no,
            format!("unexpected text after section header: '{trimmed}'"),
        ));
    };

    let name = trimmed[1..end].trim();
    if name.is_empty() {
        return Err(AuthzError::syntax(line_no, "empty section name"));
    }
    Ok(name.to_string())
}

/// An indented line is a new option only when `=` is its first separator,
/// so continued member lists may hold names such as `DOMAIN:bob`
fn starts_option(trimmed: &str) -> bool {
    trimmed
        .find(['=', ':'])
        .is_some_and(|i| trimmed.as_bytes()[i] == b'=')
}

fn parse_option(trimmed: &str, line_no: usize) -> AuthzResult<PendingOption> {
    let Some(split) = trimmed.find(['=', ':']) else {
        return Err(AuthzError::syntax(
            line_no,
            format!("expected 'name = value', found '{trimmed}'"),
        ));
    };

    let name = trimmed[..split].trim();
    if name.is_empty() {
        return Err(AuthzError::syntax(line_no, "empty option name"));
    }

    Ok(PendingOption {
        line: line_no,
        name: name.to_string(),
        value: strip_inline_comment(trimmed[split + 1..].trim()).to_string(),
    })
}

/// Drop a trailing `; comment` or `# comment` introduced by whitespace
fn strip_inline_comment(value: &str) -> &str {
    let bytes = value.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if (b == b'#' || b == b';') && (i == 0 || bytes[i - 1].is_ascii_whitespace()) {
            return value[..i].trim_end();
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl SectionHandler for Recorder {
        fn open_section(&mut self, section: &str) -> AuthzResult<()> {
            self.events.push(format!("open {section}"));
            Ok(())
        }

        fn add_value(&mut self, section: &str, option: &str, value: &str) -> AuthzResult<()> {
            self.events.push(format!("{section}: {option}={value}"));
            Ok(())
        }

        fn close_section(&mut self, section: &str) -> AuthzResult<()> {
            self.events.push(format!("close {section}"));
            Ok(())
        }
    }

    fn record(text: &str) -> AuthzResult<Vec<String>> {
        let mut recorder = Recorder::default();
        parse_source(text, &mut recorder)?;
        Ok(recorder.events)
    }

    #[test]
    fn test_events_in_file_order() {
        let events = record(
            "[groups]\nadmins = harry, sally\n\n[greek:/A]\n@admins = rw\n* = r\n",
        )
        .unwrap();
        assert_eq!(
            events,
            vec![
                "open groups",
                "groups: admins=harry, sally",
                "close groups",
                "open greek:/A",
                "greek:/A: @admins=rw",
                "greek:/A: *=r",
                "close greek:/A",
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let events = record(
            "# leading comment\n; another\n[/]        ; any repository\n* = r   ; read for all\n",
        )
        .unwrap();
        assert_eq!(events, vec!["open /", "/: *=r", "close /"]);
    }

    #[test]
    fn test_colon_separator_and_empty_value() {
        let events = record("[/trunk]\nharry: rw\nsally =\n").unwrap();
        assert_eq!(
            events,
            vec!["open /trunk", "/trunk: harry=rw", "/trunk: sally=", "close /trunk"]
        );
    }

    #[test]
    fn test_continuation_lines() {
        let events = record("[groups]\nteam = harry,\n   sally,\n   joe\n").unwrap();
        assert_eq!(
            events,
            vec!["open groups", "groups: team=harry, sally, joe", "close groups"]
        );
    }

    #[test]
    fn test_indented_options_are_not_continuations() {
        let events = record("[/]\n  harry = rw\n  sally = r\n").unwrap();
        assert_eq!(events, vec!["open /", "/: harry=rw", "/: sally=r", "close /"]);
    }

    #[test]
    fn test_continued_names_may_contain_colons() {
        let events = record("[groups]\nteam = harry,\n    DOMAIN:bob\n").unwrap();
        assert_eq!(
            events,
            vec!["open groups", "groups: team=harry, DOMAIN:bob", "close groups"]
        );
    }

    #[test]
    fn test_indented_colon_option_continues() {
        let events = record("[/]\nharry = r\n  sally: rw\n").unwrap();
        assert_eq!(events, vec!["open /", "/: harry=r sally: rw", "close /"]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let events = record("[/]\r\n* = r\r\n").unwrap();
        assert_eq!(events, vec!["open /", "/: *=r", "close /"]);
    }

    #[test]
    fn test_option_before_section_is_an_error() {
        let err = record("harry = rw\n").unwrap_err();
        assert!(matches!(err, AuthzError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_missing_separator_is_an_error() {
        let err = record("[/]\nharry\n").unwrap_err();
        assert!(matches!(err, AuthzError::Syntax { line: 2, .. }));
    }

    #[test]
    fn test_unterminated_header_is_an_error() {
        let err = record("[/trunk\n").unwrap_err();
        assert!(matches!(err, AuthzError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_header_with_brackets() {
        let events = record("[:glob:/a[bc]d]  # see [x]\n* = r\n").unwrap();
        assert_eq!(events, vec!["open :glob:/a[bc]d", ":glob:/a[bc]d: *=r", "close :glob:/a[bc]d"]);
    }

    #[test]
    fn test_text_after_header_is_an_error() {
        let err = record("[/trunk] junk\n").unwrap_err();
        assert!(matches!(err, AuthzError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_empty_input() {
        assert!(record("").unwrap().is_empty());
    }

    #[test]
    fn test_inline_comment_needs_leading_whitespace() {
        assert_eq!(strip_inline_comment("a#b"), "a#b");
        assert_eq!(strip_inline_comment("a #b"), "a");
        assert_eq!(strip_inline_comment("rw ; note"), "rw");
    }
}
