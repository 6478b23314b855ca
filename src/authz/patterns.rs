//! Path patterns for rule sections
//!
//! A rule's path is compiled into a sequence of [`Segment`]s. Plain sections
//! only produce literal segments; glob sections may use wildcards:
//!
//! | segment   | meaning                                   |
//! |-----------|-------------------------------------------|
//! | `*`       | exactly one path component                |
//! | `**`      | zero or more path components              |
//! | `text*`   | one component starting with `text`        |
//! | `*text`   | one component ending with `text`          |
//! | other     | shell glob (`*`, `?`, `[...]`) on one component |
//!
//! A backslash escapes the next character.

use crate::error::{AuthzError, AuthzResult};
use regex::Regex;
use std::fmt;

/// One compiled component of a rule path
#[derive(Debug, Clone)]
pub enum Segment {
    Literal(String),
    AnySegment,
    AnyRecursive,
    Prefix(String),
    Suffix(String),
    FnMatch(GlobSegment),
}

/// Shell-glob segment compiled to an anchored regex
#[derive(Debug, Clone)]
pub struct GlobSegment {
    source: String,
    regex: Regex,
}

impl GlobSegment {
    fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&glob_to_regex(source))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// The glob as written in the rule
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for GlobSegment {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for GlobSegment {}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Segment::Literal(a), Segment::Literal(b)) => a == b,
            (Segment::AnySegment, Segment::AnySegment) => true,
            (Segment::AnyRecursive, Segment::AnyRecursive) => true,
            (Segment::Prefix(a), Segment::Prefix(b)) => a == b,
            (Segment::Suffix(a), Segment::Suffix(b)) => a == b,
            (Segment::FnMatch(a), Segment::FnMatch(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Segment {}

impl Segment {
    /// Check a single path component against this segment.
    ///
    /// `AnyRecursive` is handled by [`PathPattern::matches`].
    fn matches_component(&self, component: &str) -> bool {
        match self {
            Segment::Literal(text) => component == text,
            Segment::AnySegment => true,
            Segment::AnyRecursive => true,
            Segment::Prefix(prefix) => component.starts_with(prefix.as_str()),
            Segment::Suffix(suffix) => component.ends_with(suffix.as_str()),
            Segment::FnMatch(glob) => glob.regex.is_match(component),
        }
    }

    pub const fn is_literal(&self) -> bool {
        matches!(self, Segment::Literal(_))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(text) => write!(f, "{text}"),
            Segment::AnySegment => write!(f, "*"),
            Segment::AnyRecursive => write!(f, "**"),
            Segment::Prefix(prefix) => write!(f, "{prefix}*"),
            Segment::Suffix(suffix) => write!(f, "*{suffix}"),
            Segment::FnMatch(glob) => write!(f, "{}", glob.as_str()),
        }
    }
}

/// Compiled rule path; an empty pattern is the repository root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a canonical absolute path.
    ///
    /// `section` is only used for error context.
    pub fn compile(path: &str, glob: bool, section: &str) -> AuthzResult<Self> {
        let mut segments = Vec::new();

        for component in path.split('/').filter(|c| !c.is_empty()) {
            let segment = if glob {
                compile_glob_segment(component).map_err(|e| AuthzError::InvalidGlobPattern {
                    section: section.to_string(),
                    pattern: component.to_string(),
                    reason: e.to_string(),
                })?
            } else {
                Segment::Literal(component.to_string())
            };

            // `**/**` is the same as `**`
            if segment == Segment::AnyRecursive && segments.last() == Some(&Segment::AnyRecursive)
            {
                continue;
            }
            segments.push(segment);
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether any segment is a wildcard
    pub fn is_glob(&self) -> bool {
        self.segments.iter().any(|s| !s.is_literal())
    }

    /// Match a path given as its components (root = empty slice)
    pub fn matches(&self, components: &[&str]) -> bool {
        match_segments(&self.segments, components)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

fn match_segments(segments: &[Segment], components: &[&str]) -> bool {
    match segments.split_first() {
        None => components.is_empty(),
        Some((Segment::AnyRecursive, rest)) => {
            (0..=components.len()).any(|skip| match_segments(rest, &components[skip..]))
        }
        Some((segment, rest)) => match components.split_first() {
            Some((component, tail)) => {
                segment.matches_component(component) && match_segments(rest, tail)
            }
            None => false,
        },
    }
}

fn is_wildcard(c: char) -> bool {
    matches!(c, '*' | '?' | '[')
}

/// Remove backslash escapes; a trailing lone backslash is literal
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(chars.next().unwrap_or('\\'));
        } else {
            out.push(c);
        }
    }
    out
}

/// Find unescaped wildcard characters, returning their char indices
fn wildcard_positions(text: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut escaped = false;
    for (i, c) in text.chars().enumerate() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if is_wildcard(c) {
            positions.push(i);
        }
    }
    positions
}

fn compile_glob_segment(component: &str) -> Result<Segment, regex::Error> {
    match component {
        "*" => return Ok(Segment::AnySegment),
        "**" => return Ok(Segment::AnyRecursive),
        _ => {}
    }

    let wildcards = wildcard_positions(component);
    let char_count = component.chars().count();

    if wildcards.is_empty() {
        return Ok(Segment::Literal(unescape(component)));
    }

    if wildcards.len() == 1 {
        let position = wildcards[0];
        let star = component.chars().nth(position) == Some('*');
        if star && position == char_count - 1 {
            return Ok(Segment::Prefix(unescape(&component[..component.len() - 1])));
        }
        if star && position == 0 {
            return Ok(Segment::Suffix(unescape(&component[1..])));
        }
    }

    GlobSegment::new(component).map(Segment::FnMatch)
}

/// Translate a single-component shell glob into an anchored regex
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    let chars: Vec<char> = glob.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' if i + 1 < chars.len() => {
                i += 1;
                out.push_str(&regex::escape(&chars[i].to_string()));
            }
            '[' => match bracket_end(&chars, i) {
                Some(end) => {
                    out.push('[');
                    let mut j = i + 1;
                    if matches!(chars[j], '!' | '^') {
                        out.push('^');
                        j += 1;
                    }
                    while j < end {
                        match chars[j] {
                            '\\' if j + 1 < end => {
                                j += 1;
                                out.push('\\');
                                out.push(chars[j]);
                            }
                            c @ ('[' | ']' | '&' | '~' | '^' | '\\') => {
                                out.push('\\');
                                out.push(c);
                            }
                            c => out.push(c),
                        }
                        j += 1;
                    }
                    out.push(']');
                    i = end;
                }
                None => out.push_str(r"\["),
            },
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    out.push('$');
    out
}

/// Index of the `]` closing the bracket expression opened at `start`
fn bracket_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if j < chars.len() && matches!(chars[j], '!' | '^') {
        j += 1;
    }
    // A leading `]` is part of the set
    if j < chars.len() && chars[j] == ']' {
        j += 1;
    }
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            ']' => return Some(j),
            _ => j += 1,
        }
    }
    None
}
