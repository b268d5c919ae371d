//! Hierarchical wildcard matching for request paths.
//!
//! Patterns are Ant-style and compared segment by segment:
//! - `*` matches exactly one segment, whatever its content (including empty)
//! - `**` matches zero or more whole segments
//! - `{name}` (anywhere in a segment) matches exactly one segment
//! - `*` and `?` inside other text glob within a single segment (`*.json`, `v?`)
//! - anything else is a literal, compared case-sensitively
//!
//! The whole path must be consumed: `/users/*` matches `/users/42` but not
//! `/users/42/profile`, whereas `/users/**` matches `/users`, `/users/42` and
//! `/users/42/profile`.
//!
//! Request paths go through [`normalize_request_path`] before matching, so a
//! pattern never sees `.`/`..` segments or percent-encoded separators.

use std::fmt;

use thiserror::Error;

const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*` or a `{placeholder}` segment
    Single,
    /// In-segment glob with `*` / `?`
    Glob(Vec<char>),
    /// `**`
    Deep,
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if raw == "**" {
            Self::Deep
        } else if raw == "*" || is_placeholder(raw) {
            Self::Single
        } else if raw.contains(['*', '?']) {
            Self::Glob(raw.chars().collect())
        } else {
            Self::Literal(raw.to_string())
        }
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Self::Literal(literal) => literal == segment,
            Self::Single | Self::Deep => true,
            Self::Glob(pattern) => glob_match(pattern, segment),
        }
    }
}

fn is_placeholder(raw: &str) -> bool {
    raw.find('{')
        .is_some_and(|open| raw[open + 1..].contains('}'))
}

/// A pre-tokenized path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    absolute: bool,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        let (absolute, parts) = split_segments(pattern);
        Self {
            raw: pattern.to_string(),
            absolute,
            segments: parts.into_iter().map(Segment::parse).collect(),
        }
    }

    /// Check whether `path` is fully matched by this pattern.
    pub fn matches(&self, path: &str) -> bool {
        let (absolute, parts) = split_segments(path);
        if absolute != self.absolute {
            return false;
        }
        match_segments(&self.segments, &parts)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Match a concrete request path against a wildcard pattern.
pub fn matches(pattern: &str, path: &str) -> bool {
    PathPattern::parse(pattern).matches(path)
}

/// Why a request path was refused before matching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestPathError {
    #[error("Request path is not valid percent-encoded UTF-8")]
    Encoding,

    #[error("Request path contains an encoded or backslash separator")]
    EncodedSeparator,

    #[error("Request path contains the dot segment `{0}`")]
    DotSegment(String),
}

/// Percent-decode a request path for matching.
///
/// Paths a server could resolve to a different resource than the one
/// matched are refused: `.` and `..` segments (literal, encoded or double
/// encoded), encoded `/`, and backslashes in any form.
pub fn normalize_request_path(raw: &str) -> Result<String, RequestPathError> {
    let decoded = urlencoding::decode(raw).map_err(|_| RequestPathError::Encoding)?;

    if decoded.matches(SEPARATOR).count() != raw.matches(SEPARATOR).count()
        || decoded.contains('\\')
    {
        return Err(RequestPathError::EncodedSeparator);
    }

    if let Some(segment) = decoded.split(SEPARATOR).find(|s| is_dot_segment(s)) {
        return Err(RequestPathError::DotSegment(segment.to_string()));
    }

    Ok(decoded.into_owned())
}

fn is_dot_segment(segment: &str) -> bool {
    if matches!(segment, "." | "..") {
        return true;
    }
    // `%252e` survives one decode as `%2e`
    segment.contains('%')
        && urlencoding::decode(segment).is_ok_and(|again| matches!(again.as_ref(), "." | ".."))
}

fn split_segments(path: &str) -> (bool, Vec<&str>) {
    match path.strip_prefix(SEPARATOR) {
        Some(rest) => (true, rest.split(SEPARATOR).collect()),
        None => (false, path.split(SEPARATOR).collect()),
    }
}

/// Segment-level matching with backtracking on `**`.
///
/// `deep` remembers the pattern position just after the most recent `**`
/// and `absorbed` how many path segments it has swallowed so far. On a
/// mismatch the `**` takes one more segment and matching resumes.
fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    let mut p_idx = 0;
    let mut s_idx = 0;
    let mut deep: Option<usize> = None;
    let mut absorbed = 0;

    while let Some(segment) = path.get(s_idx) {
        match pattern.get(p_idx) {
            Some(Segment::Deep) => {
                p_idx += 1;
                deep = Some(p_idx);
                absorbed = s_idx;
            }
            Some(expected) if expected.matches(segment) => {
                p_idx += 1;
                s_idx += 1;
            }
            _ => match deep {
                Some(resume) => {
                    p_idx = resume;
                    absorbed += 1;
                    s_idx = absorbed;
                }
                None => return false,
            },
        }
    }

    // Path consumed: only trailing `**` may remain.
    pattern[p_idx..].iter().all(|s| *s == Segment::Deep)
}

/// Glob within one segment: `*` matches any run of characters, `?` exactly one.
fn glob_match(pattern: &[char], value: &str) -> bool {
    let value: Vec<char> = value.chars().collect();
    let mut p_idx = 0;
    let mut v_idx = 0;
    let mut star: Option<usize> = None;
    let mut match_idx = 0;

    while v_idx < value.len() {
        match pattern.get(p_idx).copied() {
            Some('*') => {
                while pattern.get(p_idx) == Some(&'*') {
                    p_idx += 1;
                }
                star = Some(p_idx);
                match_idx = v_idx;
            }
            Some('?') => {
                p_idx += 1;
                v_idx += 1;
            }
            Some(c) if c == value[v_idx] => {
                p_idx += 1;
                v_idx += 1;
            }
            _ => match star {
                Some(resume) => {
                    p_idx = resume;
                    match_idx += 1;
                    v_idx = match_idx;
                }
                None => return false,
            },
        }
    }

    pattern[p_idx..].iter().all(|c| *c == '*')
}
