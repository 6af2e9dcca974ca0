#![deny(missing_docs)]

//! # Overview
//!
//! Turns the forward-slash-separated `filename` field of an `INFO_REPLY`
//! into a safe relative [`PathBuf`] the client can create and
//! memory-map. The server never trusts its own listing blindly either:
//! the same [`sanitize`] function bounds the path it advertises.
//!
//! # Rules
//!
//! - Split on `/`.
//! - Drop `.` segments.
//! - On `..`, pop the previous segment; at root, this is a no-op rather
//!   than an escape.
//! - Reject any segment containing `\`, `:`, `*`, `?`, `<`, `>`, or `|`
//!   (the characters unsafe on Windows-like hosts, rejected everywhere
//!   for a uniform cross-platform name).
//! - Reject paths with more than [`MAX_SEGMENTS`] raw segments.

use std::path::PathBuf;
use thiserror::Error;

/// The maximum number of `/`-separated segments a path may contain before
/// being rejected outright.
pub const MAX_SEGMENTS: usize = 256;

/// Errors [`sanitize`] can return.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// The path had more than [`MAX_SEGMENTS`] segments.
    #[error("path has too many segments ({0} > {MAX_SEGMENTS})")]
    TooManySegments(usize),
    /// A segment contained a character unsafe on Windows-like hosts.
    #[error("path segment {0:?} contains an unsafe character")]
    UnsafeSegment(String),
}

/// Sanitises `path` into a safe relative path.
///
/// # Errors
///
/// Returns [`PathError::TooManySegments`] or [`PathError::UnsafeSegment`]
/// per the rules above.
pub fn sanitize(path: &str) -> Result<PathBuf, PathError> {
    let raw_segments: Vec<&str> = path.split('/').collect();
    if raw_segments.len() > MAX_SEGMENTS {
        return Err(PathError::TooManySegments(raw_segments.len()));
    }

    let mut stack: Vec<&str> = Vec::new();
    for segment in raw_segments {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            stack.pop();
            continue;
        }
        if segment.chars().any(is_unsafe_char) {
            return Err(PathError::UnsafeSegment(segment.to_string()));
        }
        stack.push(segment);
    }

    Ok(stack.into_iter().collect())
}

const fn is_unsafe_char(c: char) -> bool {
    matches!(c, '\\' | ':' | '*' | '?' | '<' | '>' | '|')
}

#[cfg(test)]
mod tests {
    use super::{MAX_SEGMENTS, PathError, sanitize};
    use std::path::PathBuf;

    #[test]
    fn joins_plain_segments() {
        assert_eq!(sanitize("a/b/c").unwrap(), PathBuf::from("a/b/c"));
    }

    #[test]
    fn drops_dot_segments() {
        assert_eq!(sanitize("a/./b").unwrap(), PathBuf::from("a/b"));
    }

    #[test]
    fn drops_empty_segments_from_double_slash() {
        assert_eq!(sanitize("a//b").unwrap(), PathBuf::from("a/b"));
    }

    #[test]
    fn dotdot_pops_previous_segment() {
        assert_eq!(sanitize("a/b/../c").unwrap(), PathBuf::from("a/c"));
    }

    #[test]
    fn dotdot_at_root_is_a_no_op() {
        assert_eq!(sanitize("../../etc/passwd").unwrap(), PathBuf::from("etc/passwd"));
    }

    #[test]
    fn leading_slash_is_treated_as_relative() {
        assert_eq!(sanitize("/a/b").unwrap(), PathBuf::from("a/b"));
    }

    #[test]
    fn rejects_backslash() {
        assert_eq!(
            sanitize(r"a\b").unwrap_err(),
            PathError::UnsafeSegment(r"a\b".to_string())
        );
    }

    #[test]
    fn rejects_each_unsafe_character() {
        for ch in [':', '*', '?', '<', '>', '|'] {
            let segment = format!("a{ch}b");
            assert_eq!(
                sanitize(&segment).unwrap_err(),
                PathError::UnsafeSegment(segment)
            );
        }
    }

    #[test]
    fn rejects_too_many_segments() {
        let path = "a/".repeat(MAX_SEGMENTS + 1);
        assert!(matches!(
            sanitize(&path).unwrap_err(),
            PathError::TooManySegments(_)
        ));
    }

    #[test]
    fn accepts_exactly_max_segments() {
        let path = (0..MAX_SEGMENTS)
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("/");
        assert!(sanitize(&path).is_ok());
    }

    #[test]
    fn empty_path_yields_empty_buf() {
        assert_eq!(sanitize("").unwrap(), PathBuf::new());
    }
}
