//! The rights pattern language.
//!
//! A rights pattern grants one or more directions on a hierarchical subject:
//!
//! ```text
//! (rwd)VALUES.db.*        read, write and delete any direct child of VALUES.db
//! (r)IDENTITY.team.>      read any identity below IDENTITY.team
//! ```
//!
//! Grammar: `"(" [rwd]{1,3} ")" TARGET ("." segment)+`, where `TARGET` is one
//! of `VALUES`, `IDENTITY`, `SYSTEM` and a segment is `[a-z0-9_-]+`, a
//! single-token wildcard `*`, or (last position only) the deep wildcard `>`.
//!
//! Parsing never interprets wildcards; it only preserves them. Matching
//! patterns against names is the directory's job.

use passvault_core::{Direction, Grant, RightTarget};

use crate::error::{PatternError, Result};

/// Maximum number of direction letters in one pattern.
pub const MAX_DIRECTIONS: usize = 3;

/// Single-token wildcard.
pub const WILDCARD_ONE: &str = "*";

/// Deep wildcard: one or more trailing tokens.
pub const WILDCARD_DEEP: &str = ">";

/// Parse a rights pattern into one grant per direction letter.
///
/// Grants come out in the order the letters appear. Every grant carries the
/// same target and the same `TARGET.segments` pattern string.
pub fn parse_rights(pattern: &str) -> Result<Vec<Grant>> {
    let malformed = |reason: &str| PatternError::MalformedPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let rest = pattern
        .strip_prefix('(')
        .ok_or_else(|| malformed("missing direction group"))?;
    let (directions, subject) = rest
        .split_once(')')
        .ok_or_else(|| malformed("unterminated direction group"))?;

    if directions.is_empty() {
        return Err(malformed("empty direction group"));
    }
    let directions = directions
        .chars()
        .map(|c| Direction::from_char(c).ok_or_else(|| malformed("directions must be r, w or d")))
        .collect::<Result<Vec<_>>>()?;

    let target = parse_subject(subject).map_err(|reason| malformed(&reason))?;

    if directions.len() > MAX_DIRECTIONS {
        return Err(PatternError::TooManyDirections {
            pattern: pattern.to_string(),
            count: directions.len(),
        });
    }

    Ok(directions
        .into_iter()
        .map(|direction| Grant {
            direction,
            target,
            pattern: subject.to_string(),
        })
        .collect())
}

/// Parse several patterns, failing on the first bad one.
pub fn parse_all<'a, I>(patterns: I) -> Result<Vec<Grant>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut grants = Vec::new();
    for pattern in patterns {
        grants.extend(parse_rights(pattern)?);
    }
    Ok(grants)
}

/// Check that a value name is concrete: `VALUES` followed by one or more
/// plain segments, with no wildcard anywhere.
pub fn validate_value_name(name: &str) -> Result<()> {
    if name.contains(WILDCARD_ONE) || name.contains(WILDCARD_DEEP) {
        return Err(PatternError::WildcardInName(name.to_string()));
    }

    let malformed = |reason: &str| PatternError::MalformedName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    match parse_subject(name) {
        Ok(RightTarget::Values) => Ok(()),
        Ok(other) => Err(malformed(&format!("values live under VALUES, not {}", other))),
        Err(reason) => Err(malformed(&reason)),
    }
}

/// Validate `TARGET.segment...` and return the target.
fn parse_subject(subject: &str) -> std::result::Result<RightTarget, String> {
    let mut tokens = subject.split('.');

    let target_token = tokens.next().unwrap_or_default();
    let target = RightTarget::parse(target_token)
        .ok_or_else(|| format!("unknown target {:?}", target_token))?;

    let segments: Vec<&str> = tokens.collect();
    if segments.is_empty() {
        return Err("at least one segment must follow the target".into());
    }

    let last = segments.len() - 1;
    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            "" => return Err("empty segment".into()),
            WILDCARD_ONE => {}
            WILDCARD_DEEP if i == last => {}
            WILDCARD_DEEP => return Err("> is only allowed as the last segment".into()),
            s if s.chars().all(is_segment_char) => {}
            s => return Err(format!("invalid segment {:?}", s)),
        }
    }

    Ok(target)
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'
}
