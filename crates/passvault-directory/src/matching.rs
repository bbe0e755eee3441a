//! Subject matching for rights patterns.
//!
//! Subjects are dot-separated tokens. In a pattern, `*` matches exactly one
//! token and `>` (last token only) matches one or more remaining tokens.
//! Anything else must match literally.

use passvault_core::{Direction, Grant, RightTarget};

/// Whether `pattern` matches the concrete `subject`.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (None, None) => return true,
            (Some(">"), Some(_)) => return pattern_tokens.next().is_none(),
            (Some("*"), Some(_)) => {}
            (Some(p), Some(s)) if p == s => {}
            _ => return false,
        }
    }
}

/// Whether a grant lets its holder read the value called `name`.
pub fn grants_value_read(grant: &Grant, name: &str) -> bool {
    grant.direction == Direction::Read
        && grant.target == RightTarget::Values
        && subject_matches(&grant.pattern, name)
}
