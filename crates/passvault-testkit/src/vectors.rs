//! Golden test vectors for the rights language.
//!
//! Each vector pins down how a pattern parses or how a pattern matches a
//! value name, so every directory backend and any other client of the same
//! directory agree on the language.

use serde::Deserialize;

use passvault_directory::subject_matches;
use passvault_perms::{parse_rights, PatternError};

/// A pattern and how it must parse.
#[derive(Debug, Clone, Deserialize)]
pub struct ParseVector {
    pub name: String,
    pub input: String,
    /// Expected grants in `(d)PATTERN` form, or absent if parsing must fail.
    #[serde(default)]
    pub grants: Option<Vec<String>>,
    /// Expected error kind when parsing must fail.
    #[serde(default)]
    pub error: Option<ErrorKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Malformed,
    TooManyDirections,
}

/// A pattern, a value name and whether they match.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchVector {
    pub pattern: String,
    pub subject: String,
    pub matches: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoldenVectors {
    pub parse: Vec<ParseVector>,
    pub matching: Vec<MatchVector>,
}

const VECTORS: &str = r#"{
  "parse": [
    { "name": "three directions", "input": "(rwd)VALUES.a.b.c",
      "grants": ["(r)VALUES.a.b.c", "(w)VALUES.a.b.c", "(d)VALUES.a.b.c"] },
    { "name": "deep wildcard", "input": "(r)IDENTITY.a.b.>",
      "grants": ["(r)IDENTITY.a.b.>"] },
    { "name": "direction order kept", "input": "(dr)SYSTEM.backup",
      "grants": ["(d)SYSTEM.backup", "(r)SYSTEM.backup"] },
    { "name": "single wildcard", "input": "(w)VALUES.*.password",
      "grants": ["(w)VALUES.*.password"] },
    { "name": "trailing junk after deep wildcard", "input": "(r)IDENTITY.a.b.>*",
      "error": "malformed" },
    { "name": "missing direction group", "input": "IDENTITY.a.b.>",
      "error": "malformed" },
    { "name": "plural target", "input": "(r)IDENTITIES.a.b.>",
      "error": "malformed" },
    { "name": "singular target", "input": "(r)VALUE.a.b.>",
      "error": "malformed" },
    { "name": "empty direction group", "input": "()VALUES.a",
      "error": "malformed" },
    { "name": "unknown direction", "input": "(x)VALUES.a",
      "error": "malformed" },
    { "name": "bare target", "input": "(r)VALUES",
      "error": "malformed" },
    { "name": "deep wildcard not last", "input": "(r)VALUES.>.a",
      "error": "malformed" },
    { "name": "four directions", "input": "(rwdr)VALUES.a",
      "error": "too_many_directions" }
  ],
  "matching": [
    { "pattern": "VALUES.db.password", "subject": "VALUES.db.password", "matches": true },
    { "pattern": "VALUES.db.*", "subject": "VALUES.db.password", "matches": true },
    { "pattern": "VALUES.db.*", "subject": "VALUES.db.a.b", "matches": false },
    { "pattern": "VALUES.db.>", "subject": "VALUES.db.a.b", "matches": true },
    { "pattern": "VALUES.db.>", "subject": "VALUES.db", "matches": false },
    { "pattern": "VALUES.>", "subject": "VALUES.x", "matches": true },
    { "pattern": "VALUES.*.key", "subject": "VALUES.api.key", "matches": true },
    { "pattern": "VALUES.*.key", "subject": "VALUES.api.token", "matches": false },
    { "pattern": "IDENTITY.>", "subject": "VALUES.x", "matches": false }
  ]
}"#;

/// Load all golden vectors.
pub fn all_vectors() -> serde_json::Result<GoldenVectors> {
    serde_json::from_str(VECTORS)
}

/// Check every vector, returning a description of each mismatch.
pub fn verify_all_vectors() -> serde_json::Result<Vec<String>> {
    let vectors = all_vectors()?;
    let mut failures = Vec::new();

    for vector in &vectors.parse {
        let outcome = parse_rights(&vector.input);
        match (&vector.grants, outcome) {
            (Some(expected), Ok(grants)) => {
                let actual: Vec<String> = grants.iter().map(ToString::to_string).collect();
                if &actual != expected {
                    failures.push(format!("{}: got {:?}", vector.name, actual));
                }
            }
            (Some(_), Err(err)) => failures.push(format!("{}: unexpected error {}", vector.name, err)),
            (None, Ok(grants)) => {
                failures.push(format!("{}: expected an error, got {} grants", vector.name, grants.len()))
            }
            (None, Err(err)) => {
                let kind = match err {
                    PatternError::TooManyDirections { .. } => ErrorKind::TooManyDirections,
                    _ => ErrorKind::Malformed,
                };
                if vector.error != Some(kind) {
                    failures.push(format!("{}: wrong error {}", vector.name, err));
                }
            }
        }
    }

    for vector in &vectors.matching {
        if subject_matches(&vector.pattern, &vector.subject) != vector.matches {
            failures.push(format!(
                "{} vs {}: expected matches={}",
                vector.pattern, vector.subject, vector.matches
            ));
        }
    }

    Ok(failures)
}
