//! Proptest generators for property-based testing.

use proptest::prelude::*;

use passvault_core::{Direction, IdentityKeypair, RightTarget, Secret};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = IdentityKeypair> {
    any::<[u8; 32]>().prop_map(|seed| IdentityKeypair::from_seed(&seed))
}

/// Generate a plain subject segment.
pub fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,12}".prop_map(String::from)
}

/// Generate a concrete value name, `VALUES.` plus 1-4 segments.
pub fn value_name() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 1..=4).prop_map(|segments| format!("VALUES.{}", segments.join(".")))
}

/// Generate a right target.
pub fn target() -> impl Strategy<Value = RightTarget> {
    prop_oneof![
        Just(RightTarget::Values),
        Just(RightTarget::Identity),
        Just(RightTarget::System),
    ]
}

/// Generate a direction.
pub fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![
        Just(Direction::Read),
        Just(Direction::Write),
        Just(Direction::Delete),
    ]
}

/// Generate secret bytes of at most `max_len`.
pub fn secret(max_len: usize) -> impl Strategy<Value = Secret> {
    prop::collection::vec(any::<u8>(), 0..=max_len).prop_map(Secret::new)
}

/// The parts of a well-formed rights pattern.
#[derive(Debug, Clone)]
pub struct PatternParams {
    pub directions: Vec<Direction>,
    pub target: RightTarget,
    /// Plain segments or `*`.
    pub segments: Vec<String>,
    /// Whether the pattern ends in `>`.
    pub deep: bool,
}

impl PatternParams {
    /// The subject part, `TARGET.segments[.>]`.
    pub fn subject(&self) -> String {
        let mut subject = self.target.as_str().to_string();
        for segment in &self.segments {
            subject.push('.');
            subject.push_str(segment);
        }
        if self.deep {
            subject.push_str(".>");
        }
        subject
    }

    /// The full pattern, `(dirs)TARGET.segments[.>]`.
    pub fn pattern(&self) -> String {
        let directions: String = self.directions.iter().map(Direction::as_char).collect();
        format!("({}){}", directions, self.subject())
    }
}

impl Arbitrary for PatternParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        let pattern_segment = prop_oneof![4 => segment(), 1 => Just("*".to_string())];
        (
            prop::collection::vec(direction(), 1..=3),
            target(),
            prop::collection::vec(pattern_segment, 0..=3),
            any::<bool>(),
        )
            .prop_map(|(directions, target, segments, deep)| PatternParams {
                directions,
                target,
                // At least one segment must follow the target.
                deep: deep || segments.is_empty(),
                segments,
            })
            .boxed()
    }
}
