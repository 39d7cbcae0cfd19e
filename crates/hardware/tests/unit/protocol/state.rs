//! Coherence State Tests.

use cohsim_core::protocol::CoherenceState;
use rstest::rstest;

#[rstest]
#[case(CoherenceState::Invalid, 0b00, 'I')]
#[case(CoherenceState::Exclusive, 0b01, 'E')]
#[case(CoherenceState::Modified, 0b10, 'M')]
#[case(CoherenceState::Shared, 0b11, 'S')]
fn encodings(#[case] state: CoherenceState, #[case] bits: u8, #[case] letter: char) {
    assert_eq!(state.encoding(), bits);
    assert_eq!(CoherenceState::from_encoding(bits), state);
    assert_eq!(state.letter(), letter);
}

#[test]
fn default_is_invalid() {
    assert_eq!(CoherenceState::default(), CoherenceState::Invalid);
}

#[test]
fn predicates() {
    use CoherenceState::{Exclusive, Invalid, Modified, Shared};
    assert!(!Invalid.is_valid());
    assert!(Shared.is_valid() && !Shared.is_owner());
    assert!(Exclusive.is_owner() && !Exclusive.is_dirty());
    assert!(Modified.is_owner() && Modified.is_dirty());
}

#[test]
fn display_names() {
    assert_eq!(CoherenceState::Shared.to_string(), "SHARED");
    assert_eq!(CoherenceState::Modified.to_string(), "MODIFIED");
}
