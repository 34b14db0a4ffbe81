//! Property-based tests using proptest

use proptest::prelude::*;
use spotcheck_core::line_ending::{from_unix, to_unix};
use spotcheck_core::step::FnStep;
use spotcheck_core::{
    DirtyState, Encoding, Formatter, LineEnding, PaddedCell, PaddedCellType, PatternMatcher,
};
use std::path::Path;

// Text mixing the three line separators
fn arb_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            "[a-z ]{0,8}".prop_map(|s| s),
            Just("\n".to_string()),
            Just("\r\n".to_string()),
            Just("\r".to_string()),
        ],
        0..20,
    )
    .prop_map(|parts| parts.concat())
}

fn arb_path() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9_-]{1,8}(/[a-z0-9_-]{1,8}){0,3}\\.(rs|txt|md)")
        .expect("valid regex")
}

fn unix_formatter(step: FnStep) -> Formatter {
    Formatter::builder()
        .step(step)
        .line_ending(LineEnding::Unix)
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn test_to_unix_is_idempotent(text in arb_text()) {
        let once = to_unix(&text).into_owned();
        prop_assert_eq!(to_unix(&once).into_owned(), once);
    }

    #[test]
    fn test_to_unix_leaves_no_crlf(text in arb_text()) {
        let unix = to_unix(&text);
        prop_assert!(!unix.contains("\r\n"));
    }

    #[test]
    fn test_windows_endings_normalize_back(text in "[a-z\n ]{0,60}") {
        let windows = from_unix(&text, "\r\n");
        let unix = to_unix(&windows).into_owned();
        prop_assert_eq!(unix, text);
    }

    #[test]
    fn test_utf8_decode_encode(text in "\\PC{0,40}") {
        let bytes = Encoding::Utf8.encode(&text).unwrap().into_owned();
        let decoded = Encoding::Utf8.decode(&bytes).unwrap().into_owned();
        prop_assert_eq!(decoded, text);
    }

    #[test]
    fn test_latin1_accepts_every_byte(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let text = Encoding::Latin1.decode(&bytes).unwrap().into_owned();
        let encoded = Encoding::Latin1.encode(&text).unwrap().into_owned();
        prop_assert_eq!(encoded, bytes);
    }

    #[test]
    fn test_idempotent_step_canonical_is_clean(text in "[a-zA-Z \n]{0,60}") {
        let formatter = unix_formatter(FnStep::new("lower", |s: &str| Ok(s.to_lowercase())));
        let state = DirtyState::calculate(&formatter, Path::new("f"), text.as_bytes()).unwrap();
        let canonical = match &state {
            DirtyState::Clean => text.clone().into_bytes(),
            DirtyState::Dirty(bytes) => bytes.clone(),
            DirtyState::DidNotConverge => return Err(TestCaseError::fail("lowercase converges")),
        };
        prop_assert_eq!(&canonical, &text.to_lowercase().into_bytes());
        let again = DirtyState::calculate(&formatter, Path::new("f"), &canonical).unwrap();
        prop_assert!(again.is_clean());
    }

    #[test]
    fn test_cycle_canonical_is_rotation_invariant(
        steps in prop::collection::btree_set("[a-c]{1,4}", 2..6),
        shift in 0usize..6,
    ) {
        let steps: Vec<String> = steps.into_iter().collect();
        let expected = PaddedCellType::Cycle
            .create("f", steps.clone())
            .canonical()
            .unwrap()
            .to_string();
        let mut rotated = steps;
        let len = rotated.len();
        rotated.rotate_left(shift % len);
        let cell = PaddedCellType::Cycle.create("f", rotated);
        prop_assert_eq!(cell.canonical().unwrap(), expected.as_str());
    }

    #[test]
    fn test_padded_cell_counter_cycles(modulus in 2usize..9, start in 0usize..9) {
        // n -> (n + 1) % modulus cycles through every residue
        let cell = PaddedCell::check_with(Path::new("f"), &start.to_string(), 10, |s| {
            let n: usize = s.parse().unwrap();
            Ok(((n + 1) % modulus).to_string())
        })
        .unwrap();
        prop_assert_eq!(cell.kind(), PaddedCellType::Cycle);
        prop_assert_eq!(cell.steps().len(), modulus);
        prop_assert_eq!(cell.canonical().unwrap(), "0");
    }

    #[test]
    fn test_excludes_always_win(path in arb_path()) {
        let matcher = PatternMatcher::new(&["**"], &["**"]).unwrap();
        prop_assert!(!matcher.matches_sync(&path));
    }

    #[test]
    fn test_extension_glob_matches_only_extension(path in arb_path()) {
        let matcher = PatternMatcher::new(&["**/*.rs"], &[]).unwrap();
        prop_assert_eq!(matcher.matches_sync(&path), path.ends_with(".rs"));
    }
}
