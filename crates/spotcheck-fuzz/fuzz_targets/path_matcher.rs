#![no_main]
use libfuzzer_sys::fuzz_target;
use spotcheck_core::PatternMatcher;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // First line = include, second line = exclude, rest = path
        let mut parts = s.splitn(3, '\n');
        let (Some(include), Some(exclude), Some(path)) = (parts.next(), parts.next(), parts.next())
        else {
            return;
        };
        if let Ok(matcher) = PatternMatcher::new(&[include], &[exclude]) {
            let matched = matcher.matches_sync(path);
            if let Ok(excluded) = PatternMatcher::new(&[exclude], &[] as &[&str]) {
                if excluded.matches_sync(path) {
                    assert!(!matched, "exclude must win for {:?}", path);
                }
            }
        }
    }
});
