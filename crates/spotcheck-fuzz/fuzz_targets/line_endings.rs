#![no_main]
use libfuzzer_sys::fuzz_target;
use spotcheck_core::line_ending::{from_unix, to_unix};
use spotcheck_core::Encoding;

fuzz_target!(|data: &[u8]| {
    // Decoding never panics, whatever the bytes
    let _ = Encoding::Utf8.decode(data);

    if let Ok(latin1) = Encoding::Latin1.decode(data) {
        let unix = to_unix(&latin1);
        assert_eq!(to_unix(&unix), unix);
        if unix.contains('\n') {
            assert!(!unix.contains('\r'));
            let windows = from_unix(&unix, "\r\n");
            assert_eq!(to_unix(&windows), unix);
        }
    }
});
