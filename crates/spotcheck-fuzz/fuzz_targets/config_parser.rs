#![no_main]
use libfuzzer_sys::fuzz_target;
use spotcheck_core::SpotConfig;
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Fuzz YAML config loading and step construction
        if let Ok(config) = SpotConfig::from_yaml(s) {
            for format in &config.formats {
                let _ = format.matcher();
                let _ = format.formatter(&config, Path::new("/fuzz"));
            }
        }
    }
});
