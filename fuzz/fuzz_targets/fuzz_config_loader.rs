#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use slimy::config::ConfigLoader;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        // Only panics matter; load errors are expected.
        let _ = ConfigLoader::default().load_str(yaml_str, Path::new("fuzz.yaml"));
    }
});
