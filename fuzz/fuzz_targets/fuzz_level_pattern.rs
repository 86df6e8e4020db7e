#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use logpipe::logger::LoggerRegistry;
use logpipe::output::DistributionEngine;

fuzz_target!(|data: &[u8]| {
    if let Ok(pattern) = std::str::from_utf8(data) {
        let registry = LoggerRegistry::new(Arc::new(DistributionEngine::new()));
        // An accepted pattern must survive a render/apply round trip
        if registry.set_levels(pattern).is_ok() {
            let rendered = registry.levels_pattern();
            let again = LoggerRegistry::new(Arc::new(DistributionEngine::new()));
            again.set_levels(&rendered).expect("rendered pattern is valid");
            assert_eq!(again.levels_pattern(), rendered);
        }
    }
});
