// Copyright (c) 2026 NoiseFS contributors
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use noisefs::announcement::types::Announcement;
use noisefs::announcement::validation::AnnouncementValidator;
use noisefs::announcement::ValidationConfig;

fuzz_target!(|data: &[u8]| {
    // Announcements arrive over gossipsub from arbitrary peers; decoding
    // and validating them must never panic regardless of input.
    if let Ok(ann) = Announcement::from_bytes(data) {
        let validator = AnnouncementValidator::new(ValidationConfig::default());
        let _ = validator.validate(&ann, 1_700_000_000);
    }
});
