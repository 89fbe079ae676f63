// Copyright (c) 2026 NoiseFS contributors
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use noisefs::descriptor::Descriptor;

fuzz_target!(|data: &[u8]| {
    // Best-effort: decoding untrusted bytes off the backend must never panic.
    if let Ok(d) = Descriptor::from_bytes(data) {
        let _ = d.validate();
    }
});
