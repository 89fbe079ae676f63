// Copyright (c) 2026 NoiseFS contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

use noisefs::descriptor::Descriptor;
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_descriptor_bytes_round_trip_is_exact(
        filename in "[a-zA-Z0-9_./-]{1,32}",
        block_count in 1usize..16,
        block_size in 1u64..4096,
        created_at in 0i64..2_000_000_000,
    ) {
        let file_size = block_size * block_count as u64;
        let mut descriptor = Descriptor::new(filename, file_size, block_size, created_at);
        for i in 0..block_count {
            descriptor
                .add_triple(format!("bafyData{i}"), format!("bafyR1-{i}"), format!("bafyR2-{i}"))
                .unwrap();
        }

        let bytes = descriptor.to_bytes().unwrap();
        let decoded = Descriptor::from_bytes(&bytes).unwrap();
        prop_assert_eq!(&decoded, &descriptor);

        let bytes_again = decoded.to_bytes().unwrap();
        prop_assert_eq!(bytes, bytes_again);
        prop_assert!(decoded.validate().is_ok());
    }
}
