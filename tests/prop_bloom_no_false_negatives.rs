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

use noisefs::announcement::bloom::BloomFilter;
use proptest::collection::hash_set;
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_bloom_never_false_negative(
        tags in hash_set("[a-z]{1,12}", 1..40),
    ) {
        let tags: Vec<String> = tags.into_iter().collect();
        let filter = BloomFilter::from_tags(&tags, 0.01);
        for tag in &tags {
            prop_assert!(filter.test(tag));
        }
    }

    #[test]
    fn prop_bloom_wire_round_trip(
        tags in hash_set("[a-z]{1,12}", 1..20),
    ) {
        let tags: Vec<String> = tags.into_iter().collect();
        let filter = BloomFilter::from_tags(&tags, 0.01);
        let encoded = filter.to_base64url();
        let decoded = BloomFilter::from_base64url(&encoded).unwrap();
        for tag in &tags {
            prop_assert!(decoded.test(tag));
        }
    }
}
