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

use noisefs::block::{xor3, Block};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_xor3_round_trip(
        original in prop::collection::vec(any::<u8>(), 1..256),
        r1 in prop::collection::vec(any::<u8>(), 1..256),
    ) {
        let len = original.len();
        let o = Block::new(original);
        let r1 = Block::new(r1.into_iter().cycle().take(len).collect::<Vec<u8>>());
        let r2 = Block::new((0u32..len as u32).map(|i| (i % 251) as u8).collect::<Vec<u8>>());

        let anonymized = xor3(&o, &r1, &r2).unwrap();
        let recovered = xor3(&anonymized, &r1, &r2).unwrap();
        prop_assert_eq!(recovered, o);
    }

    #[test]
    fn prop_xor3_commutative(
        a in prop::collection::vec(any::<u8>(), 1..128),
    ) {
        let len = a.len();
        let a = Block::new(a);
        let b = Block::new(vec![0x5A; len]);
        let c = Block::new(vec![0xC3; len]);

        let abc = xor3(&a, &b, &c).unwrap();
        let bca = xor3(&b, &c, &a).unwrap();
        let cab = xor3(&c, &a, &b).unwrap();
        prop_assert_eq!(&abc, &bca);
        prop_assert_eq!(&abc, &cab);
    }
}
