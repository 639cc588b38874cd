// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Version comparison must be antisymmetric for any pair of strings

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use resdeps::version;

#[derive(Arbitrary, Debug)]
struct Pair<'a> {
    left: &'a str,
    right: &'a str,
}

fuzz_target!(|pair: Pair<'_>| {
    let forward = version::compare(pair.left, pair.right);
    let backward = version::compare(pair.right, pair.left);
    assert_eq!(forward.map(std::cmp::Ordering::reverse), backward);
});
