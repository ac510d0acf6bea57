/// Derive a well-mixed seed for unit `counter` of a run seeded with `seed`.
///
/// Each training sample gets its own generator seeded from this value, so
/// results do not depend on how units are scheduled across threads.
/// Uses the SplitMix64 finaliser.
pub fn counter_rng_seed(seed: u64, counter: u64) -> u64 {
    let mut z = seed
        .wrapping_add(counter.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
