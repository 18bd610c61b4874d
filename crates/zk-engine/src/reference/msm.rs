//! # Bucket-Method Multi-Scalar Multiplication
//!
//! Computes `Σ scalars[i] · points[i]` with Pippenger's algorithm. Points are
//! elements of the additive group of the field, so the group operation is
//! field addition and doubling is `p + p`.
//!
//! ## Algorithm
//!
//! 1. Split each 64-bit scalar into `c`-bit windows
//! 2. Per window, drop each point into the bucket of its digit
//! 3. Sum buckets with a running sum: `Σ d · bucket[d]`
//! 4. Combine windows from the top, shifting by `c` doublings each step

use super::field::FieldElement;

/// Window width for `n` terms.
pub fn window_bits(n: usize) -> u32 {
    if n < 32 {
        3
    } else {
        n.ilog2() * 69 / 100 + 2
    }
}

/// Pippenger MSM. `points` and `scalars` must have equal length.
pub fn pippenger(points: &[FieldElement], scalars: &[FieldElement]) -> FieldElement {
    debug_assert_eq!(points.len(), scalars.len());

    let c = window_bits(points.len());
    let windows = u64::BITS.div_ceil(c);
    let mask = (1u64 << c) - 1;
    let mut buckets = vec![FieldElement::ZERO; mask as usize];

    let mut acc = FieldElement::ZERO;
    for w in (0..windows).rev() {
        for _ in 0..c {
            acc = acc + acc;
        }

        buckets.fill(FieldElement::ZERO);
        let shift = w * c;
        for (point, scalar) in points.iter().zip(scalars) {
            let digit = (scalar.value() >> shift) & mask;
            if digit != 0 {
                let bucket = &mut buckets[digit as usize - 1];
                *bucket = *bucket + *point;
            }
        }

        let mut running = FieldElement::ZERO;
        let mut window_sum = FieldElement::ZERO;
        for bucket in buckets.iter().rev() {
            running = running + *bucket;
            window_sum = window_sum + running;
        }
        acc = acc + window_sum;
    }
    acc
}

/// Reference MSM by direct multiplication.
pub fn naive_msm(points: &[FieldElement], scalars: &[FieldElement]) -> FieldElement {
    points.iter().zip(scalars).map(|(p, s)| *p * *s).sum()
}
