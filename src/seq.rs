//! Sequence-number arithmetic.
//!
//! Sequence numbers are `u32` and wrap around.  Two numbers are compared by
//! the signed distance between them: `a` precedes `b` when
//! `b - a (mod 2^32)` lies in `(0, 2^31)`.  The comparison is meaningful as
//! long as the two values are less than `u32::MAX / 2` apart, which always
//! holds for a window bounded by a `u16` advertisement.

use rand::Rng;

/// `a < b` in wrap-around space.
#[inline]
pub fn seq_lt(a: u32, b: u32) -> bool {
    a != b && b.wrapping_sub(a) <= u32::MAX / 2
}

/// `a <= b` in wrap-around space.
#[inline]
pub fn seq_le(a: u32, b: u32) -> bool {
    b.wrapping_sub(a) <= u32::MAX / 2
}

/// `a > b` in wrap-around space.
#[inline]
pub fn seq_gt(a: u32, b: u32) -> bool {
    seq_lt(b, a)
}

/// Pick a random initial sequence number.
pub fn initial_sequence_number() -> u32 {
    rand::rng().random()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ordering() {
        assert!(seq_lt(10, 20));
        assert!(!seq_lt(20, 10));
        assert!(!seq_lt(5, 5));
        assert!(seq_le(5, 5));
        assert!(seq_gt(20, 10));
    }

    #[test]
    fn ordering_across_wrap() {
        let near_max = u32::MAX - 3;
        assert!(seq_lt(near_max, 2));
        assert!(seq_gt(2, near_max));
        assert!(seq_le(near_max, near_max.wrapping_add(10)));
    }

    #[test]
    fn half_space_boundary() {
        assert!(seq_lt(0, u32::MAX / 2));
        assert!(!seq_lt(0, u32::MAX / 2 + 1));
    }
}
