//! Debug assertion macros for the directory rotor invariants.
//!
//! These are runtime checks for the contracts the preloading protocol
//! maintains. They are only active in debug builds, so there is zero
//! overhead in release builds. The full mirror-walk check lives on
//! `Rotor::check`, which tests call through `Hat::check_invariants`.

/// Assert that a directory occupancy stays within its capacity.
///
/// Holds for all three directories after every operation:
/// `m_len <= m_cap`, `h_len <= 2 * m_cap`, `l_len <= max(1, m_cap / 2)`.
macro_rules! debug_assert_occupancy {
    ($name:literal, $len:expr, $cap:expr) => {
        debug_assert!(
            $len <= $cap,
            "{} directory occupancy {} exceeds capacity {}",
            $name,
            $len,
            $cap
        )
    };
}

/// Assert that the middle-directory capacity is a power of two.
///
/// The capacity skew (`l = m_cap / 2`, `h = 2 * m_cap`) relies on this.
macro_rules! debug_assert_pow2_capacity {
    ($cap:expr) => {
        debug_assert!(
            $cap.is_power_of_two(),
            "middle directory capacity {} is not a power of two",
            $cap
        )
    };
}

/// Assert that a rotation found its target directory fully preloaded.
///
/// Growth rotations require `h_len == m_len == m_cap`; shrink rotations
/// require `l_len == m_cap / 2`. Two preloading steps per block mutation
/// make catch-up copying at rotation time unnecessary - a violation here
/// means the preloading budget was miscounted somewhere.
macro_rules! debug_assert_rotation_ready {
    ($direction:literal, $have:expr, $want:expr) => {
        debug_assert!(
            $have == $want,
            "{} rotation with {} of {} directory entries preloaded",
            $direction,
            $have,
            $want
        )
    };
}

/// Assert that a mirror occupancy never exceeds the mirrored prefix.
///
/// Entries at or beyond `m_len` may be stale (their blocks can be freed
/// and reallocated), so neither `h_len` nor `l_len` may reach past it.
macro_rules! debug_assert_mirror_prefix {
    ($name:literal, $mirror_len:expr, $m_len:expr) => {
        debug_assert!(
            $mirror_len <= $m_len,
            "{} directory mirrors {} entries but only {} are live",
            $name,
            $mirror_len,
            $m_len
        )
    };
}

pub(crate) use debug_assert_mirror_prefix;
pub(crate) use debug_assert_occupancy;
pub(crate) use debug_assert_pow2_capacity;
pub(crate) use debug_assert_rotation_ready;
