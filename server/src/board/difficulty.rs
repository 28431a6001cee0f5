//! Occupancy-driven admission difficulty.
//!
//! The factor grows with the fourth power of occupancy, so it stays near zero
//! for most of the board's life and climbs steeply close to `MAX_BOARDS`.

use crate::board::key::BoardKey;
use crate::board::MAX_BOARDS;

const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

/// Global difficulty factor for the given board count, `(count / MAX_BOARDS)^4`.
pub fn current_factor(board_count: usize) -> f64 {
    (board_count as f64 / MAX_BOARDS as f64).powi(4)
}

/// Whether the board is too full to accept any write.
pub fn board_is_full(board_count: usize) -> bool {
    current_factor(board_count) >= 1.0
}

/// Whether the key's leading 64 bits fall under the current ceiling.
///
/// The ceiling is `u64::MAX * (1 - factor)`, so fewer keys qualify as the
/// board fills. This is a property of the target key, not of the document.
pub fn key_under_threshold(key: &BoardKey, board_count: usize) -> bool {
    let mut leading = [0u8; 8];
    leading.copy_from_slice(&key.as_bytes()[..8]);
    let value = u64::from_be_bytes(leading);

    let keep = 1.0 - current_factor(board_count);
    if keep <= 0.0 {
        return false;
    }
    // Compare in 64.64 fixed point; `u64::MAX as f64` would round up to 2^64.
    let keep_fixed = (keep * TWO_POW_64) as u128;
    (u128::from(value) << 64) < u128::from(u64::MAX) * keep_fixed
}
