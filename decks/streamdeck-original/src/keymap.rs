//! Logical <-> physical key addressing.
//!
//! Callers count keys row-major, left to right. The firmware counts each row
//! right to left, so the mapping mirrors the column and is its own inverse.

use deck_core::{DeckError, Result};

use crate::consts::{NUM_BUTTON_COLUMNS, NUM_KEYS};

/// Convert a logical key index into the index the firmware expects
pub const fn to_physical(key: usize) -> usize {
    let column = key % NUM_BUTTON_COLUMNS;
    key - column + (NUM_BUTTON_COLUMNS - 1 - column)
}

/// Convert a firmware key index back into a logical index
pub const fn to_logical(physical: usize) -> usize {
    to_physical(physical)
}

/// Check a logical key index and return its physical counterpart
pub fn validate_key(key: usize) -> Result<usize> {
    if key >= NUM_KEYS {
        return Err(DeckError::InvalidArgument(format!(
            "key index must be between 0 and {}, got {key}",
            NUM_KEYS - 1
        )));
    }
    Ok(to_physical(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrors_each_row() {
        assert_eq!(to_physical(0), 4);
        assert_eq!(to_physical(4), 0);
        assert_eq!(to_physical(5), 9);
        assert_eq!(to_physical(9), 5);
        assert_eq!(to_physical(14), 10);
        assert_eq!(to_physical(7), 7);
    }

    #[test]
    fn matches_formula_and_round_trips() {
        for i in 0..NUM_KEYS {
            assert_eq!(to_physical(i), i - (i % 5) + (4 - (i % 5)));
            assert_eq!(to_logical(to_physical(i)), i);
        }
    }

    #[test]
    fn rejects_out_of_range() {
        assert_eq!(validate_key(0).unwrap(), 4);
        assert!(matches!(validate_key(15), Err(DeckError::InvalidArgument(_))));
        assert!(matches!(validate_key(usize::MAX), Err(DeckError::InvalidArgument(_))));
    }
}
