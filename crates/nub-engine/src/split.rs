//! Safe-mode split allocation.
//!
//! A safe-mode order is delivered to several worlds so that no single drop carries the whole amount.
//! The whole-DL part of the total is spread as evenly as possible, with the extra units going to the
//! earliest worlds. The last world absorbs whatever is left (including any fractional part), so the
//! allocations always add back up to the original total.
use thiserror::Error;

pub const MIN_WORLDS: usize = 2;
pub const MAX_WORLDS: usize = 10;
pub const DEFAULT_WORLDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SplitError {
    #[error("World count must be between 2 and 10, got {0}")]
    WorldCount(usize),
    #[error("Cannot split a negative or non-finite total ({0})")]
    InvalidTotal(f64),
}

pub fn check_world_count(worlds: usize) -> Result<(), SplitError> {
    if (MIN_WORLDS..=MAX_WORLDS).contains(&worlds) {
        Ok(())
    } else {
        Err(SplitError::WorldCount(worlds))
    }
}

/// Divide `total` DLs across `worlds` destinations.
pub fn allocate(total: f64, worlds: usize) -> Result<Vec<f64>, SplitError> {
    check_world_count(worlds)?;
    if !total.is_finite() || total < 0.0 {
        return Err(SplitError::InvalidTotal(total));
    }

    let base = (total / worlds as f64).floor();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let extra = (total.floor() as u64 % worlds as u64) as usize;

    let mut splits = Vec::with_capacity(worlds);
    let mut assigned = 0.0;
    for i in 0..worlds - 1 {
        let share = if i < extra { base + 1.0 } else { base };
        assigned += share;
        splits.push(share);
    }
    splits.push(total - assigned);
    Ok(splits)
}
