//! Lock denomination converter: 100 World Locks make a Diamond Lock, 100 DLs make a Blue Gem Lock.
use nub_types::api::LockConversion;

use crate::rates::parse_amount;

pub const WL_PER_DL: f64 = 100.0;
pub const WL_PER_BGL: f64 = 10_000.0;

pub fn convert_world_locks(raw: &str) -> LockConversion {
    let world_locks = parse_amount(raw).max(0.0);
    LockConversion {
        world_locks,
        diamond_locks: world_locks / WL_PER_DL,
        blue_gem_locks: world_locks / WL_PER_BGL,
    }
}
