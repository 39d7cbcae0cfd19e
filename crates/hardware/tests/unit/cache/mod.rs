/// Line directory lookup, install, eviction and invalidation.
pub mod directory;
