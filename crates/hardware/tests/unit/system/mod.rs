/// The four canonical bus scenarios.
pub mod scenarios;

/// Same-tick races and stale request recomputation.
pub mod races;
