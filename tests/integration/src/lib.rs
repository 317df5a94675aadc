//! No library surface of its own; this crate only hosts `tests/` binaries
//! exercising the published boundary scenarios end to end across crates.
