//! Adapters for the storage, lease and membership ports, plus the
//! fixture-driven demo provider.

pub mod fixture;
pub mod memory;
