//! Mapper pipeline integration tests
//!
//! End to end runs of write / validate / save / apply against
//! `MemoryStore`, through the standard `model` context.

#[path = "../common/mod.rs"]
mod common;

mod extensions;
mod foreign_keys;
mod ordering;
mod registration;
mod rollback;
