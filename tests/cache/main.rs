//! Cache Integration Tests
//!
//! Whole-system properties of the normalized cache, exercised through the
//! `graphcache` facade.

#[path = "../common/mod.rs"]
mod common;

mod concurrency;
mod invalidation;
mod keys;
mod round_trip;
