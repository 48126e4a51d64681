//! Memoization Module
//!
//! Explicit call memoization: a call is identified by a fingerprint of
//! its receiver identity, operation name and arguments, and its result is
//! kept in a refreshing cache with the computation bound as refresher.

mod fingerprint;
mod memoizer;

pub use fingerprint::{identity_of, Fingerprint};
pub use memoizer::Memoizer;
