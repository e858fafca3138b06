//! Rate limiting and abuse detection for questdeck
//!
//! A per-identifier sliding-interval request counter with escalating
//! temporary blocking, a heuristic suspicious-activity detector, and a
//! shared periodic cleanup sweep. Denials here are policy decisions, not
//! errors: they carry a violation record and a retry-after hint instead of
//! entering the error taxonomy.

pub mod guard;
pub mod types;

pub use guard::AbuseGuard;
pub use types::{BlockEntry, BlockInfo, Decision, GuardConfig, RateRecord, SuspicionRecord};
