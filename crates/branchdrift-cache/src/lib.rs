//! Content-addressed on-disk cache for diff statistics and history series.
//!
//! Keys are SHA-256 digests of the inputs that determine a result
//! ([`key::CacheKey`]). Entries live under `<root>/<2 hex>/<62 hex>.cache` in a
//! versioned, checksummed, type-tagged text format ([`codec`]). A missing or
//! corrupt entry is a miss; entries never expire.

pub mod codec;
pub mod key;
pub mod store;

pub use codec::CacheRecord;
pub use key::CacheKey;
pub use store::DiffCache;
