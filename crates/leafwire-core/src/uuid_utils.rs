//! UUID v7 utilities for time-ordered identifiers.
//!
//! UUIDv7 embeds a Unix timestamp (milliseconds) in the first 48 bits,
//! providing natural time-ordering for primary keys and request IDs.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// IDs generated later are lexicographically greater, so default index
/// order matches creation order.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Check if a UUID is version 7.
pub fn is_v7(uuid: &Uuid) -> bool {
    uuid.get_version_num() == 7
}
