//! Client-side entity identifier minting

use uuid::Uuid;

/// Mint a new entity id: a v4 UUID as 32 lowercase hex characters
///
/// The API expects ids without hyphen separators, so the simple format is
/// used instead of the canonical hyphenated one.
pub fn generate_entity_id() -> String {
    Uuid::new_v4().simple().to_string()
}
