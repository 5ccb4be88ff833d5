//! Codec for the heterogeneous `likes` field carried by posts and comments.
//!
//! The platform returns the field as a list mixing bare identifier strings
//! and expanded user objects. Decoding normalizes to a deduplicated, ordered
//! list of user identifiers; the write path always sends the plain list, so
//! the stored representation self-heals on every write.

use std::collections::HashSet;

use crate::models::User;
use crate::relation::RelationRef;

/// Ordered list of unique user identifiers in a `likes` field.
pub fn decode(likes: &[RelationRef<User>]) -> Vec<String> {
    let mut seen = HashSet::new();
    likes
        .iter()
        .filter_map(|r| r.id())
        .filter(|id| seen.insert(id.to_string()))
        .map(str::to_owned)
        .collect()
}

/// Toggle membership: removes every occurrence of `user_id` when present,
/// appends it once at the end otherwise.
pub fn toggle(current: &[String], user_id: &str) -> Vec<String> {
    if current.iter().any(|id| id == user_id) {
        current.iter().filter(|id| *id != user_id).cloned().collect()
    } else {
        let mut next = current.to_vec();
        next.push(user_id.to_owned());
        next
    }
}

pub fn count(likes: &[RelationRef<User>]) -> usize {
    decode(likes).len()
}

pub fn is_liked_by(likes: &[RelationRef<User>], user_id: &str) -> bool {
    decode(likes).iter().any(|id| id == user_id)
}
