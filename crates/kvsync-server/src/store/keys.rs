//! Fast store key layout.

/// Key builder for consistent key generation.
pub struct KeyBuilder {
    parts: Vec<String>,
}

impl KeyBuilder {
    /// Create a new key builder with the given prefix.
    pub fn new(prefix: &str) -> Self {
        Self {
            parts: vec![prefix.to_string()],
        }
    }

    /// Add a part to the key.
    pub fn add(mut self, part: impl ToString) -> Self {
        self.parts.push(part.to_string());
        self
    }

    /// Build the final key by joining parts with colons.
    pub fn build(self) -> String {
        self.parts.join(":")
    }
}

/// Sorted set holding accumulated scores.
pub const LEADERBOARD: &str = "score_board";

/// Global page-view counter.
pub const VISITS: &str = "visit";

/// Hash field caching a user's most recently liked tag.
pub const LIKED_TAG_FIELD: &str = "liked_tag";

/// Hash field caching a user's name.
pub const NAME_FIELD: &str = "name";

/// Cached user hash.
pub fn user(id: &str) -> String {
    KeyBuilder::new("user").add(id).build()
}

/// Per-user optimistic counter.
pub fn score(id: &str) -> String {
    KeyBuilder::new("score").add(id).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_builder() {
        let key = KeyBuilder::new("user").add("42").add("tags").build();
        assert_eq!(key, "user:42:tags");
    }

    #[test]
    fn test_predefined_keys() {
        assert_eq!(user("alice"), "user:alice");
        assert_eq!(score("alice"), "score:alice");
        assert_eq!(LEADERBOARD, "score_board");
    }
}
