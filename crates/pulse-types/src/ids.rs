//! Identifier wrappers for reactions and survey sessions.
//!
//! Reaction identifiers are composite strings of the form
//! `glyph;suffix` so every client that receives one can recover the
//! glyph without a lookup. Session tokens are opaque: the client only
//! reads them from the page path and splices them into redirect targets.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Separator between the glyph and the random suffix of an [`EntityId`].
pub const ENTITY_ID_SEPARATOR: char = ';';

/// Identifier of a floating emoji reaction, e.g. `🎉;k3j9x0a1b`.
///
/// Shared verbatim between every connected client: the client that
/// spawns a reaction picks the identifier and broadcasts it, remote
/// clients reuse it so a later pop can address the same entity everywhere.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EntityId(String);

impl EntityId {
    /// Build an identifier from a glyph and a random suffix.
    pub fn new(glyph: &str, suffix: &str) -> Self {
        Self(format!("{glyph}{ENTITY_ID_SEPARATOR}{suffix}"))
    }

    /// The glyph portion (text before the first separator).
    ///
    /// Identifiers without a separator are treated as all glyph.
    pub fn glyph(&self) -> &str {
        self.0
            .split_once(ENTITY_ID_SEPARATOR)
            .map_or(self.0.as_str(), |(glyph, _)| glyph)
    }

    /// The full identifier as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntityId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for EntityId {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

/// Opaque participant session token taken from the page path.
///
/// Never validated client-side; the server decides whether it is good.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SessionToken(String);

impl SessionToken {
    /// Extract the token from the trailing segment of a URL path.
    ///
    /// `/survey/abc123` yields `abc123`; a path ending in `/` yields an
    /// empty token.
    pub fn from_path(path: &str) -> Self {
        let trailing = path.rsplit('/').next().unwrap_or_default();
        Self(trailing.to_owned())
    }

    /// Whether the page path carried no token at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the survey view for this session.
    pub fn survey_path(&self) -> String {
        format!("/survey/{}", self.0)
    }

    /// Path of the completion view for this session.
    pub fn completed_path(&self) -> String {
        format!("/completed/{}", self.0)
    }
}

impl core::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_glyph_is_prefix() {
        let id = EntityId::new("🎉", "abc123xyz");
        assert_eq!(id.as_str(), "🎉;abc123xyz");
        assert_eq!(id.glyph(), "🎉");
    }

    #[test]
    fn entity_id_without_separator_is_all_glyph() {
        let id = EntityId::from("👍");
        assert_eq!(id.glyph(), "👍");
    }

    #[test]
    fn entity_id_serializes_as_bare_string() {
        let id = EntityId::from("🚀;q");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"🚀;q\"");
    }

    #[test]
    fn token_is_trailing_segment() {
        assert_eq!(SessionToken::from_path("/survey/abc123").as_str(), "abc123");
        assert_eq!(SessionToken::from_path("/results/tok").as_str(), "tok");
        assert!(SessionToken::from_path("/survey/").is_empty());
        assert!(SessionToken::from_path("").is_empty());
    }

    #[test]
    fn token_builds_redirect_paths() {
        let token = SessionToken::from_path("/results/xyz");
        assert_eq!(token.survey_path(), "/survey/xyz");
        assert_eq!(token.completed_path(), "/completed/xyz");
    }
}
