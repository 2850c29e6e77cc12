use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::time::Instant;

/// Conversational channel a request arrives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Public,
    Private,
    Search,
}

impl Surface {
    /// Search lookups are one-shot and keep no conversation log
    pub fn keeps_history(self) -> bool {
        !matches!(self, Surface::Search)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Surface::Public => "public",
            Surface::Private => "private",
            Surface::Search => "search",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Surface {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Surface::Public),
            "private" => Ok(Surface::Private),
            "search" => Ok(Surface::Search),
            other => Err(format!("unknown surface '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One side of an exchange as stored in a conversation log
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    pub created_at: Instant,
}

impl ConversationTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            created_at: Instant::now(),
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Truncate to at most `max` characters, never splitting a code point
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_parse() {
        assert_eq!("Private".parse::<Surface>().unwrap(), Surface::Private);
        assert!("dm".parse::<Surface>().is_err());
        assert!(!Surface::Search.keeps_history());
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
