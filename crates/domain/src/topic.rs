//! Part name ⇄ topic mapping.
//!
//! One topic per part: `{prefix}/{name}`. No wildcards, no hierarchy.

use crate::error::ValidationError;

/// Deterministic, bidirectional mapping between part names and topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMapper {
    prefix: String,
}

impl Default for TopicMapper {
    fn default() -> Self {
        Self {
            prefix: "topic".to_string(),
        }
    }
}

impl TopicMapper {
    /// Create a mapper with the given prefix. Trailing slashes are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyTopicPrefix`] for an empty prefix and
    /// [`ValidationError::InvalidTopicPrefix`] for one holding wildcards,
    /// whitespace or empty levels.
    pub fn new(prefix: impl Into<String>) -> Result<Self, ValidationError> {
        let prefix = prefix.into().trim_end_matches('/').to_string();
        if prefix.is_empty() {
            return Err(ValidationError::EmptyTopicPrefix);
        }
        let valid_level = |level: &str| {
            !level.is_empty()
                && !level
                    .chars()
                    .any(|c| c.is_whitespace() || matches!(c, '+' | '#'))
        };
        if !prefix.split('/').all(valid_level) {
            return Err(ValidationError::InvalidTopicPrefix);
        }
        Ok(Self { prefix })
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn topic_for(&self, name: &str) -> String {
        format!("{}/{name}", self.prefix)
    }

    /// The part name addressed by `topic`, if it follows the convention.
    #[must_use]
    pub fn part_for<'a>(&self, topic: &'a str) -> Option<&'a str> {
        topic
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix('/')
            .filter(|name| !name.is_empty() && !name.contains('/'))
    }
}
