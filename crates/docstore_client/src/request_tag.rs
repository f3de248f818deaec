//! Request tags correlate every RPC of one logical transaction.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;
use std::sync::Arc;

const TAG_LEN: usize = 20;

/// Correlation id shared by all RPCs of a logical transaction, across retries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestTag(Arc<str>);

impl RequestTag {
    /// Generates a fresh random tag.
    pub fn generate() -> Self {
        let tag: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TAG_LEN)
            .map(char::from)
            .collect();
        Self(tag.into())
    }

    /// Returns the tag text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestTag {
    fn from(tag: &str) -> Self {
        Self(tag.into())
    }
}
