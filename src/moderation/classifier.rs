use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Keywords used when none are configured.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "spam",
    "恶意",
    "虚假",
    "suspicious",
    "Star",
    "star",
    "异常增长",
];

/// Ordered keyword list. Earlier keywords win when several match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct KeywordSet {
    keywords: Vec<Keyword>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Keyword {
    configured: String,
    lowered: String,
}

impl KeywordSet {
    /// Builds the set, dropping exact duplicates. An empty keyword would
    /// match every issue and is rejected.
    pub fn new<I, S>(keywords: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set: Vec<Keyword> = Vec::new();
        for keyword in keywords {
            let keyword = keyword.as_ref().trim();
            if keyword.is_empty() {
                return Err(Error::Config("keywords must not be empty".to_string()));
            }
            if set.iter().any(|k| k.configured == keyword) {
                continue;
            }
            set.push(Keyword {
                configured: keyword.to_string(),
                lowered: keyword.to_lowercase(),
            });
        }
        Ok(Self { keywords: set })
    }

    /// Parses a comma separated list such as `spam,scam`.
    pub fn parse_list(list: &str) -> Result<Self> {
        Self::new(list.split(','))
    }

    pub fn defaults() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().copied())
            .unwrap_or_else(|_| Self { keywords: Vec::new() })
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|k| k.configured.as_str())
    }
}

impl TryFrom<Vec<String>> for KeywordSet {
    type Error = Error;

    fn try_from(value: Vec<String>) -> Result<Self> {
        Self::new(value)
    }
}

impl From<KeywordSet> for Vec<String> {
    fn from(set: KeywordSet) -> Self {
        set.keywords.into_iter().map(|k| k.configured).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    matched: Option<String>,
}

impl Classification {
    pub fn is_suspicious(&self) -> bool {
        self.matched.is_some()
    }

    /// The first keyword, in set order, found in the title or body.
    pub fn matched_keyword(&self) -> Option<&str> {
        self.matched.as_deref()
    }
}

/// Case-insensitive substring match of every keyword against the title and
/// the body. A missing body counts as empty.
pub fn classify(title: &str, body: Option<&str>, keywords: &KeywordSet) -> Classification {
    let title = title.to_lowercase();
    let body = body.unwrap_or_default().to_lowercase();

    let matched = keywords
        .keywords
        .iter()
        .find(|k| title.contains(&k.lowered) || body.contains(&k.lowered))
        .map(|k| k.configured.clone());

    Classification { matched }
}
