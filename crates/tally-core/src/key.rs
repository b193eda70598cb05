//! Team keys and issue keys.
//!
//! An issue key is `{team key}-{number}`. The number comes from the team's
//! sequence counter and never changes; the prefix follows the team's current
//! key and is rewritten in place when the team is re-keyed.

use serde::{Serialize, Serializer};
use std::{fmt, str::FromStr};

/// Separator between the team prefix and the sequence number.
pub const SEPARATOR: char = '-';

/// Longest accepted team key.
pub const MAX_TEAM_KEY_LEN: usize = 10;

/// Default team key for workspace names that contain no ASCII letter.
pub const FALLBACK_TEAM_KEY: &str = "TEAM";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("team key must not be empty")]
    EmptyTeamKey,

    #[error("team key '{0}' is longer than {MAX_TEAM_KEY_LEN} characters")]
    TeamKeyTooLong(String),

    #[error("team key '{0}' must start with a letter and contain only letters and digits")]
    InvalidTeamKey(String),

    #[error("issue key '{0}' must look like TEAM-123")]
    InvalidIssueKey(String),

    #[error("workspace slug '{0}' must be lowercase letters, digits, and '-'")]
    InvalidSlug(String),
}

/// Validate a workspace slug: non-empty, lowercase ASCII letters, digits and
/// `-`, not starting or ending with `-`.
///
/// # Errors
///
/// Returns [`KeyError::InvalidSlug`] if the slug breaks any of those rules.
pub fn validate_slug(slug: &str) -> Result<&str, KeyError> {
    let valid = !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if valid {
        Ok(slug)
    } else {
        Err(KeyError::InvalidSlug(slug.to_string()))
    }
}

/// A validated, uppercase team key such as `ENG`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TeamKey(String);

impl TeamKey {
    /// Validate and normalise a team key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if the key is empty, too long, does not start with
    /// a letter, or contains anything but ASCII letters and digits.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(KeyError::EmptyTeamKey);
        }
        if trimmed.chars().count() > MAX_TEAM_KEY_LEN {
            return Err(KeyError::TeamKeyTooLong(trimmed.to_string()));
        }

        let starts_with_letter = trimmed.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
        if !starts_with_letter || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(KeyError::InvalidTeamKey(trimmed.to_string()));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Derive a default team key from a workspace display name: up to three
    /// alphanumerics starting at the first ASCII letter, uppercased. Names
    /// with no letter at all get [`FALLBACK_TEAM_KEY`].
    #[must_use]
    pub fn derive_from_name(name: &str) -> Self {
        let candidate: String = name
            .chars()
            .skip_while(|c| !c.is_ascii_alphabetic())
            .filter(char::is_ascii_alphanumeric)
            .take(3)
            .collect();
        Self::parse(&candidate).unwrap_or_else(|_| Self(FALLBACK_TEAM_KEY.to_string()))
    }

    /// Borrow the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the issue key for `number` under this team key.
    #[must_use]
    pub fn issue_key(&self, number: u64) -> String {
        format!("{}{SEPARATOR}{number}", self.0)
    }
}

impl fmt::Display for TeamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TeamKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TeamKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// A parsed issue key, e.g. `ENG-42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueKey {
    pub team: TeamKey,
    pub number: u64,
}

impl IssueKey {
    /// Parse user input such as `eng-42` into a normalised key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidIssueKey`] if there is no separator, the
    /// number is not a positive integer, or the prefix is not a valid team
    /// key.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let trimmed = raw.trim();
        let invalid = || KeyError::InvalidIssueKey(trimmed.to_string());

        let (prefix, number) = trimmed.split_once(SEPARATOR).ok_or_else(invalid)?;
        let team = TeamKey::parse(prefix).map_err(|_| invalid())?;
        let number: u64 = number.parse().map_err(|_| invalid())?;
        if number == 0 {
            return Err(invalid());
        }

        Ok(Self { team, number })
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.team, self.number)
    }
}

impl FromStr for IssueKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Replace everything before the first separator of `key` with `prefix`.
///
/// Returns `None` when `key` has no separator. Applying the same prefix twice
/// yields the same key.
#[must_use]
pub fn rewrite_prefix(key: &str, prefix: &TeamKey) -> Option<String> {
    let at = key.find(SEPARATOR)?;
    Some(format!("{}{}", prefix.as_str(), &key[at..]))
}
