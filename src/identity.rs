//! Per-iteration identities.
//!
//! Emails and provider ids combine the virtual-user index with a random
//! suffix drawn once per iteration, so two iterations never share an
//! identity even when they run on the same VU.

use std::fmt;

pub const PROVIDER: &str = "google";
pub const EMAIL_DOMAIN: &str = "test.com";

const SUFFIX_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    A,
    B,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::A => write!(f, "A"),
            Label::B => write!(f, "B"),
        }
    }
}

/// A bearer credential, stored without the `Bearer ` prefix.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

// Tokens end up in logs via Debug on the state; keep them out.
impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BearerToken(<{} chars>)", self.0.chars().count())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub label: Label,
    pub email: String,
    pub provider_id: String,
    /// Assigned by the user service once creation succeeds.
    pub user_id: Option<String>,
    pub token: Option<BearerToken>,
}

impl Identity {
    pub fn generate(label: Label, vu: usize, suffix: &str) -> Self {
        Self {
            label,
            email: format!("user{}_{}_{}@{}", label, vu, suffix, EMAIL_DOMAIN),
            provider_id: format!("{}{}_{}_{}", PROVIDER, label, vu, suffix),
            user_id: None,
            token: None,
        }
    }
}

/// Fresh random suffix for one iteration.
pub fn iteration_suffix() -> String {
    let mut suffix = uuid::Uuid::new_v4().simple().to_string();
    suffix.truncate(SUFFIX_LEN);
    suffix
}
