//! Explicit cross-account call context
//!
//! The recovery service performs operations against a target account using a
//! caller-supplied capability. The capability is an explicit parameter on
//! every client call, never ambient process credentials, so the trust
//! boundary is visible and testable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque credential/role-resolution handle for one back-end account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityToken(String);

impl CapabilityToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

// Keep the token out of logs and debug output.
impl fmt::Debug for CapabilityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityToken(****)")
    }
}

/// Target account, region, and capability for one recovery-API call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountContext {
    pub account_id: String,
    pub region: String,
    pub capability: CapabilityToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_token_is_masked_in_debug() {
        let token = CapabilityToken::new("arn:role/secret");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("secret"));
        assert_eq!(token.expose(), "arn:role/secret");
    }
}
