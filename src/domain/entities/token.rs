//! Invite tokens and their deep links

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::fmt;
use std::str::FromStr;

/// Length of a generated token
pub const TOKEN_LEN: usize = 8;

/// Callback data prefix for the spin button
pub const SPIN_PREFIX: &str = "spin:";

/// Characters Telegram accepts in a `start` deep-link payload
static PAYLOAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid payload regex")
});

/// Lifecycle of an invite token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// Issued, not yet spun
    Active,
    /// A spin is in progress
    Pending,
    /// Spun; cannot be used again
    Used,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Active => "active",
            TokenStatus::Pending => "pending",
            TokenStatus::Used => "used",
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TokenStatus::Active),
            "pending" => Ok(TokenStatus::Pending),
            "used" => Ok(TokenStatus::Used),
            other => Err(other.to_string()),
        }
    }
}

/// New random token: the first 8 hex digits of a v4 UUID
pub fn generate_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..TOKEN_LEN].to_string()
}

/// `https://t.me/<bot>?start=<token>`
pub fn deep_link(bot_username: &str, token: &str) -> String {
    format!("https://t.me/{}?start={}", bot_username, token)
}

/// Whether a `/start` payload could be a token at all
pub fn is_valid_payload(payload: &str) -> bool {
    PAYLOAD_RE.is_match(payload)
}

/// Callback data for the spin button of `token`
pub fn spin_callback(token: &str) -> String {
    format!("{}{}", SPIN_PREFIX, token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(is_valid_payload(&token));
    }

    #[test]
    fn test_deep_link() {
        assert_eq!(deep_link("prize_bot", "ab12cd34"), "https://t.me/prize_bot?start=ab12cd34");
    }

    #[test]
    fn test_payload_validation() {
        assert!(is_valid_payload("ab12cd34"));
        assert!(is_valid_payload("a-b_c"));
        assert!(!is_valid_payload(""));
        assert!(!is_valid_payload("ab cd"));
        assert!(!is_valid_payload("'; DROP TABLE tokens; --"));
        assert!(!is_valid_payload(&"a".repeat(65)));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [TokenStatus::Active, TokenStatus::Pending, TokenStatus::Used] {
            assert_eq!(status.as_str().parse::<TokenStatus>(), Ok(status));
        }
        assert!("expired".parse::<TokenStatus>().is_err());
    }
}
