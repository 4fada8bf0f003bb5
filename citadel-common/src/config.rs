//! Environment configuration for the citadel binary.

use crate::{Error, Result};

/// Runtime configuration, sourced entirely from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub database: String,
    /// HTTP listen port.
    pub port: u16,
    /// Whether session cookies carry the `Secure` flag.
    pub https_cookies: bool,
    pub github_client_id: String,
    pub github_client_secret: String,
    pub cookie_hash_key: String,
    pub cookie_block_key: String,
    /// Allowed CORS origin; empty disables the CORS layer.
    pub cors_origin: String,
    /// Where the SSO callback redirects after a successful login.
    pub sso_redirect_url: String,
    /// Enables the `/api/login` dev backdoor.
    pub debug_endpoints: bool,
    /// Anthropic API key; absent means judgement can only auto-approve.
    pub claude_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database: required("DATABASE")?,
            port: parse_or("PORT", 4444)?,
            https_cookies: flag("HTTPS_COOKIES"),
            github_client_id: optional("GITHUB_CLIENT_ID").unwrap_or_default(),
            github_client_secret: optional("GITHUB_CLIENT_SECRET").unwrap_or_default(),
            cookie_hash_key: required("COOKIE_HASH_KEY")?,
            cookie_block_key: required("COOKIE_BLOCK_KEY")?,
            cors_origin: optional("CORS").unwrap_or_default(),
            sso_redirect_url: optional("SSO_REDIRECT_URL").unwrap_or_else(|| "/".to_string()),
            debug_endpoints: flag("DEBUG_ENDPOINTS"),
            claude_api_key: claude_api_key()?,
        })
    }
}

fn required(name: &str) -> Result<String> {
    optional(name).ok_or_else(|| Error::Config(format!("{name} is required")))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn flag(name: &str) -> bool {
    matches!(
        optional(name).as_deref(),
        Some("1") | Some("true") | Some("TRUE")
    )
}

fn parse_or(name: &str, default: u16) -> Result<u16> {
    match optional(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("{name} must be a port number, got {raw:?}"))),
    }
}

/// Resolves the Claude credential: `CLAUDE_API_KEY` wins, otherwise the key
/// is read from the file named by `CLAUDE_API_KEY_FILE`.
fn claude_api_key() -> Result<Option<String>> {
    if let Some(key) = optional("CLAUDE_API_KEY") {
        return Ok(Some(key));
    }
    match optional("CLAUDE_API_KEY_FILE") {
        None => Ok(None),
        Some(path) => {
            let contents = std::fs::read_to_string(&path)
                .map_err(|err| Error::Config(format!("error reading {path}: {err}")))?;
            Ok(Some(contents.trim().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parses_truthy_values() {
        assert!(!flag("CITADEL_TEST_MISSING_FLAG"));
        std::env::set_var("CITADEL_TEST_FLAG", "true");
        assert!(flag("CITADEL_TEST_FLAG"));
        std::env::set_var("CITADEL_TEST_FLAG", "0");
        assert!(!flag("CITADEL_TEST_FLAG"));
        std::env::remove_var("CITADEL_TEST_FLAG");
    }

    #[test]
    fn parse_or_defaults_when_unset() {
        assert_eq!(parse_or("CITADEL_TEST_MISSING_PORT", 4444).unwrap(), 4444);
    }

    #[test]
    fn parse_or_rejects_garbage() {
        std::env::set_var("CITADEL_TEST_BAD_PORT", "not-a-port");
        assert!(parse_or("CITADEL_TEST_BAD_PORT", 4444).is_err());
        std::env::remove_var("CITADEL_TEST_BAD_PORT");
    }
}
