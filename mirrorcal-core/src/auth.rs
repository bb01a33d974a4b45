//! The credential-supplier seam.
//!
//! The engine never manages token acquisition or refresh; it only asks for a
//! currently-valid token per calendar. A missing or revoked credential
//! surfaces as `Unauthorized` and aborts that calendar's pass without
//! touching the others.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

use crate::error::{MirrorError, MirrorResult, ProviderErrorKind};
use crate::event::CalendarId;

/// A bearer token for one calendar account. Debug output is redacted so a
/// token can never leak through logs.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        AccessToken(secret.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(***)")
    }
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn get_valid_token(&self, calendar_id: &CalendarId) -> MirrorResult<AccessToken>;
}

/// Token source over a fixed map, for configurations where an external
/// refresher keeps the configured tokens fresh.
#[derive(Default)]
pub struct StaticTokenSource {
    tokens: HashMap<CalendarId, String>,
}

impl StaticTokenSource {
    pub fn new(tokens: HashMap<CalendarId, String>) -> Self {
        StaticTokenSource { tokens }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn get_valid_token(&self, calendar_id: &CalendarId) -> MirrorResult<AccessToken> {
        self.tokens
            .get(calendar_id)
            .map(|t| AccessToken::new(t.clone()))
            .ok_or_else(|| {
                MirrorError::provider(
                    ProviderErrorKind::Unauthorized,
                    format!("No credential configured for calendar '{}'", calendar_id),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source_lookup() {
        let source = StaticTokenSource::new(
            [(CalendarId::from("work"), "tok-1".to_string())].into(),
        );

        let token = source
            .get_valid_token(&CalendarId::from("work"))
            .await
            .unwrap();
        assert_eq!(token.secret(), "tok-1");

        let missing = source.get_valid_token(&CalendarId::from("other")).await;
        assert!(missing.unwrap_err().is_unauthorized());
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AccessToken::new("super-secret");
        assert!(!format!("{:?}", token).contains("super-secret"));
    }
}
