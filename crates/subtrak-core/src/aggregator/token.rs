//! OAuth access token cache

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

/// Lifetime assumed when the token response omits `expires_in` (one week)
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 604_799;

/// Tokens are refreshed this long before the server would expire them
pub const EXPIRY_MARGIN_SECS: i64 = 3_600;

/// A bearer token and the instant it stops being used
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached token, if one is held and `now` is before its expiry
    pub fn get(&self, now: DateTime<Utc>) -> Option<&str> {
        match (&self.token, self.expires_at) {
            (Some(token), Some(expires_at)) if now < expires_at => Some(token.as_str()),
            _ => None,
        }
    }

    /// Cache a freshly issued token.
    ///
    /// An `expires_in` that cannot be represented as a date falls back to
    /// the default lifetime.
    pub fn store(&mut self, token: String, expires_in: Option<i64>, now: DateTime<Utc>) {
        let expires_at = expires_in
            .and_then(|secs| expiry(now, secs))
            .or_else(|| {
                if let Some(secs) = expires_in {
                    warn!("Ignoring token expires_in {}; using default lifetime", secs);
                }
                expiry(now, DEFAULT_EXPIRES_IN_SECS)
            });
        self.token = Some(token);
        self.expires_at = expires_at;
    }

    /// Forget the token, forcing the next request to fetch a new one
    pub fn invalidate(&mut self) {
        self.token = None;
        self.expires_at = None;
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

fn expiry(now: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    let lifetime = Duration::try_seconds(expires_in.checked_sub(EXPIRY_MARGIN_SECS)?)?;
    now.checked_add_signed(lifetime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache() {
        assert!(TokenCache::new().get(Utc::now()).is_none());
    }

    #[test]
    fn test_expiry_keeps_an_hour_margin() {
        let now = Utc::now();
        let mut cache = TokenCache::new();
        cache.store("abc".to_string(), Some(7200), now);

        assert_eq!(cache.expires_at(), Some(now + Duration::seconds(3600)));
        assert_eq!(cache.get(now + Duration::seconds(3599)), Some("abc"));
        assert!(cache.get(now + Duration::seconds(3600)).is_none());
    }

    #[test]
    fn test_default_lifetime() {
        let now = Utc::now();
        let mut cache = TokenCache::new();
        cache.store("abc".to_string(), None, now);
        assert_eq!(
            cache.expires_at(),
            Some(now + Duration::seconds(604_799 - 3_600))
        );
    }

    #[test]
    fn test_short_lifetime_is_immediately_stale() {
        let now = Utc::now();
        let mut cache = TokenCache::new();
        cache.store("abc".to_string(), Some(60), now);
        assert!(cache.get(now).is_none());
    }

    #[test]
    fn test_invalidate() {
        let now = Utc::now();
        let mut cache = TokenCache::new();
        cache.store("abc".to_string(), None, now);
        cache.invalidate();
        assert!(cache.get(now).is_none());
    }

    #[test]
    fn test_out_of_range_lifetime_uses_default() {
        let now = Utc::now();
        let default_expiry = Some(now + Duration::seconds(604_799 - 3_600));

        let mut cache = TokenCache::new();
        cache.store("abc".to_string(), Some(i64::MAX), now);
        assert_eq!(cache.expires_at(), default_expiry);
        assert_eq!(cache.get(now), Some("abc"));

        cache.store("def".to_string(), Some(i64::MIN), now);
        assert_eq!(cache.expires_at(), default_expiry);
    }
}
