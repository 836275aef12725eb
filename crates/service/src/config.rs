//! Service configuration loaded from environment variables.

use chrono::{Duration, Utc};
use common::Email;

const DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES: i64 = 60 * 24 * 8;
const DEFAULT_EMAIL_RESET_TOKEN_EXPIRE_HOURS: i64 = 48;

/// Returns the lifetime for a positive `value`, if tokens issued now with it
/// would expire at a representable instant.
fn token_lifetime(value: i64, to_duration: fn(i64) -> Option<Duration>) -> Option<Duration> {
    if value <= 0 {
        return None;
    }
    let lifetime = to_duration(value)?;
    Utc::now().checked_add_signed(lifetime).map(|_| lifetime)
}

/// Service settings with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: Postgres connection string (default: unset, in-memory store)
/// - `ACCESS_TOKEN_EXPIRE_MINUTES`: access token lifetime (default: 8 days)
/// - `EMAIL_RESET_TOKEN_EXPIRE_HOURS`: password reset token lifetime (default: `48`)
/// - `SMTP_HOST`: outgoing mail server (default: unset)
/// - `EMAILS_FROM_EMAIL`: sender address (default: unset)
/// - `EMAILS_FROM_NAME`: sender display name (default: `PROJECT_NAME`)
/// - `PROJECT_NAME`: used in email subjects (default: `"hbit"`)
/// - `FRONTEND_HOST`: base URL for links in emails (default: `"http://localhost:5173"`)
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub access_token_expire_minutes: i64,
    pub email_reset_token_expire_hours: i64,
    pub smtp_host: Option<String>,
    pub emails_from_email: Option<Email>,
    pub emails_from_name: String,
    pub project_name: String,
    pub frontend_host: String,
}

impl Settings {
    /// Loads settings from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Loads settings through `lookup`, falling back to defaults.
    ///
    /// Values that fail to parse are treated as unset, and so are token
    /// lifetimes that are not positive or too large to represent.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let project_name = lookup("PROJECT_NAME").unwrap_or(defaults.project_name);

        Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            access_token_expire_minutes: lookup("ACCESS_TOKEN_EXPIRE_MINUTES")
                .and_then(|v| v.parse().ok())
                .filter(|&minutes| token_lifetime(minutes, Duration::try_minutes).is_some())
                .unwrap_or(defaults.access_token_expire_minutes),
            email_reset_token_expire_hours: lookup("EMAIL_RESET_TOKEN_EXPIRE_HOURS")
                .and_then(|v| v.parse().ok())
                .filter(|&hours| token_lifetime(hours, Duration::try_hours).is_some())
                .unwrap_or(defaults.email_reset_token_expire_hours),
            smtp_host: lookup("SMTP_HOST").filter(|host| !host.is_empty()),
            emails_from_email: lookup("EMAILS_FROM_EMAIL").and_then(|v| Email::parse(v).ok()),
            emails_from_name: lookup("EMAILS_FROM_NAME").unwrap_or_else(|| project_name.clone()),
            project_name,
            frontend_host: lookup("FRONTEND_HOST").unwrap_or(defaults.frontend_host),
        }
    }

    /// Lifetime of access tokens, falling back to the default when
    /// `access_token_expire_minutes` is out of range.
    pub fn access_token_lifetime(&self) -> Duration {
        token_lifetime(self.access_token_expire_minutes, Duration::try_minutes)
            .unwrap_or(Duration::minutes(DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES))
    }

    /// Lifetime of password reset tokens, falling back to the default when
    /// `email_reset_token_expire_hours` is out of range.
    pub fn reset_token_lifetime(&self) -> Duration {
        token_lifetime(self.email_reset_token_expire_hours, Duration::try_hours)
            .unwrap_or(Duration::hours(DEFAULT_EMAIL_RESET_TOKEN_EXPIRE_HOURS))
    }

    /// Returns whether outgoing emails are configured.
    pub fn emails_enabled(&self) -> bool {
        self.smtp_host.is_some() && self.emails_from_email.is_some()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            access_token_expire_minutes: DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES,
            email_reset_token_expire_hours: DEFAULT_EMAIL_RESET_TOKEN_EXPIRE_HOURS,
            smtp_host: None,
            emails_from_email: None,
            emails_from_name: "hbit".to_string(),
            project_name: "hbit".to_string(),
            frontend_host: "http://localhost:5173".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings_from(vars: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.database_url, None);
        assert_eq!(settings.access_token_expire_minutes, 11520);
        assert_eq!(settings.email_reset_token_expire_hours, 48);
        assert!(!settings.emails_enabled());
    }

    #[test]
    fn test_empty_environment_matches_defaults() {
        let settings = settings_from(&[]);
        assert_eq!(settings.project_name, "hbit");
        assert_eq!(settings.emails_from_name, "hbit");
        assert_eq!(settings.access_token_expire_minutes, 11520);
    }

    #[test]
    fn test_values_are_read() {
        let settings = settings_from(&[
            ("DATABASE_URL", "postgres://localhost/hbit"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "30"),
            ("SMTP_HOST", "smtp.example.com"),
            ("EMAILS_FROM_EMAIL", "Info@Example.com"),
            ("PROJECT_NAME", "hbit-test"),
        ]);

        assert_eq!(
            settings.database_url.as_deref(),
            Some("postgres://localhost/hbit")
        );
        assert_eq!(settings.access_token_expire_minutes, 30);
        assert_eq!(settings.emails_from_name, "hbit-test");
        assert_eq!(
            settings.emails_from_email.as_ref().map(Email::as_str),
            Some("info@example.com")
        );
        assert!(settings.emails_enabled());
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let settings = settings_from(&[
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "soon"),
            ("EMAILS_FROM_EMAIL", "not-an-email"),
            ("DATABASE_URL", ""),
        ]);

        assert_eq!(settings.access_token_expire_minutes, 11520);
        assert_eq!(settings.emails_from_email, None);
        assert_eq!(settings.database_url, None);
    }

    #[test]
    fn test_non_positive_lifetimes_fall_back() {
        let settings = settings_from(&[
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "0"),
            ("EMAIL_RESET_TOKEN_EXPIRE_HOURS", "-5"),
        ]);

        assert_eq!(settings.access_token_expire_minutes, 11520);
        assert_eq!(settings.email_reset_token_expire_hours, 48);
    }

    #[test]
    fn test_unrepresentable_lifetimes_fall_back() {
        let settings = settings_from(&[
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "1000000000000"),
            ("EMAIL_RESET_TOKEN_EXPIRE_HOURS", "9223372036854775807"),
        ]);

        assert_eq!(settings.access_token_expire_minutes, 11520);
        assert_eq!(settings.email_reset_token_expire_hours, 48);
    }

    #[test]
    fn test_lifetimes_set_directly_are_clamped_to_defaults() {
        let settings = Settings {
            access_token_expire_minutes: i64::MAX,
            email_reset_token_expire_hours: -1,
            ..Settings::default()
        };

        assert_eq!(settings.access_token_lifetime(), Duration::minutes(11520));
        assert_eq!(settings.reset_token_lifetime(), Duration::hours(48));
        assert_eq!(
            Settings::default().access_token_lifetime(),
            Duration::minutes(11520)
        );
    }
}
