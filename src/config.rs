//! Configuration for the VoxPromo service

use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};
use voxpromo_auth::{EXPIRY_SWEEP_INTERVAL, MAX_FREE_CREATIONS, PREMIUM_DURATION_DAYS};
use voxpromo_generation::GEMINI_API_URL;
use voxpromo_payments::{CHECKOUT_TIMEOUT, MAX_POLLS, MERCADO_PAGO_API_URL, POLL_INTERVAL};

/// Tunable limits and timings
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Free creations before premium is required
    pub max_free_creations: u32,

    /// Days of premium bought by one payment
    pub premium_duration_days: i64,

    /// Delay between payment status polls
    pub poll_interval: Duration,

    /// Status polls before a payment is reported as pending
    pub max_polls: u32,

    /// Bound on checkout creation
    pub checkout_timeout: Duration,

    /// Period of the premium expiry sweep
    pub expiry_sweep_interval: Duration,

    /// Timeout applied to every outbound HTTP request
    pub request_timeout: Option<Duration>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            max_free_creations: MAX_FREE_CREATIONS,
            premium_duration_days: PREMIUM_DURATION_DAYS,
            poll_interval: POLL_INTERVAL,
            max_polls: MAX_POLLS,
            checkout_timeout: CHECKOUT_TIMEOUT,
            expiry_sweep_interval: EXPIRY_SWEEP_INTERVAL,
            request_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl AppOptions {
    pub fn with_max_free_creations(mut self, value: u32) -> Self {
        self.max_free_creations = value;
        self
    }

    pub fn with_premium_duration_days(mut self, value: i64) -> Self {
        self.premium_duration_days = value;
        self
    }

    pub fn with_poll_interval(mut self, value: Duration) -> Self {
        self.poll_interval = value;
        self
    }

    pub fn with_max_polls(mut self, value: u32) -> Self {
        self.max_polls = value;
        self
    }

    pub fn with_checkout_timeout(mut self, value: Duration) -> Self {
        self.checkout_timeout = value;
        self
    }

    pub fn with_expiry_sweep_interval(mut self, value: Duration) -> Self {
        self.expiry_sweep_interval = value;
        self
    }

    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }
}

/// Credentials of the administrator seeded at startup
#[derive(Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to wire up a [`VoxPromo`](crate::VoxPromo) instance.
///
/// Provider secrets live here and never leave the process.
#[derive(Clone)]
pub struct AppConfig {
    /// Public URL of the site; payment back URLs are derived from it
    pub site_url: Url,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub mercado_pago_access_token: String,
    pub mercado_pago_base_url: String,
    /// Secret signing session tokens
    pub session_secret: String,
    /// File holding the session token; in-memory when absent
    pub session_file: Option<PathBuf>,
    pub admin: Option<AdminSeed>,
    pub options: AppOptions,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("site_url", &self.site_url.as_str())
            .field("gemini_base_url", &self.gemini_base_url)
            .field("mercado_pago_base_url", &self.mercado_pago_base_url)
            .field("session_file", &self.session_file)
            .field("admin", &self.admin)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Creates a new configuration, validating the site URL and secrets.
    pub fn new(
        site_url: &str,
        gemini_api_key: &str,
        mercado_pago_access_token: &str,
        session_secret: &str,
    ) -> Result<Self> {
        let site_url = Url::parse(site_url)?;
        for (name, value) in [
            ("gemini_api_key", gemini_api_key),
            ("mercado_pago_access_token", mercado_pago_access_token),
            ("session_secret", session_secret),
        ] {
            if value.trim().is_empty() {
                return Err(Error::config(format!("{} cannot be empty", name)));
            }
        }

        Ok(Self {
            site_url,
            gemini_api_key: gemini_api_key.to_string(),
            gemini_base_url: GEMINI_API_URL.to_string(),
            mercado_pago_access_token: mercado_pago_access_token.to_string(),
            mercado_pago_base_url: MERCADO_PAGO_API_URL.to_string(),
            session_secret: session_secret.to_string(),
            session_file: None,
            admin: None,
            options: AppOptions::default(),
        })
    }

    /// Reads the configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| Error::config(format!("{} environment variable not found", name)))
        };

        let mut config = Self::new(
            &required("VOXPROMO_SITE_URL")?,
            &required("GEMINI_API_KEY")?,
            &required("MERCADO_PAGO_ACCESS_TOKEN")?,
            &required("VOXPROMO_SESSION_SECRET")?,
        )?;

        config.session_file = lookup("VOXPROMO_SESSION_FILE")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        if let Some(password) = lookup("VOXPROMO_ADMIN_PASSWORD").filter(|p| !p.is_empty()) {
            let email = lookup("VOXPROMO_ADMIN_EMAIL")
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| voxpromo_auth::DEFAULT_ADMIN_EMAIL.to_string());
            config.admin = Some(AdminSeed { email, password });
        }

        Ok(config)
    }

    pub fn with_options(mut self, options: AppOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_gemini_base_url(mut self, value: &str) -> Self {
        self.gemini_base_url = value.to_string();
        self
    }

    pub fn with_mercado_pago_base_url(mut self, value: &str) -> Self {
        self.mercado_pago_base_url = value.to_string();
        self
    }

    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    pub fn with_admin(mut self, email: &str, password: &str) -> Self {
        self.admin = Some(AdminSeed {
            email: email.to_string(),
            password: password.to_string(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("VOXPROMO_SITE_URL", "https://voxpromo.example"),
            ("GEMINI_API_KEY", "gemini-key"),
            ("MERCADO_PAGO_ACCESS_TOKEN", "mp-token"),
            ("VOXPROMO_SESSION_SECRET", "secret"),
        ]
    }

    #[test]
    fn test_from_lookup_minimal() {
        let vars = env(&required());
        let config = AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.site_url.as_str(), "https://voxpromo.example/");
        assert_eq!(config.gemini_base_url, GEMINI_API_URL);
        assert_eq!(config.session_file, None);
        assert!(config.admin.is_none());
        assert_eq!(config.options.max_free_creations, 5);
        assert_eq!(config.options.max_polls, 20);
    }

    #[test]
    fn test_from_lookup_optional_values() {
        let mut pairs = required();
        pairs.push(("VOXPROMO_SESSION_FILE", "/tmp/voxpromo-session.json"));
        pairs.push(("VOXPROMO_ADMIN_PASSWORD", "admin157"));
        let vars = env(&pairs);

        let config = AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(
            config.session_file,
            Some(PathBuf::from("/tmp/voxpromo-session.json"))
        );
        let admin = config.admin.unwrap();
        assert_eq!(admin.email, voxpromo_auth::DEFAULT_ADMIN_EMAIL);
        assert!(!format!("{:?}", admin).contains("admin157"));
    }

    #[test]
    fn test_missing_required_value() {
        let mut vars = env(&required());
        vars.remove("MERCADO_PAGO_ACCESS_TOKEN");

        let err = AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        match err {
            Error::Config(msg) => assert!(msg.contains("MERCADO_PAGO_ACCESS_TOKEN")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_site_url() {
        assert!(matches!(
            AppConfig::new("not a url", "k", "t", "s"),
            Err(Error::Url(_))
        ));
    }
}
