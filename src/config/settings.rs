//! Configuration settings
//!
//! Loaded from a TOML file, then overridden by environment variables and
//! finally by command-line flags.

use crate::types::{Category, ReservationTarget};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Helper functions for serde defaults
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_sso_base() -> String {
    "https://org.xjtu.edu.cn".to_string()
}

fn default_xk_base() -> String {
    "https://xkfw.xjtu.edu.cn".to_string()
}

fn default_audience() -> String {
    "本科生选课".to_string()
}

fn default_member_id() -> String {
    "860000".to_string()
}

fn default_aes_key() -> String {
    "0725@pwdorgopenp".to_string()
}

fn default_login_attempts() -> u32 {
    5
}

fn default_login_timeout() -> Duration {
    Duration::from_millis(1500)
}

fn default_hop_attempts() -> u32 {
    5
}

fn default_hop_timeout() -> Duration {
    Duration::from_millis(2000)
}

fn default_success_message() -> String {
    "成功".to_string()
}

fn default_captcha_message() -> String {
    "图形验证码不能为空".to_string()
}

fn default_attempt_interval() -> Duration {
    Duration::from_millis(300)
}

fn default_relogin_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_relogin_backoff() -> Duration {
    Duration::from_millis(500)
}

fn default_online_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_max_concurrent_targets() -> usize {
    4
}

fn default_expiry_markers() -> Vec<String> {
    vec![
        "登录者身份".to_string(),
        "登录失效".to_string(),
        "登录已失效".to_string(),
    ]
}

fn default_success_markers() -> Vec<String> {
    vec!["成功".to_string()]
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36 Edg/133.0.0.0".to_string()
}

// Duration serialization module
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Main configuration settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Login account
    #[serde(default)]
    pub account: AccountSettings,
    /// Courses to grab, in order
    #[serde(default)]
    pub courses: Vec<ReservationTarget>,
    /// Remote service locations and constants
    #[serde(default)]
    pub portal: PortalSettings,
    /// Login handshake retry policy and literals
    #[serde(default)]
    pub auth: AuthSettings,
    /// Reservation loop cadence and outcome markers
    #[serde(default)]
    pub reservation: ReservationSettings,
    /// Network configuration
    #[serde(default)]
    pub network: NetworkSettings,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// SSO account
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AccountSettings {
    /// Student number
    #[serde(default)]
    pub username: String,
    /// Plain password; kept out of `Debug`
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for AccountSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSettings")
            .field("username", &self.username)
            .field(
                "password",
                &if self.password.is_empty() {
                    "<empty>"
                } else {
                    "<redacted>"
                },
            )
            .finish()
    }
}

/// Remote service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalSettings {
    /// Open-platform SSO host
    #[serde(default = "default_sso_base")]
    pub sso_base: String,
    /// Course-selection service host
    #[serde(default = "default_xk_base")]
    pub xk_base: String,
    /// Substring a registration window name must contain
    #[serde(default = "default_audience")]
    pub audience: String,
    /// `memberId` cookie sent with the redirect lookup
    #[serde(default = "default_member_id")]
    pub member_id: String,
    /// Pre-shared AES-128 key of the login form, exactly 16 bytes
    #[serde(default = "default_aes_key")]
    pub aes_key: String,
}

/// Login handshake configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Attempts for the credential submission
    #[serde(default = "default_login_attempts")]
    pub login_attempts: u32,
    /// Per-attempt timeout of the credential submission (milliseconds)
    #[serde(with = "duration_millis", default = "default_login_timeout")]
    pub login_timeout: Duration,
    /// Attempts for each redirect hop
    #[serde(default = "default_hop_attempts")]
    pub hop_attempts: u32,
    /// Per-hop timeout (milliseconds)
    #[serde(with = "duration_millis", default = "default_hop_timeout")]
    pub hop_timeout: Duration,
    /// Login `message` that means success
    #[serde(default = "default_success_message")]
    pub success_message: String,
    /// Login `message` that means a picture captcha is demanded
    #[serde(default = "default_captcha_message")]
    pub captcha_message: String,
}

/// Reservation loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationSettings {
    /// Pause between attempts (milliseconds)
    #[serde(with = "duration_millis", default = "default_attempt_interval")]
    pub attempt_interval: Duration,
    /// Minimum spacing of re-login attempts (milliseconds)
    #[serde(with = "duration_millis", default = "default_relogin_interval")]
    pub relogin_interval: Duration,
    /// Pause after a failed or throttled re-login (milliseconds)
    #[serde(with = "duration_millis", default = "default_relogin_backoff")]
    pub relogin_backoff: Duration,
    /// Refresh period of the online-user count (milliseconds)
    #[serde(with = "duration_millis", default = "default_online_poll_interval")]
    pub online_poll_interval: Duration,
    /// Upper bound on concurrently running loops
    #[serde(default = "default_max_concurrent_targets")]
    pub max_concurrent_targets: usize,
    /// Substrings of a response message meaning the session is gone
    #[serde(default = "default_expiry_markers")]
    pub expiry_markers: Vec<String>,
    /// Substrings of a response message meaning the seat was taken
    #[serde(default = "default_success_markers")]
    pub success_markers: Vec<String>,
}

/// Network and proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// HTTPS proxy URL
    #[serde(default)]
    pub https_proxy: Option<String>,
    /// HTTP proxy URL
    #[serde(default)]
    pub http_proxy: Option<String>,
    /// All protocols proxy URL
    #[serde(default)]
    pub all_proxy: Option<String>,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Default request timeout in seconds, for calls without their own policy
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Disable TLS certificate verification
    #[serde(default)]
    pub disable_tls_verification: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Log every reservation event, not only state changes
    #[serde(default = "default_true")]
    pub log_events: bool,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            sso_base: default_sso_base(),
            xk_base: default_xk_base(),
            audience: default_audience(),
            member_id: default_member_id(),
            aes_key: default_aes_key(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            login_attempts: default_login_attempts(),
            login_timeout: default_login_timeout(),
            hop_attempts: default_hop_attempts(),
            hop_timeout: default_hop_timeout(),
            success_message: default_success_message(),
            captcha_message: default_captcha_message(),
        }
    }
}

impl Default for ReservationSettings {
    fn default() -> Self {
        Self {
            attempt_interval: default_attempt_interval(),
            relogin_interval: default_relogin_interval(),
            relogin_backoff: default_relogin_backoff(),
            online_poll_interval: default_online_poll_interval(),
            max_concurrent_targets: default_max_concurrent_targets(),
            expiry_markers: default_expiry_markers(),
            success_markers: default_success_markers(),
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            https_proxy: None,
            http_proxy: None,
            all_proxy: None,
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            disable_tls_verification: false,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            verbose: false,
            format: default_log_format(),
            log_events: default_true(),
        }
    }
}

impl Settings {
    /// Create new settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings written by `init`: defaults plus one sample course per category
    pub fn template() -> Self {
        Self {
            courses: vec![
                ReservationTarget::new("COMP30072701", Category::Major),
                ReservationTarget::new("CORE10010101", Category::Elective),
                ReservationTarget::new("PHED10265003", Category::Physical),
                ReservationTarget::new("AUTO50112701", Category::Program),
            ],
            ..Self::default()
        }
    }

    /// Load settings from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut settings = Self::default();
        settings.apply_env()?;
        Ok(settings)
    }

    /// Load settings from configuration file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config("file", &format!("Failed to read config file: {}", e))
        })?;

        let settings: Settings = toml::from_str(&content).map_err(|e| {
            crate::Error::config("file", &format!("Failed to parse config file: {}", e))
        })?;

        Ok(settings)
    }

    /// Merge settings with environment variable overrides
    pub fn merge_with_env(mut self) -> crate::Result<Self> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> crate::Result<()> {
        if let Ok(username) = std::env::var("XKFW_USERNAME") {
            self.account.username = username;
        }
        if let Ok(password) = std::env::var("XKFW_PASSWORD") {
            self.account.password = password;
        }

        if let Ok(interval) = std::env::var("XKFW_ATTEMPT_INTERVAL_MS") {
            let millis: u64 = interval.parse().map_err(|e| {
                crate::Error::config(
                    "XKFW_ATTEMPT_INTERVAL_MS",
                    &format!("Invalid interval: {}", e),
                )
            })?;
            self.reservation.attempt_interval = Duration::from_millis(millis);
        }

        // Proxy variables always override when present
        if let Ok(proxy) = std::env::var("HTTPS_PROXY") {
            self.network.https_proxy = Some(proxy);
        }
        if let Ok(proxy) = std::env::var("HTTP_PROXY") {
            self.network.http_proxy = Some(proxy);
        }
        if let Ok(proxy) = std::env::var("ALL_PROXY") {
            self.network.all_proxy = Some(proxy);
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(verbose) = std::env::var("VERBOSE") {
            self.logging.verbose = verbose.parse().unwrap_or(false);
        }

        Ok(())
    }

    /// Get effective proxy URL based on priority
    pub fn get_proxy_url(&self) -> Option<String> {
        self.network
            .https_proxy
            .as_ref()
            .or(self.network.http_proxy.as_ref())
            .or(self.network.all_proxy.as_ref())
            .cloned()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> crate::Result<()> {
        if self.portal.aes_key.len() != 16 {
            return Err(crate::Error::config(
                "aes_key",
                &format!(
                    "AES-128 key must be 16 bytes, got {}",
                    self.portal.aes_key.len()
                ),
            ));
        }

        for (name, base) in [
            ("sso_base", &self.portal.sso_base),
            ("xk_base", &self.portal.xk_base),
        ] {
            if let Err(e) = url::Url::parse(base) {
                return Err(crate::Error::config(
                    name,
                    &format!("Invalid base URL '{}': {}", base, e),
                ));
            }
        }

        if self.auth.login_attempts == 0 || self.auth.hop_attempts == 0 {
            return Err(crate::Error::config(
                "attempts",
                "Retry attempts must be at least 1",
            ));
        }

        for (name, interval) in [
            ("attempt_interval", self.reservation.attempt_interval),
            ("relogin_interval", self.reservation.relogin_interval),
            ("relogin_backoff", self.reservation.relogin_backoff),
            ("online_poll_interval", self.reservation.online_poll_interval),
            ("login_timeout", self.auth.login_timeout),
            ("hop_timeout", self.auth.hop_timeout),
        ] {
            if interval.is_zero() {
                return Err(crate::Error::config(name, "Interval cannot be 0"));
            }
        }

        if self.reservation.max_concurrent_targets == 0 {
            return Err(crate::Error::config(
                "max_concurrent_targets",
                "At least one concurrent target is required",
            ));
        }

        if self.courses.len() > self.reservation.max_concurrent_targets {
            return Err(crate::Error::config(
                "courses",
                &format!(
                    "{} courses configured but at most {} may run at once",
                    self.courses.len(),
                    self.reservation.max_concurrent_targets
                ),
            ));
        }

        if self.courses.iter().any(|c| c.code.is_empty()) {
            return Err(crate::Error::config("courses", "Course code cannot be empty"));
        }

        if self.reservation.expiry_markers.iter().all(|m| m.is_empty())
            || self.reservation.success_markers.iter().all(|m| m.is_empty())
        {
            return Err(crate::Error::config(
                "markers",
                "Expiry and success markers cannot be empty",
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(crate::Error::config(
                    "log_level",
                    &format!("Invalid log level: {}", self.logging.level),
                ));
            }
        }

        match self.logging.format.to_lowercase().as_str() {
            "text" | "json" => {}
            _ => {
                return Err(crate::Error::config(
                    "log_format",
                    &format!("Invalid log format: {}", self.logging.format),
                ));
            }
        }

        for (name, proxy_url) in [
            ("https_proxy", &self.network.https_proxy),
            ("http_proxy", &self.network.http_proxy),
            ("all_proxy", &self.network.all_proxy),
        ]
        .iter()
        {
            if let Some(url_str) = proxy_url
                && let Err(e) = url::Url::parse(url_str)
            {
                return Err(crate::Error::config(
                    *name,
                    &format!("Invalid proxy URL '{}': {}", url_str, e),
                ));
            }
        }

        Ok(())
    }
}
