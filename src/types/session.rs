//! Credentials, cookie jar and the negotiated session
//!
//! A [`Session`] can only be built through [`Session::try_from`], which refuses
//! any set of parts with an empty field. Nothing downstream has to re-check.

use crate::error::{AuthStage, Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::collections::BTreeMap;

/// Username and password for the SSO login
///
/// The password never appears in `Debug` output.
#[derive(Debug)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    /// Create credentials from plain input
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into().trim().to_string(),
            password: SecretString::from(password.into()),
        }
    }

    /// Student number used as the login name
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password, still wrapped
    pub fn password(&self) -> &SecretString {
        &self.password
    }

    /// Check that both fields are present
    ///
    /// Runs before any request is made.
    pub fn validate(&self) -> Result<()> {
        if self.password.expose_secret().is_empty() {
            return Err(Error::auth(AuthStage::Credentials, "password is required"));
        }
        if self.username.is_empty() {
            return Err(Error::auth(AuthStage::Credentials, "username is required"));
        }
        Ok(())
    }
}

/// Cookie name to value mapping
///
/// Ordered so that the rendered `Cookie` header is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CookieJar(BTreeMap<String, String>);

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` into this jar; `other` wins on name collisions
    pub fn merge(&mut self, other: &CookieJar) {
        for (name, value) in &other.0 {
            self.0.insert(name.clone(), value.clone());
        }
    }

    /// Return a new jar holding `self` overridden by `other`
    pub fn merged_with(&self, other: &CookieJar) -> CookieJar {
        let mut jar = self.clone();
        jar.merge(other);
        jar
    }

    /// Render as a `Cookie` request header value
    pub fn header_value(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CookieJar {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Everything the handshake collects before it is sealed into a [`Session`]
#[derive(Debug, Clone, Default)]
pub struct SessionParts {
    pub cookies: CookieJar,
    pub token: String,
    pub ticket: String,
    pub prefix: String,
    pub display_name: String,
    pub student_code: String,
    pub batch_code: String,
}

/// Authenticated session against the course-selection service
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    cookies: CookieJar,
    token: String,
    ticket: String,
    prefix: String,
    display_name: String,
    student_code: String,
    batch_code: String,
}

impl TryFrom<SessionParts> for Session {
    type Error = Error;

    fn try_from(parts: SessionParts) -> Result<Self> {
        let missing = [
            ("cookies", parts.cookies.is_empty()),
            ("token", parts.token.is_empty()),
            ("ticket", parts.ticket.is_empty()),
            ("prefix", parts.prefix.is_empty()),
            ("display name", parts.display_name.is_empty()),
            ("student code", parts.student_code.is_empty()),
            ("batch code", parts.batch_code.is_empty()),
        ]
        .into_iter()
        .filter(|(_, empty)| *empty)
        .map(|(name, _)| name)
        .collect::<Vec<_>>();

        if !missing.is_empty() {
            return Err(Error::auth(
                AuthStage::Batch,
                format!("incomplete session, missing {}", missing.join(", ")),
            ));
        }

        Ok(Self {
            cookies: parts.cookies,
            token: parts.token,
            ticket: parts.ticket,
            prefix: parts.prefix,
            display_name: parts.display_name,
            student_code: parts.student_code,
            batch_code: parts.batch_code,
        })
    }
}

impl Session {
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// Bearer token sent in the `token` header
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn ticket(&self) -> &str {
        &self.ticket
    }

    /// Internal class-id prefix of the open registration window
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn student_code(&self) -> &str {
        &self.student_code
    }

    pub fn batch_code(&self) -> &str {
        &self.batch_code
    }

    /// Internal teaching-class id for a public course code
    pub fn teaching_class_id(&self, course_code: &str) -> String {
        format!("{}{}", self.prefix, course_code)
    }

    /// Shareable view without cookies or tokens
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            display_name: self.display_name.clone(),
            student_code: self.student_code.clone(),
            batch_code: self.batch_code.clone(),
            prefix: self.prefix.clone(),
            cookie_count: self.cookies.len(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("display_name", &self.display_name)
            .field("student_code", &self.student_code)
            .field("batch_code", &self.batch_code)
            .field("prefix", &self.prefix)
            .field("cookies", &self.cookies.len())
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Session details that are safe to print
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "studentCode")]
    pub student_code: String,
    #[serde(rename = "batchCode")]
    pub batch_code: String,
    pub prefix: String,
    #[serde(rename = "cookieCount")]
    pub cookie_count: usize,
}
