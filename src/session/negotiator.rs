//! Login handshake that turns credentials into a [`Session`]
//!
//! The steps run strictly in order and each one feeds the next:
//! credentials, redirect URL, redirect chain, bearer token, registration
//! window and class-id prefix. Any failure ends the run; no partial session
//! leaves this module.

use super::{
    crypto::encrypt_password,
    network::Redirects,
    portal::{PortalClient, seed_cookies},
};
use crate::{
    config::settings::AuthSettings,
    error::{AuthStage, Error, Result, format_error_for_logging},
    types::{
        CookieJar, Credentials, Session, SessionParts,
        portal::{ElectiveBatch, RecommendedCourse},
    },
};
use secrecy::ExposeSecret;
use tracing::{debug, error, info, warn};

/// Something that can log a user in
///
/// The session store only depends on this, which lets tests count and delay
/// negotiations without a portal.
#[async_trait::async_trait]
pub trait Negotiate: Send + Sync {
    async fn negotiate(&self, credentials: &Credentials) -> Result<Session>;
}

/// Cookies and ticket left behind by the redirect chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectOutcome {
    pub ticket: Option<String>,
    pub cookies: CookieJar,
}

/// Text after the last `ticket=` of a relocation target
pub fn extract_ticket(location: &str) -> Option<&str> {
    location
        .rsplit_once("ticket=")
        .map(|(_, ticket)| ticket)
        .filter(|ticket| !ticket.is_empty())
}

/// First window that is selectable, meant for `audience` and offers a category
pub fn select_batch<'a>(batches: &'a [ElectiveBatch], audience: &str) -> Option<&'a ElectiveBatch> {
    batches.iter().find(|batch| batch.is_open_for(audience))
}

/// Class-id prefix: the first teaching class id up to its course number
pub fn derive_prefix(courses: &[RecommendedCourse]) -> Result<String> {
    let course = courses
        .first()
        .ok_or_else(|| Error::auth(AuthStage::Batch, "no course information found"))?;
    let class = course.teaching_classes.first().ok_or_else(|| {
        Error::auth(
            AuthStage::Batch,
            format!("course {} has no teaching classes", course.course_number),
        )
    })?;

    if course.course_number.is_empty() {
        return Err(Error::auth(AuthStage::Batch, "course number missing"));
    }

    match class.teaching_class_id.split_once(course.course_number.as_str()) {
        Some((prefix, _)) if !prefix.is_empty() => Ok(prefix.to_string()),
        _ => Err(Error::auth(
            AuthStage::Batch,
            format!(
                "teaching class id {} does not contain course number {}",
                class.teaching_class_id, course.course_number
            ),
        )),
    }
}

/// Runs the handshake against the live portal
#[derive(Debug, Clone)]
pub struct SessionNegotiator {
    client: PortalClient,
    auth: AuthSettings,
}

impl SessionNegotiator {
    pub fn new(client: PortalClient, auth: AuthSettings) -> Self {
        Self { client, auth }
    }

    /// Submit credentials and return the user token plus the updated jar
    async fn submit_credentials(
        &self,
        credentials: &Credentials,
        jar: &mut CookieJar,
    ) -> Result<String> {
        let portal = self.client.portal_settings();
        let encrypted = encrypt_password(
            credentials.password().expose_secret(),
            portal.aes_key.as_bytes(),
        )?;

        let reply = self
            .client
            .login(credentials.username(), &encrypted, jar)
            .await?;
        jar.merge(&reply.cookies);

        if reply.message == self.auth.captcha_message {
            warn!("Login requires an interactive captcha");
            return Err(Error::CaptchaRequired {
                login_page: self.client.login_page(),
            });
        }

        if reply.message != self.auth.success_message {
            error!(message = %reply.message, "Login rejected");
            return Err(Error::auth(AuthStage::Login, reply.message));
        }

        reply
            .user_token
            .ok_or_else(|| Error::auth(AuthStage::Login, "user token missing from login reply"))
    }

    /// Walk the redirect chain starting at `url`
    ///
    /// Only a relocation that carries `ticket=` is followed. In that case the
    /// resulting jar holds the first hop's cookies overridden by the second
    /// hop's and nothing else; otherwise `jar` is returned untouched.
    pub async fn resolve_redirect_chain(&self, url: &str, jar: &CookieJar) -> Result<RedirectOutcome> {
        let first = self.client.hop(url, jar, Redirects::Manual).await?;

        let Some(location) = first.location.as_deref() else {
            debug!("Redirect chain ended without a relocation");
            return Ok(RedirectOutcome {
                ticket: None,
                cookies: jar.clone(),
            });
        };

        let Some(ticket) = extract_ticket(location) else {
            debug!("Relocation carries no ticket");
            return Ok(RedirectOutcome {
                ticket: None,
                cookies: jar.clone(),
            });
        };

        let second = self
            .client
            .hop(location, &first.cookies, Redirects::Follow)
            .await?;

        Ok(RedirectOutcome {
            ticket: Some(ticket.to_string()),
            cookies: first.cookies.merged_with(&second.cookies),
        })
    }

    async fn run(&self, credentials: &Credentials) -> Result<Session> {
        let username = credentials.username();
        let portal = self.client.portal_settings();

        let mut jar = seed_cookies();
        let user_token = self.submit_credentials(credentials, &mut jar).await?;
        info!("Credentials accepted");

        jar.insert("open_Platform_User", user_token);
        jar.insert("memberId", portal.member_id.as_str());

        let lookup = self.client.redirect_url(username, &jar).await?;
        jar.merge(&lookup.cookies);
        let redirect_url = lookup
            .url
            .ok_or_else(|| Error::auth(AuthStage::Ticket, "redirect URL missing"))?;

        let chain = self.resolve_redirect_chain(&redirect_url, &jar).await?;
        let mut jar = chain.cookies;
        let ticket = chain.ticket.ok_or_else(|| {
            Error::auth(
                AuthStage::Redirect,
                "service ticket missing from redirect chain",
            )
        })?;
        info!("Redirect chain resolved");

        let registration = self.client.register(username, &ticket, &jar).await?;
        jar.merge(&registration.cookies);
        if registration.token.is_empty() {
            return Err(Error::auth(AuthStage::Token, "token acquisition failed"));
        }
        let token = registration.token;
        info!(name = %registration.display_name, "Bearer token acquired");

        let info = self
            .client
            .batch_info(username, &token, &ticket, &jar)
            .await?;
        if info.code != "1" {
            return Err(Error::auth(AuthStage::Batch, info.msg));
        }
        let batches = info
            .data
            .map(|data| data.elective_batch_list)
            .unwrap_or_default();
        let batch = select_batch(&batches, &portal.audience).ok_or_else(|| {
            Error::auth(
                AuthStage::Batch,
                format!("no open registration window for {}", portal.audience),
            )
        })?;
        debug!(
            batch = %batch.code,
            name = %batch.name,
            categories = ?batch.enabled_categories(),
            "Registration window selected"
        );

        let courses = self
            .client
            .recommended_courses(username, &batch.code, &token, &jar)
            .await?;
        if courses.code != "1" {
            return Err(Error::auth(
                AuthStage::Batch,
                format!("course query failed: {}", courses.msg),
            ));
        }
        let prefix = derive_prefix(&courses.data_list)?;

        Session::try_from(SessionParts {
            cookies: jar,
            token,
            ticket,
            prefix,
            display_name: registration.display_name,
            student_code: username.to_string(),
            batch_code: batch.code.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Negotiate for SessionNegotiator {
    async fn negotiate(&self, credentials: &Credentials) -> Result<Session> {
        credentials.validate()?;

        info!(username = %credentials.username(), "Negotiating session");
        match self.run(credentials).await {
            Ok(session) => {
                info!(
                    batch = %session.batch_code(),
                    prefix = %session.prefix(),
                    "Session established"
                );
                Ok(session)
            }
            Err(e) => {
                error!(details = %format_error_for_logging(&e), "Session negotiation failed");
                Err(e)
            }
        }
    }
}
