//! Remote endpoints of the SSO and the course-selection service
//!
//! [`PortalClient`] only speaks the wire protocol: it builds requests, attaches
//! cookies and headers, and hands back what the portal said. Deciding whether
//! an answer is good enough is left to the negotiator and the reservation loop.

use super::network::{Fetched, NetworkManager, Redirects, RetryPolicy};
use crate::{
    Result,
    config::{Settings, settings::PortalSettings},
    types::{
        Category, CookieJar, ReservationTarget, Session,
        portal::{
            BatchInfoResponse, CourseQuery, CourseQueryData, RecommendedCourseResponse,
            VolunteerRequest, VolunteerRequestData, VolunteerResponse,
        },
    },
};
use reqwest::{RequestBuilder, header};
use serde_json::Value;
use tracing::debug;

const LOGIN_PATH: &str = "/openplatform/g/admin/login";
const LOGIN_PAGE_PATH: &str = "/openplatform/login.html";
const REDIRECT_URL_PATH: &str = "/openplatform/oauth/auth/getRedirectUrl";
const APP_PATH: &str = "/xsxkapp/sys/xsxkapp";

/// Cookies the login page sets before the form is submitted
const SEED_COOKIES: [(&str, &str); 3] = [
    ("cur_appId_", "DP8bMYJppEA="),
    ("state", "xjdCas"),
    (
        "sid_code",
        "workbench_login_jcaptcha_D5EEE031FFC3F40CEE6041558ED6BBF8",
    ),
];

/// The portal only accepts physical-education picks from this browser
const LEGACY_DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/50.0.2661.87 Safari/537.36";

const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";
const BROWSER_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8,en-GB;q=0.7,en-US;q=0.6";

/// Seed jar for a fresh login
pub fn seed_cookies() -> CookieJar {
    SEED_COOKIES.into_iter().collect()
}

/// Answer of the credential submission
#[derive(Debug, Clone)]
pub struct LoginReply {
    /// Portal `message`, empty when absent
    pub message: String,
    /// `data.tokenKey`
    pub user_token: Option<String>,
    pub cookies: CookieJar,
}

/// Answer of the redirect URL lookup
#[derive(Debug, Clone)]
pub struct RedirectLookup {
    /// `data`, if it was a string
    pub url: Option<String>,
    pub cookies: CookieJar,
}

/// Answer of the registration lookup
#[derive(Debug, Clone)]
pub struct Registration {
    pub display_name: String,
    /// Bearer token, empty when the portal withheld it
    pub token: String,
    pub cookies: CookieJar,
}

/// The privileged action and the online-user probe
///
/// Split out so the reservation loop can run against a fake.
#[async_trait::async_trait]
pub trait ReservationApi: Send + Sync {
    /// Submit one seat request and return the portal's message verbatim
    async fn submit(&self, session: &Session, target: &ReservationTarget) -> Result<String>;

    /// Number of users the portal reports as online
    async fn online_users(&self, session: &Session) -> Result<u64>;
}

/// Client for every endpoint the grabber touches
#[derive(Debug, Clone)]
pub struct PortalClient {
    network: NetworkManager,
    portal: PortalSettings,
    login_policy: RetryPolicy,
    hop_policy: RetryPolicy,
}

impl PortalClient {
    /// Create a client with its own network manager
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self::with_network(NetworkManager::new(settings)?, settings))
    }

    /// Create a client on top of an existing network manager
    pub fn with_network(network: NetworkManager, settings: &Settings) -> Self {
        Self {
            network,
            portal: settings.portal.clone(),
            login_policy: RetryPolicy::new(
                settings.auth.login_attempts,
                settings.auth.login_timeout,
            ),
            hop_policy: RetryPolicy::new(settings.auth.hop_attempts, settings.auth.hop_timeout),
        }
    }

    pub fn portal_settings(&self) -> &PortalSettings {
        &self.portal
    }

    /// Page where a user can clear a captcha by hand
    pub fn login_page(&self) -> String {
        self.sso_url(LOGIN_PAGE_PATH)
    }

    fn sso_url(&self, path: &str) -> String {
        format!("{}{}", self.portal.sso_base.trim_end_matches('/'), path)
    }

    fn app_url(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.portal.xk_base.trim_end_matches('/'),
            APP_PATH,
            path
        )
    }

    fn index_referer(&self, ticket: &str) -> String {
        format!("{}?ticket={}", self.app_url("/*default/index.do"), ticket)
    }

    fn timestamp() -> String {
        chrono::Utc::now().timestamp_millis().to_string()
    }

    /// POST the encrypted credentials
    pub async fn login(
        &self,
        username: &str,
        encrypted_password: &str,
        cookies: &CookieJar,
    ) -> Result<LoginReply> {
        let body = serde_json::json!({
            "loginType": 1,
            "username": username,
            "pwd": encrypted_password,
            "jcaptchaCode": "",
        });
        let url = self.sso_url(LOGIN_PATH);

        let fetched = self
            .network
            .fetch("login", Redirects::Follow, self.login_policy, |client| {
                with_cookies(client.post(&url), cookies)
                    .header(header::CONTENT_TYPE, "application/json;charset=utf-8")
                    .json(&body)
            })
            .await?;

        let value: Value = fetched.json()?;
        let message = value
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let user_token = value
            .get("data")
            .and_then(|data| data.get("tokenKey"))
            .and_then(|v| v.as_str())
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        debug!(message = %message, has_token = user_token.is_some(), "login answered");

        Ok(LoginReply {
            message,
            user_token,
            cookies: fetched.cookies,
        })
    }

    /// Look up the URL that starts the redirect chain
    pub async fn redirect_url(&self, username: &str, cookies: &CookieJar) -> Result<RedirectLookup> {
        let url = self.sso_url(REDIRECT_URL_PATH);
        let timestamp = Self::timestamp();

        let fetched = self
            .network
            .fetch(
                "redirect lookup",
                Redirects::Follow,
                self.network.default_policy(),
                |client| {
                    with_cookies(client.get(&url), cookies).query(&[
                        ("userType", "1"),
                        ("personNo", username),
                        ("_", timestamp.as_str()),
                    ])
                },
            )
            .await?;

        let value: Value = fetched.json()?;
        let url = value
            .get("data")
            .and_then(|v| v.as_str())
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        Ok(RedirectLookup {
            url,
            cookies: fetched.cookies,
        })
    }

    /// GET one step of the redirect chain with browser headers
    pub async fn hop(&self, url: &str, cookies: &CookieJar, redirects: Redirects) -> Result<Fetched> {
        let referer = format!("{}/", self.portal.sso_base.trim_end_matches('/'));

        self.network
            .fetch("redirect hop", redirects, self.hop_policy, |client| {
                with_cookies(client.get(url), cookies)
                    .header(header::ACCEPT, BROWSER_ACCEPT)
                    .header(header::ACCEPT_LANGUAGE, BROWSER_LANGUAGE)
                    .header(header::REFERER, referer.as_str())
                    .header(header::UPGRADE_INSECURE_REQUESTS, "1")
                    .header("Sec-Fetch-Site", "same-site")
                    .header("Sec-Fetch-Mode", "navigate")
                    .header("Sec-Fetch-User", "?1")
                    .header("Sec-Fetch-Dest", "document")
            })
            .await
    }

    /// Exchange the service ticket for the bearer token
    pub async fn register(
        &self,
        username: &str,
        ticket: &str,
        cookies: &CookieJar,
    ) -> Result<Registration> {
        let url = self.app_url("/student/register.do");
        let referer = self.index_referer(ticket);

        let fetched = self
            .network
            .fetch(
                "registration",
                Redirects::Follow,
                self.network.default_policy(),
                |client| {
                    with_cookies(client.get(&url), cookies)
                        .query(&[("number", username)])
                        .header(header::REFERER, referer.as_str())
                },
            )
            .await?;

        let value: Value = fetched.json()?;
        let data = value.get("data");
        let field = |name: &str| {
            data.and_then(|d| d.get(name))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        Ok(Registration {
            display_name: field("name"),
            token: field("token"),
            cookies: fetched.cookies,
        })
    }

    /// Student profile and registration windows
    pub async fn batch_info(
        &self,
        student_code: &str,
        token: &str,
        ticket: &str,
        cookies: &CookieJar,
    ) -> Result<BatchInfoResponse> {
        let url = self.app_url(&format!("/student/{}.do", student_code));
        let referer = self.index_referer(ticket);
        let timestamp = Self::timestamp();

        let fetched = self
            .network
            .fetch(
                "batch info",
                Redirects::Follow,
                self.network.default_policy(),
                |client| {
                    with_cookies(client.get(&url), cookies)
                        .query(&[("timestamp", timestamp.as_str())])
                        .header(header::ACCEPT, "*/*")
                        .header("X-Requested-With", "XMLHttpRequest")
                        .header("token", token)
                        .header(header::REFERER, referer.as_str())
                },
            )
            .await?;

        fetched.json()
    }

    /// First page of recommended major courses in a window
    pub async fn recommended_courses(
        &self,
        student_code: &str,
        batch_code: &str,
        token: &str,
        cookies: &CookieJar,
    ) -> Result<RecommendedCourseResponse> {
        let query = CourseQuery {
            data: CourseQueryData {
                student_code,
                campus: "1",
                elective_batch_code: batch_code,
                is_major: "1",
                teaching_class_type: Category::Major.code(),
                check_conflict: "2",
                check_capacity: "2",
                query_content: "",
            },
            page_size: "10",
            page_number: "0",
            order: "",
        };
        let query_setting = serde_json::to_string(&query)?;
        let url = self.app_url("/elective/recommendedCourse.do");
        let referer = format!("{}?token={}", self.app_url("/*default/grablessons.do"), token);

        let fetched = self
            .network
            .fetch(
                "recommended courses",
                Redirects::Follow,
                self.network.default_policy(),
                |client| {
                    with_cookies(client.post(&url), cookies)
                        .header(header::ACCEPT, "application/json, text/javascript, */*; q=0.01")
                        .header("X-Requested-With", "XMLHttpRequest")
                        .header("token", token)
                        .header(header::REFERER, referer.as_str())
                        .form(&[("querySetting", query_setting.as_str())])
                },
            )
            .await?;

        fetched.json()
    }
}

#[async_trait::async_trait]
impl ReservationApi for PortalClient {
    async fn submit(&self, session: &Session, target: &ReservationTarget) -> Result<String> {
        let teaching_class_id = session.teaching_class_id(&target.code);
        let request = VolunteerRequest {
            data: VolunteerRequestData {
                operation_type: "1",
                student_code: session.student_code(),
                elective_batch_code: session.batch_code(),
                teaching_class_id: &teaching_class_id,
                is_major: "1",
                campus: "1",
                teaching_class_type: target.category.code(),
            },
        };
        let add_param = serde_json::to_string(&request)?;
        let url = self.app_url("/elective/volunteer.do");

        let fetched = self
            .network
            .fetch(
                "volunteer",
                Redirects::Follow,
                self.network.default_policy(),
                |client| {
                    let mut builder = with_cookies(client.post(&url), session.cookies())
                        .header("token", session.token())
                        .form(&[("addParam", add_param.as_str())]);
                    if target.category == Category::Physical {
                        builder = builder.header(header::USER_AGENT, LEGACY_DESKTOP_UA);
                    }
                    builder
                },
            )
            .await?;

        let response: VolunteerResponse = fetched.json()?;
        Ok(response.msg)
    }

    async fn online_users(&self, session: &Session) -> Result<u64> {
        let url = self.app_url("/publicinfo/onlineUsers.do");
        let referer = self.index_referer(session.ticket());
        let timestamp = Self::timestamp();

        let fetched = self
            .network
            .fetch(
                "online users",
                Redirects::Follow,
                self.network.default_policy(),
                |client| {
                    with_cookies(client.get(&url), session.cookies())
                        .query(&[("timestamp", timestamp.as_str())])
                        .header(header::REFERER, referer.as_str())
                },
            )
            .await?;

        let value: Value = fetched.json()?;
        let count = value
            .get("data")
            .and_then(|data| data.get("onlineUsers"))
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(0);

        Ok(count)
    }
}

fn with_cookies(builder: RequestBuilder, cookies: &CookieJar) -> RequestBuilder {
    if cookies.is_empty() {
        builder
    } else {
        builder.header(header::COOKIE, cookies.header_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionParts;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn client_for(server: &MockServer) -> PortalClient {
        let mut settings = Settings::default();
        settings.portal.sso_base = server.uri();
        settings.portal.xk_base = server.uri();
        PortalClient::new(&settings).unwrap()
    }

    fn session() -> Session {
        Session::try_from(SessionParts {
            cookies: [("JSESSIONID", "abc")].into_iter().collect(),
            token: "bearer-1".to_string(),
            ticket: "ST-1".to_string(),
            prefix: "202420252".to_string(),
            display_name: "张三".to_string(),
            student_code: "2201111111".to_string(),
            batch_code: "e3a1".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_seed_cookies() {
        let jar = seed_cookies();
        assert_eq!(jar.len(), 3);
        assert_eq!(jar.get("state"), Some("xjdCas"));
    }

    #[tokio::test]
    async fn test_login_reads_message_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .and(header("Cookie", seed_cookies().header_value().as_str()))
            .and(body_string_contains("\"jcaptchaCode\":\"\""))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Set-Cookie", "SESSION=s1; Path=/")
                    .set_body_json(serde_json::json!({
                        "code": 0,
                        "message": "成功",
                        "data": {"tokenKey": "user-token"}
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .login("2201111111", "encrypted", &seed_cookies())
            .await
            .unwrap();

        assert_eq!(reply.message, "成功");
        assert_eq!(reply.user_token.as_deref(), Some("user-token"));
        assert_eq!(reply.cookies.get("SESSION"), Some("s1"));
    }

    #[tokio::test]
    async fn test_submit_sends_volunteer_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/xsxkapp/sys/xsxkapp/elective/volunteer.do"))
            .and(header("token", "bearer-1"))
            .and(body_string_contains("addParam="))
            .and(body_string_contains("202420252PHED10265003"))
            .and(body_string_contains("TYKC"))
            .and(|request: &Request| {
                request
                    .headers
                    .get("user-agent")
                    .and_then(|value| value.to_str().ok())
                    == Some(LEGACY_DESKTOP_UA)
            })
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"msg": "课程已满"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let target = ReservationTarget::new("PHED10265003", Category::Physical);
        let msg = client_for(&server).submit(&session(), &target).await.unwrap();

        assert_eq!(msg, "课程已满");
    }

    #[tokio::test]
    async fn test_online_users() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/xsxkapp/sys/xsxkapp/publicinfo/onlineUsers.do"))
            .and(header(
                "Referer",
                format!("{}/xsxkapp/sys/xsxkapp/*default/index.do?ticket=ST-1", server.uri())
                    .as_str(),
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": {"onlineUsers": 1234}})),
            )
            .mount(&server)
            .await;

        let count = client_for(&server).online_users(&session()).await.unwrap();
        assert_eq!(count, 1234);
    }

    #[tokio::test]
    async fn test_register_tolerates_missing_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/xsxkapp/sys/xsxkapp/student/register.do"))
            .and(query_param("number", "2201111111"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {}})),
            )
            .mount(&server)
            .await;

        let registration = client_for(&server)
            .register("2201111111", "ST-1", &CookieJar::new())
            .await
            .unwrap();

        assert!(registration.token.is_empty());
        assert!(registration.display_name.is_empty());
    }
}
