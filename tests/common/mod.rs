//! Common test utilities and helpers
//!
//! A wiremock stand-in for both the SSO and the course-selection service,
//! with one method per endpoint so each test can swap a single step.

#![allow(dead_code)]

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};
use xkfw_grabber::{
    PortalClient, SessionNegotiator, Settings,
    types::{Credentials, Session, SessionParts},
};

pub const USERNAME: &str = "2201111111";
pub const PASSWORD: &str = "Passw0rd!2024";
/// `PASSWORD` under the default login-form key
pub const ENCRYPTED_PASSWORD: &str = "wdE2K6XL/PGY1kfhQ/+PHg==";
pub const USER_TOKEN: &str = "user-token-1";
pub const TICKET: &str = "ABC123";
pub const BEARER: &str = "bearer-xyz";
pub const BATCH_CODE: &str = "e3a1";
pub const PREFIX: &str = "202420252";

pub const LOGIN_PATH: &str = "/openplatform/g/admin/login";
pub const REDIRECT_LOOKUP_PATH: &str = "/openplatform/oauth/auth/getRedirectUrl";
pub const ENTRY_PATH: &str = "/openplatform/oauth/entry";
pub const INDEX_PATH: &str = "/xsxkapp/sys/xsxkapp/*default/index.do";
pub const REGISTER_PATH: &str = "/xsxkapp/sys/xsxkapp/student/register.do";
pub const RECOMMENDED_PATH: &str = "/xsxkapp/sys/xsxkapp/elective/recommendedCourse.do";
pub const VOLUNTEER_PATH: &str = "/xsxkapp/sys/xsxkapp/elective/volunteer.do";
pub const ONLINE_PATH: &str = "/xsxkapp/sys/xsxkapp/publicinfo/onlineUsers.do";

/// Test helper functions
pub struct TestUtils;

impl TestUtils {
    /// Initialize test logger
    pub fn init_logger() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    }

    pub fn credentials() -> Credentials {
        Credentials::new(USERNAME, PASSWORD)
    }

    /// A complete session with the given bearer token
    pub fn session(token: &str) -> Session {
        Session::try_from(SessionParts {
            cookies: [("JSESSIONID", "xk")].into_iter().collect(),
            token: token.to_string(),
            ticket: TICKET.to_string(),
            prefix: PREFIX.to_string(),
            display_name: "张三".to_string(),
            student_code: USERNAME.to_string(),
            batch_code: BATCH_CODE.to_string(),
        })
        .unwrap()
    }
}

/// Mock portal on a random local port
pub struct PortalFixture {
    pub server: MockServer,
}

impl PortalFixture {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Settings pointing at the mock with short per-attempt timeouts
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.portal.sso_base = self.uri();
        settings.portal.xk_base = self.uri();
        settings.auth.login_timeout = Duration::from_millis(300);
        settings.auth.hop_timeout = Duration::from_millis(300);
        settings.network.request_timeout = 5;
        settings
    }

    pub fn negotiator(&self) -> SessionNegotiator {
        let settings = self.settings();
        SessionNegotiator::new(PortalClient::new(&settings).unwrap(), settings.auth.clone())
    }

    /// Number of requests the mock saw for `path`
    pub async fn hits(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == request_path)
            .count()
    }

    pub fn login_reply(message: &str, token_key: Option<&str>) -> ResponseTemplate {
        let data = match token_key {
            Some(token) => json!({ "tokenKey": token }),
            None => json!({}),
        };
        ResponseTemplate::new(200)
            .insert_header("Set-Cookie", "SESSION=sso-session; Path=/")
            .set_body_json(json!({ "code": 0, "message": message, "data": data }))
    }

    /// Login that only answers the expected encrypted credentials
    pub async fn mount_login(&self, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .and(body_partial_json(json!({
                "loginType": 1,
                "username": USERNAME,
                "pwd": ENCRYPTED_PASSWORD,
                "jcaptchaCode": "",
            })))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_redirect_lookup(&self, data: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(REDIRECT_LOOKUP_PATH))
            .and(query_param("userType", "1"))
            .and(query_param("personNo", USERNAME))
            .and(|request: &Request| {
                let cookie = request
                    .headers
                    .get("cookie")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default();
                cookie.contains(&format!("open_Platform_User={}", USER_TOKEN))
                    && cookie.contains("memberId=860000")
            })
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": data })))
            .mount(&self.server)
            .await;
    }

    /// Entry point that relocates to `location` with first-hop cookies
    pub async fn mount_entry(&self, location: Option<String>) {
        let mut template = ResponseTemplate::new(302)
            .append_header("Set-Cookie", "route=first-hop; Path=/")
            .append_header("Set-Cookie", "SERVERID=first; Path=/");
        if let Some(location) = location {
            template = template.insert_header("Location", location.as_str());
        }
        Mock::given(method("GET"))
            .and(path(ENTRY_PATH))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    /// Service landing page that overrides one first-hop cookie
    pub async fn mount_index(&self) {
        Mock::given(method("GET"))
            .and(path(INDEX_PATH))
            .and(query_param("ticket", TICKET))
            .respond_with(
                ResponseTemplate::new(200)
                    .append_header("Set-Cookie", "SERVERID=second; Path=/")
                    .append_header("Set-Cookie", "JSESSIONID=xk; Path=/"),
            )
            .mount(&self.server)
            .await;
    }

    pub async fn mount_register(&self, token: &str) {
        Mock::given(method("GET"))
            .and(path(REGISTER_PATH))
            .and(query_param("number", USERNAME))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "1",
                "data": { "name": "张三", "token": token, "number": USERNAME }
            })))
            .mount(&self.server)
            .await;
    }

    pub fn batch_info_body(can_select: &str) -> serde_json::Value {
        json!({
            "code": "1",
            "msg": "查询学生信息成功",
            "data": {
                "name": "张三",
                "code": USERNAME,
                "electiveBatchList": [
                    {
                        "code": "old",
                        "name": "2024-2025-1本科生选课",
                        "canSelect": "0",
                        "displayTJKC": "1"
                    },
                    {
                        "code": BATCH_CODE,
                        "name": "2024-2025-2本科生选课",
                        "canSelect": can_select,
                        "displayTJKC": "1",
                        "displayXGXK": "1",
                        "displayTYKC": "0",
                        "displayFANKC": "1"
                    }
                ]
            }
        })
    }

    pub async fn mount_batch_info(&self, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/xsxkapp/sys/xsxkapp/student/{}.do", USERNAME)))
            .and(wiremock::matchers::header("token", BEARER))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub fn recommended_body() -> serde_json::Value {
        json!({
            "code": "1",
            "msg": "查询成功",
            "dataList": [{
                "courseNumber": "COMP300727",
                "courseName": "计算机网络",
                "tcList": [{ "teachingClassID": format!("{}COMP30072701", PREFIX) }]
            }]
        })
    }

    pub async fn mount_recommended(&self, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path(RECOMMENDED_PATH))
            .and(wiremock::matchers::body_string_contains("querySetting="))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Every step after the credential submission, all succeeding
    pub async fn mount_after_login(&self) {
        self.mount_redirect_lookup(json!(format!("{}{}", self.uri(), ENTRY_PATH)))
            .await;
        self.mount_entry(Some(format!("{}{}?ticket={}", self.uri(), INDEX_PATH, TICKET)))
            .await;
        self.mount_index().await;
        self.mount_register(BEARER).await;
        self.mount_batch_info(Self::batch_info_body("1")).await;
        self.mount_recommended(Self::recommended_body()).await;
    }

    /// The whole handshake, succeeding
    pub async fn mount_happy_path(&self) {
        self.mount_login(Self::login_reply("成功", Some(USER_TOKEN)))
            .await;
        self.mount_after_login().await;
    }
}
