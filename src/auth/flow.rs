//! The platform's onboarding "login" task flow.
//!
//! A login is a guest-token activation followed by a sequence of subtasks the
//! server hands out one at a time; each answer is posted back together with
//! the current flow token until the server reports success.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::debug;

use crate::app::{NotifierError, Result};
use crate::config::PlatformConfig;
use crate::domain::session::CSRF_TOKEN_COOKIE;
use crate::domain::Credentials;
use crate::fetcher::{FetchRequest, FetchResponse, Fetcher, RequestHeaders};

/// Guard against a server that keeps handing out subtasks.
const MAX_FLOW_STEPS: usize = 16;

/// Cookies collected from `Set-Cookie` headers during a login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar(BTreeMap<String, String>);

impl CookieJar {
    pub fn absorb(&mut self, response: &FetchResponse) {
        for (name, value) in response.set_cookies() {
            if value.is_empty() {
                self.0.remove(name);
            } else {
                self.0.insert(name.to_string(), value.to_string());
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn header(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }
        Some(
            self.0
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[derive(Debug, Deserialize)]
struct GuestToken {
    guest_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct FlowResponse {
    flow_token: Option<String>,
    status: Option<String>,
    #[serde(default)]
    subtasks: Vec<Subtask>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Subtask {
    subtask_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<i64>,
    message: String,
}

/// What to do with the subtask the server just handed out.
#[derive(Debug, PartialEq)]
pub(crate) enum Step {
    Respond(Value),
    Done,
}

pub(crate) fn respond_to(subtask_id: &str, credentials: &Credentials) -> Result<Step> {
    let input = match subtask_id {
        "LoginSuccessSubtask" => return Ok(Step::Done),
        "DenyLoginSubtask" => {
            return Err(NotifierError::Auth("login was denied by the platform".into()))
        }
        "LoginJsInstrumentationSubtask" => json!({
            "subtask_id": subtask_id,
            "js_instrumentation": { "response": "{}", "link": "next_link" },
        }),
        "LoginEnterUserIdentifierSSO" => json!({
            "subtask_id": subtask_id,
            "settings_list": {
                "setting_responses": [{
                    "key": "user_identifier",
                    "response_data": { "text_data": { "result": credentials.identifier } },
                }],
                "link": "next_link",
            },
        }),
        "LoginEnterAlternateIdentifierSubtask" => json!({
            "subtask_id": subtask_id,
            "enter_text": {
                "text": credentials.email.as_deref().unwrap_or(&credentials.identifier),
                "link": "next_link",
            },
        }),
        "LoginEnterPassword" => json!({
            "subtask_id": subtask_id,
            "enter_password": { "password": credentials.secret, "link": "next_link" },
        }),
        "AccountDuplicationCheck" => json!({
            "subtask_id": subtask_id,
            "check_logged_in_account": { "link": "AccountDuplicationCheck_false" },
        }),
        "LoginTwoFactorAuthChallenge" => {
            let secret = credentials.otp_secret.as_deref().ok_or_else(|| {
                NotifierError::Auth("two-factor challenge requested but no OTP secret configured".into())
            })?;
            json!({
                "subtask_id": subtask_id,
                "enter_text": { "text": current_otp(secret)?, "link": "next_link" },
            })
        }
        "LoginAcid" => {
            let email = credentials.email.as_deref().ok_or_else(|| {
                NotifierError::Auth("email confirmation requested but no email configured".into())
            })?;
            json!({
                "subtask_id": subtask_id,
                "enter_text": { "text": email, "link": "next_link" },
            })
        }
        other => {
            return Err(NotifierError::Auth(format!(
                "unsupported login subtask: {}",
                other
            )))
        }
    };
    Ok(Step::Respond(input))
}

fn otp_generator(secret: &str) -> Result<TOTP> {
    let normalized: String = secret
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    let bytes = Secret::Encoded(normalized)
        .to_bytes()
        .map_err(|e| NotifierError::Auth(format!("invalid OTP secret: {:?}", e)))?;
    Ok(TOTP::new_unchecked(Algorithm::SHA1, 6, 1, 30, bytes))
}

fn current_otp(secret: &str) -> Result<String> {
    otp_generator(secret)?
        .generate_current()
        .map_err(|e| NotifierError::Auth(format!("system clock error: {}", e)))
}

/// One login attempt. Consumed by [`login`](Self::login).
pub struct LoginFlow<'a> {
    fetcher: &'a dyn Fetcher,
    platform: &'a PlatformConfig,
    cookies: CookieJar,
    guest_token: Option<String>,
}

impl<'a> LoginFlow<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, platform: &'a PlatformConfig) -> Self {
        Self {
            fetcher,
            platform,
            cookies: CookieJar::default(),
            guest_token: None,
        }
    }

    /// Run the flow to completion and return the cookies it produced.
    pub async fn login(mut self, credentials: &Credentials) -> Result<CookieJar> {
        self.activate_guest().await?;

        let mut response = self
            .task(
                Some("login"),
                json!({
                    "flow_name": "login",
                    "input_flow_data": {
                        "flow_context": {
                            "debug_overrides": {},
                            "start_location": { "location": "splash_screen" },
                        },
                    },
                }),
            )
            .await?;

        for _ in 0..MAX_FLOW_STEPS {
            let Some(subtask) = response.subtasks.first() else {
                if response.status.as_deref() == Some("success") {
                    return Ok(self.cookies);
                }
                return Err(NotifierError::Auth(
                    "login flow ended without a result".into(),
                ));
            };
            debug!(subtask = %subtask.subtask_id, "Login subtask");

            let input = match respond_to(&subtask.subtask_id, credentials)? {
                Step::Done => return Ok(self.cookies),
                Step::Respond(input) => input,
            };
            let flow_token = response.flow_token.take().ok_or_else(|| {
                NotifierError::Auth("login flow returned no flow token".into())
            })?;

            response = self
                .task(
                    None,
                    json!({ "flow_token": flow_token, "subtask_inputs": [input] }),
                )
                .await?;
        }

        Err(NotifierError::Auth(format!(
            "login flow did not finish within {} steps",
            MAX_FLOW_STEPS
        )))
    }

    fn headers(&self) -> RequestHeaders {
        let mut headers = RequestHeaders::from([
            ("authorization", self.platform.authorization()),
            ("content-type", "application/json".to_string()),
            ("x-twitter-active-user", "yes".to_string()),
            ("x-twitter-client-language", "en".to_string()),
        ]);
        if let Some(ref token) = self.guest_token {
            headers.insert("x-guest-token", token.clone());
        }
        if let Some(cookie) = self.cookies.header() {
            headers.insert("cookie", cookie);
        }
        if let Some(csrf) = self.cookies.get(CSRF_TOKEN_COOKIE) {
            headers.insert("x-csrf-token", csrf);
        }
        headers
    }

    async fn send(&mut self, request: FetchRequest) -> Result<FetchResponse> {
        let request = request.headers(self.headers());
        let response = self.fetcher.request(request).await?;
        self.cookies.absorb(&response);
        Ok(response)
    }

    async fn activate_guest(&mut self) -> Result<()> {
        let url = self.platform.guest_activate_url();
        let response = self
            .send(FetchRequest::post(url))
            .await?
            .error_for_status()?;
        let token: GuestToken = response.json()?;
        debug!("Activated guest token");
        self.guest_token = Some(token.guest_token);
        Ok(())
    }

    async fn task(&mut self, flow_name: Option<&str>, body: Value) -> Result<FlowResponse> {
        let mut url = self.platform.onboarding_task_url();
        if let Some(name) = flow_name {
            url = format!("{}?flow_name={}", url, name);
        }

        let response = self.send(FetchRequest::post(url).json(&body)?).await?;
        if response.status == 503 {
            return Err(response.into_status_error());
        }

        let parsed: FlowResponse = serde_json::from_str(&response.body).unwrap_or_default();
        if let Some(error) = parsed.errors.first() {
            return Err(NotifierError::Auth(match error.code {
                Some(code) => format!("{} (code {})", error.message, code),
                None => error.message.clone(),
            }));
        }
        if !response.is_success() {
            return Err(response.into_status_error());
        }
        Ok(parsed)
    }
}
