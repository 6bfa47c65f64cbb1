//!
//! Authenticated request gateway
//! -----------------------------
//! Every API call goes through `ApiClient::send`. Authenticated calls carry
//! the stored bearer token; a 401 on the first attempt joins the shared
//! refresh and the call is re-issued exactly once with the new token.

use std::sync::Arc;

use futures_util::future::FutureExt;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use super::refresh::RefreshCoordinator;
use super::request::{ApiRequest, FormPart, RequestBody, CONTENT_TYPE_JSON};
use super::response::{read_payload, Payload};
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::session::{SessionStore, TokenPair};

/// Which attempt of a logical call is being made. Only the first attempt
/// may trigger a refresh, so a call never refreshes twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    AfterRefresh,
}

enum Outcome {
    Done(Payload),
    Unauthorized(ApiError),
}

#[derive(Clone)]
pub struct ApiClient {
    config: ClientConfig,
    http: reqwest::Client,
    session: Arc<SessionStore>,
    refresh: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(config: ClientConfig, session: Arc<SessionStore>) -> ApiResult<Self> {
        let mut builder = reqwest::Client::builder();
        // One timeout for login, refresh and ordinary calls alike.
        if let Some(t) = config.timeout {
            builder = builder.timeout(t);
        }
        let http = builder.build()?;
        Ok(Self { config, http, session, refresh: RefreshCoordinator::new() })
    }

    pub fn config(&self) -> &ClientConfig { &self.config }

    pub fn session(&self) -> &Arc<SessionStore> { &self.session }

    pub fn coordinator(&self) -> &RefreshCoordinator { &self.refresh }

    /// Perform a call, transparently repairing an expired access token.
    pub async fn send(&self, req: &ApiRequest) -> ApiResult<Payload> {
        let token = if req.auth { self.session.get_access_token().filter(|t| !t.is_empty()) } else { None };

        let unauthorized = match self.attempt(req, token.as_deref(), Attempt::First).await? {
            Outcome::Done(p) => return Ok(p),
            Outcome::Unauthorized(e) if !req.auth => return Err(e),
            Outcome::Unauthorized(e) => e,
        };
        debug!(target: "gateway", "{} {} unauthorized ({}); joining refresh", req.method, req.path, unauthorized);

        let pair = self.refresh_session().await?;

        match self.attempt(req, Some(&pair.access_token), Attempt::AfterRefresh).await? {
            Outcome::Done(p) => Ok(p),
            Outcome::Unauthorized(e) => {
                warn!(target: "gateway", "{} {} still unauthorized after refresh", req.method, req.path);
                Err(e)
            }
        }
    }

    async fn attempt(&self, req: &ApiRequest, bearer: Option<&str>, attempt: Attempt) -> ApiResult<Outcome> {
        let resp = self.build(req, bearer)?.send().await?;
        let status = resp.status();
        debug!(target: "gateway", "{} {} -> {} ({:?})", req.method, req.path, status.as_u16(), attempt);
        if status.is_success() {
            return Ok(Outcome::Done(read_payload(resp).await?));
        }
        let body = resp.text().await.unwrap_or_default();
        let err = ApiError::http(status.as_u16(), &body);
        if status == StatusCode::UNAUTHORIZED {
            return Ok(Outcome::Unauthorized(err));
        }
        Err(err)
    }

    fn build(&self, req: &ApiRequest, bearer: Option<&str>) -> ApiResult<reqwest::RequestBuilder> {
        let url = self.config.endpoint(&req.path)?;
        let mut headers = req.headers.clone();
        if !headers.contains_key(CONTENT_TYPE) {
            if let Some(ct) = req.default_content_type() {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
            }
        }
        if let Some(tok) = bearer {
            let v = HeaderValue::from_str(&format!("Bearer {}", tok))
                .map_err(|e| ApiError::config(format!("access token is not a valid header value: {}", e)))?;
            headers.insert(AUTHORIZATION, v);
        }
        let rb = self.http.request(req.method.clone(), url).headers(headers);
        Ok(match &req.body {
            RequestBody::Empty => rb,
            RequestBody::Json(v) => rb.body(serde_json::to_vec(v)?),
            RequestBody::Form(pairs) => rb.body(super::request::encode_pairs(pairs)),
            RequestBody::Multipart(parts) => rb.multipart(build_multipart(parts)?),
        })
    }

    /// Refresh the token pair through the coordinator. Concurrent callers
    /// share one network call. On success the store holds the new pair; on
    /// any failure the store is cleared and every waiter gets `SessionExpired`.
    pub async fn refresh_session(&self) -> ApiResult<TokenPair> {
        let http = self.http.clone();
        let config = self.config.clone();
        let session = self.session.clone();
        self.refresh
            .run(move || {
                async move {
                    match request_refresh(&http, &config, &session).await {
                        Ok(pair) => {
                            session.set_tokens(&pair)?;
                            info!(target: "refresh", "token pair refreshed user_id={:?} role={}", pair.user_id, pair.role);
                            Ok(pair)
                        }
                        Err(e) => {
                            warn!(target: "refresh", "refresh failed: {}; clearing session", e);
                            if let Err(ce) = session.clear() {
                                warn!(target: "refresh", "clearing session after failed refresh: {}", ce);
                            }
                            Err(ApiError::session_expired(e.message()))
                        }
                    }
                }
                .boxed()
            })
            .await
    }

    /// `POST /auth/login` with a url-encoded form; stores the returned pair.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<TokenPair> {
        let req = ApiRequest::post("/auth/login").form([("username", username), ("password", password)]);
        let pair: TokenPair = self.send(&req).await?.into_json()?;
        self.session.set_tokens(&pair)?;
        info!(target: "gateway", "logged in user={} role={} org={:?}", username, pair.role, pair.org_id);
        Ok(pair)
    }

    pub fn logout(&self) -> ApiResult<()> {
        info!(target: "gateway", "logging out");
        self.session.clear()
    }
}

/// The refresh operation. Never retried and never itself refreshed.
async fn request_refresh(http: &reqwest::Client, config: &ClientConfig, session: &SessionStore) -> ApiResult<TokenPair> {
    let Some(refresh_token) = session.get_refresh_token().filter(|t| !t.is_empty()) else {
        return Err(ApiError::NoRefreshToken);
    };
    let url = config.endpoint("/auth/refresh")?;
    let body = serde_json::to_vec(&serde_json::json!({ "refresh_token": refresh_token }))?;
    let resp = http
        .post(url)
        .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
        .body(body)
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(ApiError::http(status.as_u16(), &text));
    }
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn build_multipart(parts: &[FormPart]) -> ApiResult<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();
    for p in parts {
        form = match p {
            FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
            FormPart::File { name, file_name, bytes, mime } => {
                let mut part = reqwest::multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
                if let Some(m) = mime {
                    part = part.mime_str(m)?;
                }
                form.part(name.clone(), part)
            }
        };
    }
    Ok(form)
}
