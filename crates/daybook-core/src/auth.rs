//! Identity providers: turn credentials into a session and a session token
//! back into the signed-in user.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::config::{self, AuthConfig, DaybookConfig};
use crate::error::{DaybookError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    /// `None` when the provider doesn't report an expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }
}

fn invalid_credentials() -> DaybookError {
    DaybookError::Unauthorized("invalid email or password".into())
}

fn no_session() -> DaybookError {
    DaybookError::Unauthorized("session expired or not signed in".into())
}

/// Single configured user with sessions kept in process memory.
pub struct LocalIdentity {
    config: AuthConfig,
    sessions: Mutex<HashMap<String, Session>>,
}

impl LocalIdentity {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Session>>> {
        self.sessions
            .lock()
            .map_err(|e| DaybookError::Storage(format!("failed to acquire session lock: {e}")))
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        if !email.trim().eq_ignore_ascii_case(&self.config.local_email) {
            return Err(invalid_credentials());
        }
        if let Some(ref expected) = self.config.local_password {
            if expected != password {
                return Err(invalid_credentials());
            }
        }

        let now = Utc::now();
        let hours = i64::try_from(self.config.session_hours).unwrap_or(i64::MAX / 3600);
        let session = Session {
            user_id: self.config.local_user_id.clone(),
            email: self.config.local_email.clone(),
            access_token: Uuid::new_v4().simple().to_string(),
            expires_at: Some(now + Duration::hours(hours)),
        };

        let mut sessions = self.lock()?;
        sessions.retain(|_, s| !s.is_expired(now));
        sessions.insert(session.access_token.clone(), session.clone());
        Ok(session)
    }

    pub fn current_session(&self, token: &str) -> Result<Session> {
        let now = Utc::now();
        let mut sessions = self.lock()?;
        match sessions.get(token) {
            Some(s) if !s.is_expired(now) => Ok(s.clone()),
            Some(_) => {
                sessions.remove(token);
                Err(no_session())
            }
            None => Err(no_session()),
        }
    }

    pub fn sign_out(&self, token: &str) -> Result<()> {
        self.lock()?.remove(token);
        Ok(())
    }
}

/// Hosted identity service (`/auth/v1/...`).
pub struct RemoteIdentity {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct RemoteUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    user: RemoteUser,
}

impl RemoteIdentity {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| DaybookError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
        })
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::debug!(%status, body = %body, "{what} rejected");
                Err(DaybookError::Unauthorized(format!("{what} rejected")))
            }
            _ => Err(DaybookError::Storage(format!(
                "identity {what} returned {status}: {body}"
            ))),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email.trim(), "password": password }))
            .send()
            .await?;
        let resp = Self::check(resp, "sign-in").await.map_err(|e| match e {
            DaybookError::Unauthorized(_) => invalid_credentials(),
            other => other,
        })?;
        let token: TokenResponse = resp.json().await?;
        Ok(Session {
            user_id: token.user.id,
            email: token.user.email.unwrap_or_else(|| email.trim().to_string()),
            access_token: token.access_token,
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        })
    }

    pub async fn current_session(&self, token: &str) -> Result<Session> {
        let resp = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await?;
        let resp = Self::check(resp, "session lookup")
            .await
            .map_err(|e| match e {
                DaybookError::Unauthorized(_) => no_session(),
                other => other,
            })?;
        let user: RemoteUser = resp.json().await?;
        Ok(Session {
            user_id: user.id,
            email: user.email.unwrap_or_default(),
            access_token: token.to_string(),
            expires_at: None,
        })
    }

    pub async fn sign_out(&self, token: &str) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await?;
        Self::check(resp, "sign-out").await?;
        Ok(())
    }
}

pub enum Identity {
    Local(LocalIdentity),
    Remote(RemoteIdentity),
}

impl Identity {
    pub fn from_config(config: &DaybookConfig) -> Result<Self> {
        match config.auth.provider.as_str() {
            "local" => Ok(Self::Local(LocalIdentity::new(config.auth.clone()))),
            "remote" => {
                let (url, key) = config::resolve_remote(&config.remote)?;
                Ok(Self::Remote(RemoteIdentity::new(&url, &key)?))
            }
            other => Err(DaybookError::Config(format!(
                "unknown auth provider: {other}"
            ))),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let result = match self {
            Self::Local(p) => p.sign_in(email, password),
            Self::Remote(p) => p.sign_in(email, password).await,
        };
        match &result {
            Ok(s) => tracing::info!(user_id = %s.user_id, "signed in"),
            Err(e) => tracing::warn!(error = %e, "sign-in failed"),
        }
        result
    }

    pub async fn current_session(&self, token: &str) -> Result<Session> {
        match self {
            Self::Local(p) => p.current_session(token),
            Self::Remote(p) => p.current_session(token).await,
        }
    }

    pub async fn sign_out(&self, token: &str) -> Result<()> {
        match self {
            Self::Local(p) => p.sign_out(token),
            Self::Remote(p) => p.sign_out(token).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(password: Option<&str>) -> LocalIdentity {
        LocalIdentity::new(AuthConfig {
            local_password: password.map(String::from),
            ..Default::default()
        })
    }

    #[test]
    fn local_sign_in_issues_resolvable_token() {
        let id = local(Some("hunter2"));
        let session = id.sign_in("ME@localhost", "hunter2").unwrap();
        assert_eq!(session.user_id, "local-user");
        assert!(session.expires_at.is_some());

        let again = id.current_session(&session.access_token).unwrap();
        assert_eq!(again, session);
    }

    #[test]
    fn local_rejects_wrong_credentials() {
        let id = local(Some("hunter2"));
        assert!(matches!(
            id.sign_in("me@localhost", "nope"),
            Err(DaybookError::Unauthorized(_))
        ));
        assert!(matches!(
            id.sign_in("other@localhost", "hunter2"),
            Err(DaybookError::Unauthorized(_))
        ));
    }

    #[test]
    fn local_without_password_accepts_any() {
        let id = local(None);
        assert!(id.sign_in("me@localhost", "").is_ok());
    }

    #[test]
    fn sign_out_invalidates_token() {
        let id = local(None);
        let session = id.sign_in("me@localhost", "x").unwrap();
        id.sign_out(&session.access_token).unwrap();
        assert!(id.current_session(&session.access_token).is_err());
    }

    #[test]
    fn expired_session_is_rejected() {
        let id = local(None);
        let session = id.sign_in("me@localhost", "x").unwrap();
        id.lock()
            .unwrap()
            .get_mut(&session.access_token)
            .unwrap()
            .expires_at = Some(Utc::now() - Duration::minutes(1));
        assert!(matches!(
            id.current_session(&session.access_token),
            Err(DaybookError::Unauthorized(_))
        ));
    }

    #[test]
    fn from_config_remote_without_url_fails() {
        let mut config = DaybookConfig::default_config();
        config.auth.provider = "remote".into();
        assert!(matches!(
            Identity::from_config(&config),
            Err(DaybookError::Config(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_remote_identity_is_upstream_error() {
        let id = RemoteIdentity::new("http://127.0.0.1:1", "key").unwrap();
        let err = id.current_session("token").await.unwrap_err();
        assert!(err.is_upstream());
    }
}
