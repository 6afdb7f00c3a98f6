//! HTTP client for the alert backend

use super::SosBackend;
use crate::config::BackendConfig;
use crate::error::{SosError, SubmitError};
use crate::history::{AlertHistory, HistoryResponse};
use crate::schema::{
    ApiReply, AppUser, SosPayload, TestEmailRequest, UsersResponse, AUDIO_FIELD, AUDIO_FILE_NAME,
    AUDIO_MIME,
};
use crate::types::{SosRequest, SosResult};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Backend client over `reqwest`
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self, SosError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("guardian-sos/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SosError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// `GET /users`: the app user directory used by the contact picker
    pub async fn fetch_users(&self) -> Result<Vec<AppUser>, SubmitError> {
        let response = self.client.get(self.config.endpoint("users")).send().await?;
        let reply: UsersResponse = read_reply(response).await?;
        if !reply.success {
            return Err(SubmitError::rejected(
                None,
                reply.message.unwrap_or_else(|| "Failed to get users".to_string()),
            ));
        }
        Ok(reply.users)
    }

    /// `GET /alerts/history?user_id=`: alerts addressed to this user
    pub async fn alert_history(&self, user_id: u64) -> Result<AlertHistory, SubmitError> {
        let response = self
            .client
            .get(self.config.endpoint("alerts/history"))
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        let reply: HistoryResponse = read_reply(response).await?;
        reply.into_history()
    }

    /// `POST /alerts/resolve`
    pub async fn resolve_alert(&self, alert_id: u64) -> Result<(), SubmitError> {
        let body = serde_json::json!({ "alert_id": alert_id });
        let reply: ApiReply = self.post_json("alerts/resolve", &body).await?;
        expect_success(reply, "Failed to resolve alert")
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, SubmitError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.config.endpoint(path))
            .json(body)
            .send()
            .await?;
        read_reply(response).await
    }

    fn multipart_form(&self, payload: &SosPayload, audio: Vec<u8>) -> Result<Form, SubmitError> {
        let fields = payload
            .form_fields()
            .map_err(|e| SubmitError::Unexpected(e.to_string()))?;

        let mut form = Form::new();
        for (name, value) in fields {
            form = form.text(name, value);
        }
        let audio = Part::bytes(audio)
            .file_name(AUDIO_FILE_NAME)
            .mime_str(AUDIO_MIME)
            .map_err(|e| SubmitError::Unexpected(e.to_string()))?;
        Ok(form.part(AUDIO_FIELD, audio))
    }
}

#[async_trait]
impl SosBackend for HttpBackend {
    async fn submit(&self, request: &SosRequest) -> Result<SosResult, SubmitError> {
        let payload = SosPayload::from(request);
        let url = self.config.endpoint("sos");

        // An unreadable recording never blocks the alert itself
        let audio = match request.audio() {
            Some(recording) => match tokio::fs::read(recording.path()).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!(
                        uri = %recording.uri,
                        error = %e,
                        "recording unreadable, sending SOS without audio"
                    );
                    None
                }
            },
            None => None,
        };

        let response = match audio {
            Some(bytes) => {
                tracing::debug!("sending SOS as multipart with audio");
                let form = self.multipart_form(&payload, bytes)?;
                self.client.post(&url).multipart(form).send().await?
            }
            None => {
                tracing::debug!("sending SOS as JSON");
                self.client.post(&url).json(&payload).send().await?
            }
        };

        read_reply(response).await
    }

    async fn send_test_email(&self, request: &TestEmailRequest) -> Result<(), SubmitError> {
        let reply: ApiReply = self.post_json("test-email", request).await?;
        expect_success(reply, "Failed to send test email")
    }
}

/// Decode a 2xx body, or turn anything else into a server rejection
async fn read_reply<T: DeserializeOwned>(response: Response) -> Result<T, SubmitError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(rejection(status, &body));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| SubmitError::Unexpected(format!("invalid response body: {}", e)))
}

fn rejection(status: StatusCode, body: &str) -> SubmitError {
    let message = message_from_body(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    });
    SubmitError::rejected(Some(status.as_u16()), message)
}

/// The backend reports failures as `{"success": false, "message": "..."}`
fn message_from_body(body: &str) -> Option<String> {
    serde_json::from_str::<ApiReply>(body)
        .ok()
        .and_then(|reply| reply.message)
        .filter(|m| !m.trim().is_empty())
}

fn expect_success(reply: ApiReply, fallback: &str) -> Result<(), SubmitError> {
    if reply.success {
        Ok(())
    } else {
        Err(SubmitError::rejected(
            None,
            reply.message.unwrap_or_else(|| fallback.to_string()),
        ))
    }
}
