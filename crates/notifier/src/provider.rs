//! Messaging provider capability and its implementations.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::NotifierError;

/// "Send `body` from `from` to `to`" capability of an outbound messaging API.
///
/// Returns the provider-assigned message id on success. Implementations must
/// be safe to call concurrently.
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send(&self, from: &str, to: &str, body: &str) -> Result<String, NotifierError>;
}

/// Twilio Programmable Messaging client.
///
/// SMS and WhatsApp share the same `Messages` endpoint; the channel is chosen
/// by the `whatsapp:` prefix on the addresses.
#[derive(Clone)]
pub struct TwilioProvider {
    client: reqwest::Client,
    messages_url: String,
    account_sid: String,
    auth_token: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: Option<String>,
    code: Option<i64>,
}

impl TwilioProvider {
    pub fn new(
        api_base: &str,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, NotifierError> {
        let account_sid = account_sid.into();
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            messages_url: format!(
                "{}/2010-04-01/Accounts/{}/Messages.json",
                api_base.trim_end_matches('/'),
                account_sid
            ),
            account_sid,
            auth_token: auth_token.into(),
        })
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }

    fn error_message(status: reqwest::StatusCode, body: &str) -> String {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(ErrorResponse {
                message: Some(message),
                code: Some(code),
            }) => format!("{} (code {})", message, code),
            Ok(ErrorResponse {
                message: Some(message),
                ..
            }) => message,
            _ => status
                .canonical_reason()
                .unwrap_or("unexpected response")
                .to_string(),
        }
    }
}

#[async_trait]
impl MessagingProvider for TwilioProvider {
    async fn send(&self, from: &str, to: &str, body: &str) -> Result<String, NotifierError> {
        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", from), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(NotifierError::Provider {
                status: status.as_u16(),
                message: Self::error_message(status, &text),
            });
        }

        let message: MessageResponse = response.json().await?;
        Ok(message.sid)
    }
}

/// Stand-in used when no provider credentials are configured.
///
/// Every attempt fails, so broadcasts still produce a complete report.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledProvider;

#[async_trait]
impl MessagingProvider for DisabledProvider {
    async fn send(&self, _from: &str, _to: &str, _body: &str) -> Result<String, NotifierError> {
        Err(NotifierError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_url() {
        let provider = TwilioProvider::new(
            "https://api.twilio.com/",
            "AC123",
            "token",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            provider.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn test_error_message_with_code() {
        let body = r#"{"code": 21211, "message": "Invalid 'To' Phone Number", "status": 400}"#;
        assert_eq!(
            TwilioProvider::error_message(reqwest::StatusCode::BAD_REQUEST, body),
            "Invalid 'To' Phone Number (code 21211)"
        );
    }

    #[test]
    fn test_error_message_without_json_body() {
        assert_eq!(
            TwilioProvider::error_message(reqwest::StatusCode::SERVICE_UNAVAILABLE, "<html>"),
            "Service Unavailable"
        );
    }

    #[tokio::test]
    async fn test_disabled_provider_always_fails() {
        let result = DisabledProvider.send("+1", "+2", "hi").await;
        assert!(matches!(result, Err(NotifierError::NotConfigured)));
    }
}
