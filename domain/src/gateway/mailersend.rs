use super::{Email, Mailer};
use crate::error::{DomainErrorKind, Error, ExternalErrorKind, InternalErrorKind};
use async_trait::async_trait;
use email_address::EmailAddress;
use log::*;
use serde::Serialize;
use service::config::Config;

/// MailerSend API client for sending the daily summary emails
pub struct MailerSendClient {
    client: reqwest::Client,
    base_url: String,
    from: EmailSender,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailRecipient {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailSender {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Request payload for sending an email via MailerSend
#[derive(Debug, Serialize)]
pub struct SendEmailRequest {
    pub from: EmailSender,
    pub to: Vec<EmailRecipient>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl MailerSendClient {
    /// Builds the client from config. Fails with a config error without an API key.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let client = build_client(config)?;
        Ok(Self {
            client,
            base_url: config.mailersend_base_url().trim_end_matches('/').to_string(),
            from: EmailSender {
                email: config.summary_from_email().to_string(),
                name: Some("ReplyFlow".to_string()),
            },
        })
    }

    pub async fn send_email(&self, request: &SendEmailRequest) -> Result<(), Error> {
        if !is_valid_email(&request.from.email) {
            warn!("Invalid sender email: {}", request.from.email);
            return Err(Error::validation("invalid sender email address"));
        }
        for recipient in &request.to {
            if !is_valid_email(&recipient.email) {
                warn!("Invalid recipient email: {}", recipient.email);
                return Err(Error::validation(format!(
                    "invalid recipient email address: {}",
                    recipient.email
                )));
            }
        }

        let url = format!("{}/email", self.base_url);
        debug!("Email subject: {}", request.subject);

        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if status.is_success() {
            let message_id = response
                .headers()
                .get("x-message-id")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            info!("Email sent, message_id: {message_id:?}");
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Failed to send email: {status} - {error_text}");
            Err(Error {
                source: Some(format!("{status}: {error_text}").into()),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
            })
        }
    }
}

#[async_trait]
impl Mailer for MailerSendClient {
    async fn send(&self, email: &Email) -> Result<(), Error> {
        let request = SendEmailRequest {
            from: self.from.clone(),
            to: vec![EmailRecipient {
                email: email.to.clone(),
                name: None,
            }],
            subject: email.subject.clone(),
            text: email.text.clone(),
            html: email.html.clone(),
        };
        self.send_email(&request).await
    }
}

fn build_client(config: &Config) -> Result<reqwest::Client, Error> {
    let headers = build_auth_headers(config)?;

    Ok(reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(config.external_request_timeout())
        .default_headers(headers)
        .build()?)
}

fn build_auth_headers(config: &Config) -> Result<reqwest::header::HeaderMap, Error> {
    let api_key = config.mailersend_api_key().ok_or_else(|| {
        warn!("Failed to get MailerSend API key from config");
        Error::config("MAILERSEND_API_KEY is not set")
    })?;

    let mut headers = reqwest::header::HeaderMap::new();
    let mut auth_header = reqwest::header::HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|err| {
            warn!("Failed to create authorization header value: {err:?}");
            Error::internal(InternalErrorKind::Config).with_source(err)
        })?;
    auth_header.set_sensitive(true);
    headers.insert(reqwest::header::AUTHORIZATION, auth_header);

    Ok(headers)
}

pub fn is_valid_email(email: &str) -> bool {
    EmailAddress::is_valid(email)
}
