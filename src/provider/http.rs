use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use crate::{
    error::ConfigError,
    provider::{DeliveryClient, DeliveryError, ProviderResponse, SendRequest},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Production [`DeliveryClient`]: posts the send request as JSON to the
/// provider's transactional endpoint, authenticated with a bearer token.
pub struct HttpDeliveryClient {
    endpoint: Url,
    api_key: String,
    client: reqwest::Client,
}

impl HttpDeliveryClient {
    /// Build the client once at startup.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an unparseable endpoint URL or an HTTP
    /// client that cannot be constructed.
    pub fn new(endpoint: &str, api_key: &str) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(endpoint).map_err(|err| ConfigError::Invalid {
            field: "SENDGRID_API_URL",
            reason: err.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ConfigError::Invalid {
                field: "SENDGRID_API_URL",
                reason: err.to_string(),
            })?;

        Ok(Self {
            endpoint,
            api_key: api_key.to_string(),
            client,
        })
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn send(&self, request: &SendRequest) -> Result<ProviderResponse, DeliveryError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&wire::MailSend::from(request))
            .send()
            .await
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;

        tracing::debug!("Provider response: status={status}");

        Ok(ProviderResponse { status, body })
    }
}

/// Serialized shape of the provider's v3 mail-send payload.
mod wire {
    use serde::Serialize;

    use crate::provider::SendRequest;

    #[derive(Serialize)]
    pub(super) struct MailSend<'a> {
        personalizations: Vec<Personalization<'a>>,
        from: Email<'a>,
        subject: &'a str,
        content: Vec<Content<'a>>,
    }

    #[derive(Serialize)]
    struct Personalization<'a> {
        to: Vec<Email<'a>>,
    }

    #[derive(Serialize)]
    struct Email<'a> {
        email: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<&'a str>,
    }

    #[derive(Serialize)]
    struct Content<'a> {
        r#type: &'a str,
        value: &'a str,
    }

    impl<'a> From<&'a SendRequest> for MailSend<'a> {
        fn from(request: &'a SendRequest) -> Self {
            Self {
                personalizations: vec![Personalization {
                    to: request
                        .to
                        .iter()
                        .map(|to| Email {
                            email: &to.address,
                            name: to.name.as_deref(),
                        })
                        .collect(),
                }],
                from: Email {
                    email: &request.from.address,
                    name: request.from.name.as_deref(),
                },
                subject: &request.subject,
                content: request
                    .content
                    .iter()
                    .map(|content| Content {
                        r#type: &content.mime_type,
                        value: &content.body,
                    })
                    .collect(),
            }
        }
    }
}
