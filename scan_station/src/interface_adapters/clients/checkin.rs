use crate::domain::{AuthToken, CheckInError, CheckInService, ValidationReply};
use crate::interface_adapters::protocol::{ErrorResponse, ValidateRequest, ValidateResponse};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

const VALIDATE_PATH: &str = "/api/attendees/validate";

// Thin reqwest client for the check-in service's validate endpoint.
#[derive(Clone)]
pub struct CheckInClient {
    http: reqwest::Client,
    base_url: String,
}

impl CheckInClient {
    /// `timeout` bounds the whole request; it is the only timeout applied to a validation.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn validate_url(&self) -> String {
        format!("{}{VALIDATE_PATH}", self.base_url)
    }
}

fn transport_error(err: reqwest::Error) -> CheckInError {
    if err.is_timeout() {
        CheckInError::Timeout
    } else {
        CheckInError::Transport(err.to_string())
    }
}

#[async_trait]
impl CheckInService for CheckInClient {
    async fn validate(
        &self,
        qr_code_data: &str,
        token: &AuthToken,
    ) -> Result<ValidationReply, CheckInError> {
        let response = self
            .http
            .post(self.validate_url())
            .bearer_auth(token.expose())
            .json(&ValidateRequest { qr_code_data })
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();

        if status.is_success() {
            return response
                .json::<ValidateResponse>()
                .await
                .map(ValidationReply::from)
                .map_err(|err| {
                    if err.is_timeout() {
                        CheckInError::Timeout
                    } else {
                        CheckInError::Decode(err.to_string())
                    }
                });
        }

        if status == StatusCode::CONFLICT {
            // 409 with the attendee record means the attendee was checked in before this scan.
            let body = response.json::<ValidateResponse>().await.ok();
            return match body {
                Some(body) if body.attendee.is_some() => Ok(ValidationReply {
                    valid: true,
                    already_checked_in: true,
                    ..ValidationReply::from(body)
                }),
                Some(body) => Err(CheckInError::Upstream {
                    status: status.as_u16(),
                    message: body.message,
                }),
                None => Err(CheckInError::Upstream {
                    status: status.as_u16(),
                    message: None,
                }),
            };
        }

        // Keep the server's message so the operator sees why the code was refused.
        let message = response
            .json::<ErrorResponse>()
            .await
            .ok()
            .and_then(|payload| payload.message);

        if status == StatusCode::UNAUTHORIZED {
            return Err(CheckInError::Unauthorized { message });
        }

        Err(CheckInError::Upstream {
            status: status.as_u16(),
            message,
        })
    }
}
