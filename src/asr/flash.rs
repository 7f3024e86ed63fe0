use super::payload::ProtocolBody;
use super::transport::{HttpRequest, Transport, TransportError};
use super::{Endpoints, RawExchange, Stage, StageFailure, TranscriptionRequest};

pub const HEADER_APP_KEY: &str = "X-Api-App-Key";
pub const HEADER_ACCESS_KEY: &str = "X-Api-Access-Key";
pub const HEADER_RESOURCE_ID: &str = "X-Api-Resource-Id";
pub const HEADER_REQUEST_ID: &str = "X-Api-Request-Id";
pub const HEADER_SEQUENCE: &str = "X-Api-Sequence";

/// Sequence marker for a request carrying the whole audio.
pub const LAST_SEQUENCE: &str = "-1";

/// Executes the synchronous flash protocol: one POST, one response.
pub struct FlashInvoker<'a, T> {
    transport: &'a T,
    endpoints: &'a Endpoints,
}

impl<'a, T: Transport> FlashInvoker<'a, T> {
    pub fn new(transport: &'a T, endpoints: &'a Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    pub fn headers(request: &TranscriptionRequest) -> Vec<(String, String)> {
        vec![
            (HEADER_APP_KEY.to_string(), request.app_key().to_string()),
            (HEADER_ACCESS_KEY.to_string(), request.access_key().to_string()),
            (HEADER_RESOURCE_ID.to_string(), request.resource_id().to_string()),
            (HEADER_REQUEST_ID.to_string(), request.request_id().to_string()),
            (HEADER_SEQUENCE.to_string(), LAST_SEQUENCE.to_string()),
        ]
    }

    pub async fn invoke(
        &self,
        request: &TranscriptionRequest,
        body: &ProtocolBody,
    ) -> Result<RawExchange, StageFailure> {
        let failure = |error: TransportError| StageFailure {
            stage: Stage::Flash,
            error,
        };

        let body = body
            .to_json()
            .map_err(|e| failure(TransportError::Request(format!("encode body: {}", e))))?;

        tracing::debug!(
            url = %self.endpoints.flash_url,
            request_id = request.request_id(),
            "Sending flash recognition request"
        );

        let response = self
            .transport
            .send(HttpRequest {
                url: self.endpoints.flash_url.clone(),
                headers: Self::headers(request),
                body,
            })
            .await
            .map_err(failure)?;

        Ok(RawExchange::from_response(response, Stage::Flash))
    }
}
