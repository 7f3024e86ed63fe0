//! Standard protocol: submit a job, then query it until it settles.
//!
//! ```text
//! SUBMITTING --non-2xx--> DONE(submit)
//!     |
//!     v
//!  POLLING --complete code / text present / non-2xx--> DONE(query)
//!     |
//!     +--budget spent--> TIMED_OUT (synthetic 408)
//! ```

use std::collections::HashMap;
use std::future::Future;
use tokio::time::{sleep_until, Instant};

use super::flash::{HEADER_REQUEST_ID, HEADER_RESOURCE_ID, HEADER_SEQUENCE, LAST_SEQUENCE};
use super::interpret::{extract_text, parse_body, HEADER_STATUS_CODE};
use super::payload::ProtocolBody;
use super::transport::{HttpRequest, Transport, TransportError};
use super::{Endpoints, RawExchange, Stage, StageFailure, TranscriptionRequest, VendorCodes};

/// Single API-key header used by submit and query.
pub const HEADER_API_KEY: &str = "x-api-key";

/// Body of every query call.
pub const EMPTY_OBJECT: &str = "{}";

/// Synthetic status for an exhausted polling budget.
pub const TIMEOUT_STATUS: u16 = 408;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    /// Job still running, query again after the next interval
    Continue,
    /// Job finished; this exchange is the result
    Done,
    /// The service rejected the query; this exchange is the result
    Failed,
}

/// Decide what a query response means.
///
/// Completion is tolerant: a successful response that already carries text
/// counts as done even without the completion code. Anything successful but
/// unrecognized keeps polling.
pub fn classify_query(exchange: &RawExchange, codes: &VendorCodes) -> PollDecision {
    let code = exchange.header(HEADER_STATUS_CODE);
    if code == codes.complete {
        return PollDecision::Done;
    }

    if !exchange.is_success() {
        return PollDecision::Failed;
    }

    if !extract_text(&parse_body(&exchange.body)).is_empty() {
        return PollDecision::Done;
    }

    if code != codes.in_progress && exchange.body.trim() != EMPTY_OBJECT {
        tracing::debug!(code, "Unrecognized query response, still waiting");
    }
    PollDecision::Continue
}

/// How the polling loop ended. `C` is whatever the cancellation future yields.
#[derive(Debug)]
pub enum PollEnd<C> {
    Finished(RawExchange),
    TimedOut(RawExchange),
    Cancelled(C),
}

pub struct PollingInvoker<'a, T> {
    transport: &'a T,
    endpoints: &'a Endpoints,
    codes: &'a VendorCodes,
}

impl<'a, T: Transport> PollingInvoker<'a, T> {
    pub fn new(transport: &'a T, endpoints: &'a Endpoints, codes: &'a VendorCodes) -> Self {
        Self {
            transport,
            endpoints,
            codes,
        }
    }

    pub fn submit_headers(request: &TranscriptionRequest) -> Vec<(String, String)> {
        vec![
            (HEADER_API_KEY.to_string(), request.app_key().to_string()),
            (HEADER_RESOURCE_ID.to_string(), request.resource_id().to_string()),
            (HEADER_REQUEST_ID.to_string(), request.request_id().to_string()),
            (HEADER_SEQUENCE.to_string(), LAST_SEQUENCE.to_string()),
        ]
    }

    pub fn query_headers(request: &TranscriptionRequest) -> Vec<(String, String)> {
        vec![
            (HEADER_API_KEY.to_string(), request.app_key().to_string()),
            (HEADER_RESOURCE_ID.to_string(), request.resource_id().to_string()),
            (HEADER_REQUEST_ID.to_string(), request.request_id().to_string()),
        ]
    }

    /// Submit the job and poll it. `cancel` is only observed while waiting
    /// between queries, and no wait extends past the polling deadline.
    pub async fn run<F, C>(
        &self,
        request: &TranscriptionRequest,
        body: &ProtocolBody,
        cancel: F,
    ) -> Result<PollEnd<C>, StageFailure>
    where
        F: Future<Output = C>,
    {
        let submitted = self.submit(request, body).await?;
        if !submitted.is_success() {
            tracing::warn!(
                http_status = submitted.status,
                api_status_code = submitted.header(HEADER_STATUS_CODE),
                "Job submission rejected"
            );
            return Ok(PollEnd::Finished(submitted));
        }

        tracing::info!(
            request_id = request.request_id(),
            interval_ms = request.poll_interval().as_millis() as u64,
            timeout_ms = request.poll_timeout().as_millis() as u64,
            "Job submitted, polling for result"
        );

        tokio::pin!(cancel);
        let started = Instant::now();
        let deadline = started + request.poll_timeout();
        let mut attempt = 0u32;

        loop {
            let wake = (Instant::now() + request.poll_interval()).min(deadline);
            tokio::select! {
                _ = sleep_until(wake) => {}
                reason = &mut cancel => return Ok(PollEnd::Cancelled(reason)),
            }

            if Instant::now() >= deadline {
                break;
            }

            attempt += 1;
            let exchange = self.query(request).await?;
            let decision = classify_query(&exchange, self.codes);

            tracing::debug!(
                attempt,
                http_status = exchange.status,
                api_status_code = exchange.header(HEADER_STATUS_CODE),
                ?decision,
                "Query response"
            );

            match decision {
                PollDecision::Continue => continue,
                PollDecision::Done | PollDecision::Failed => {
                    return Ok(PollEnd::Finished(exchange));
                }
            }
        }

        let waited_ms = started.elapsed().as_millis() as u64;
        tracing::warn!(attempts = attempt, waited_ms, "Polling budget exhausted");

        Ok(PollEnd::TimedOut(RawExchange {
            status: TIMEOUT_STATUS,
            headers: HashMap::new(),
            body: serde_json::json!({
                "error": format!(
                    "recognition job did not finish within {}ms",
                    request.poll_timeout().as_millis()
                ),
            })
            .to_string(),
            stage: Stage::Query,
        }))
    }

    async fn submit(
        &self,
        request: &TranscriptionRequest,
        body: &ProtocolBody,
    ) -> Result<RawExchange, StageFailure> {
        let failure = |error: TransportError| StageFailure {
            stage: Stage::Submit,
            error,
        };

        let body = body
            .to_json()
            .map_err(|e| failure(TransportError::Request(format!("encode body: {}", e))))?;

        let response = self
            .transport
            .send(HttpRequest {
                url: self.endpoints.submit_url.clone(),
                headers: Self::submit_headers(request),
                body,
            })
            .await
            .map_err(failure)?;

        Ok(RawExchange::from_response(response, Stage::Submit))
    }

    async fn query(&self, request: &TranscriptionRequest) -> Result<RawExchange, StageFailure> {
        let response = self
            .transport
            .send(HttpRequest {
                url: self.endpoints.query_url.clone(),
                headers: Self::query_headers(request),
                body: EMPTY_OBJECT.to_string(),
            })
            .await
            .map_err(|error| StageFailure {
                stage: Stage::Query,
                error,
            })?;

        Ok(RawExchange::from_response(response, Stage::Query))
    }
}
