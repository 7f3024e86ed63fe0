//! Volcengine speech recognition client.
//!
//! Two incompatible protocols sit behind one entry point: the synchronous
//! `flash` call and the asynchronous `standard` submit/query flow. The
//! [`SpeechClient`] picks a protocol, builds the body, runs the matching
//! invoker and normalizes whatever came back into a [`TranscriptionResult`].

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

pub mod flash;
pub mod interpret;
pub mod mode;
pub mod payload;
pub mod polling;
pub mod transport;

pub use interpret::{interpret, ErrorKind, Outcome, TranscriptionResult};
pub use mode::{select_mode, Mode, ModeChoice};
pub use payload::{AudioProfile, PayloadBuilder, ProtocolBody};
pub use polling::{classify_query, PollDecision};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Transport, TransportError};

use flash::FlashInvoker;
use polling::{PollEnd, PollingInvoker};

/// Largest audio file the service accepts.
pub const MAX_AUDIO_BYTES: u64 = 100 * 1024 * 1024;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(120_000);

/// Which protocol step produced an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Flash,
    Submit,
    Query,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Flash => write!(f, "flash"),
            Stage::Submit => write!(f, "submit"),
            Stage::Query => write!(f, "query"),
        }
    }
}

/// One HTTP call as seen by the protocol layer.
#[derive(Debug, Clone)]
pub struct RawExchange {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: String,
    pub stage: Stage,
}

impl RawExchange {
    pub fn from_response(response: HttpResponse, stage: Stage) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
            stage,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header value, or an empty string when the vendor did not send it.
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// A call that failed below HTTP, tagged with the step that made it.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: TransportError,
}

/// Endpoints of the recognition service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub flash_url: String,
    pub submit_url: String,
    pub query_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        let base = "https://openspeech.bytedance.com/api/v3/auc/bigmodel";
        Self {
            flash_url: format!("{}/recognize/flash", base),
            submit_url: format!("{}/submit", base),
            query_url: format!("{}/query", base),
        }
    }
}

/// Vendor status codes carried in `x-api-status-code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorCodes {
    pub complete: String,
    pub in_progress: String,
}

impl Default for VendorCodes {
    fn default() -> Self {
        Self {
            complete: "20000000".to_string(),
            in_progress: "20000001".to_string(),
        }
    }
}

/// Everything about the service that does not change between requests.
#[derive(Debug, Clone)]
pub struct AsrSettings {
    pub endpoints: Endpoints,
    pub vendor_codes: VendorCodes,
    pub payload: PayloadBuilder,
    /// Resource id that makes `auto` pick the standard protocol.
    pub standard_resource_id: String,
    pub max_file_size: u64,
    pub http_timeout: Duration,
}

impl Default for AsrSettings {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            vendor_codes: VendorCodes::default(),
            payload: PayloadBuilder::default(),
            standard_resource_id: mode::STANDARD_RESOURCE_ID.to_string(),
            max_file_size: MAX_AUDIO_BYTES,
            http_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub app_key: String,
    pub access_key: Option<String>,
}

/// Caller-supplied knobs for a single transcription.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub mode: ModeChoice,
    pub resource_id: String,
    pub model_name: String,
    pub credentials: Credentials,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

/// Problems detected before any network call.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("file does not exist: {0}")]
    FileNotFound(String),

    #[error("path is not a file: {0}")]
    NotAFile(String),

    #[error("file is {size} bytes, over the {limit} byte limit; compress the audio and retry")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("missing credential {name} required by the {mode} protocol")]
    MissingCredential { mode: Mode, name: &'static str },

    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Cancellation observed while waiting between polls.
#[derive(Debug, thiserror::Error)]
#[error("transcription cancelled while waiting for the recognition job (request id {request_id})")]
pub struct Cancelled {
    pub request_id: String,
}

/// A validated, immutable transcription request.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    audio: Vec<u8>,
    mode: Mode,
    resource_id: String,
    model_name: String,
    credentials: Credentials,
    poll_interval: Duration,
    poll_timeout: Duration,
    request_id: String,
}

impl TranscriptionRequest {
    pub fn audio(&self) -> &[u8] {
        &self.audio
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn app_key(&self) -> &str {
        &self.credentials.app_key
    }

    pub fn access_key(&self) -> &str {
        self.credentials.access_key.as_deref().unwrap_or("")
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

/// Checks the size of an audio file without reading it.
pub fn check_audio_file(path: &Path, limit: u64) -> Result<u64, InputError> {
    let display = path.display().to_string();
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(InputError::FileNotFound(display))
        }
        Err(source) => return Err(InputError::Unreadable { path: display, source }),
    };

    if !metadata.is_file() {
        return Err(InputError::NotAFile(display));
    }
    if metadata.len() > limit {
        return Err(InputError::FileTooLarge {
            size: metadata.len(),
            limit,
        });
    }

    Ok(metadata.len())
}

/// Speech recognition client over a pluggable transport.
pub struct SpeechClient<T = HttpTransport> {
    transport: T,
    settings: AsrSettings,
}

impl SpeechClient<HttpTransport> {
    pub fn new(settings: AsrSettings) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(settings.http_timeout)?;
        Ok(Self::with_transport(transport, settings))
    }
}

impl<T: Transport> SpeechClient<T> {
    pub fn with_transport(transport: T, settings: AsrSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &AsrSettings {
        &self.settings
    }

    /// Resolve the protocol for `options` and make sure its credentials are
    /// present. Needs no audio and touches no network.
    pub fn check_options(&self, options: &RequestOptions) -> Result<Mode, InputError> {
        let mode = select_mode(
            options.mode,
            &options.resource_id,
            &self.settings.standard_resource_id,
        );

        if options.credentials.app_key.trim().is_empty() {
            return Err(InputError::MissingCredential {
                mode,
                name: "app key",
            });
        }
        let has_access_key = options
            .credentials
            .access_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if mode == Mode::Flash && !has_access_key {
            return Err(InputError::MissingCredential {
                mode,
                name: "access key",
            });
        }

        Ok(mode)
    }

    /// Validate inputs and freeze them into a request with a fresh request id.
    pub fn prepare(
        &self,
        audio: Vec<u8>,
        options: RequestOptions,
    ) -> Result<TranscriptionRequest, InputError> {
        let size = audio.len() as u64;
        if size > self.settings.max_file_size {
            return Err(InputError::FileTooLarge {
                size,
                limit: self.settings.max_file_size,
            });
        }

        let mode = self.check_options(&options)?;

        Ok(TranscriptionRequest {
            audio,
            mode,
            resource_id: options.resource_id,
            model_name: options.model_name,
            credentials: options.credentials,
            poll_interval: options.poll_interval,
            poll_timeout: options.poll_timeout,
            request_id: Uuid::new_v4().to_string(),
        })
    }

    /// Read an audio file, enforcing the size limit before loading it.
    pub async fn prepare_file(
        &self,
        path: &Path,
        options: RequestOptions,
    ) -> Result<TranscriptionRequest, InputError> {
        check_audio_file(path, self.settings.max_file_size)?;
        let audio = tokio::fs::read(path)
            .await
            .map_err(|source| InputError::Unreadable {
                path: path.display().to_string(),
                source,
            })?;
        self.prepare(audio, options)
    }

    /// Run a request to completion. Every failure past input validation is an
    /// `error`-outcome result.
    pub async fn transcribe(&self, request: &TranscriptionRequest) -> TranscriptionResult {
        match self
            .run_protocol(request, std::future::pending::<Infallible>())
            .await
        {
            Ok(result) => result,
            Err(never) => match never {},
        }
    }

    /// Like [`transcribe`](Self::transcribe), but `cancel` may interrupt the
    /// wait between polls. A query already in flight is always completed.
    pub async fn transcribe_until<F>(
        &self,
        request: &TranscriptionRequest,
        cancel: F,
    ) -> Result<TranscriptionResult, Cancelled>
    where
        F: Future<Output = ()>,
    {
        let request_id = request.request_id().to_string();
        self.run_protocol(request, async move {
            cancel.await;
            Cancelled { request_id }
        })
        .await
    }

    /// Shared body of both entry points. Whatever `cancel` yields becomes the
    /// error when it wins the race against a poll wait.
    async fn run_protocol<F, C>(
        &self,
        request: &TranscriptionRequest,
        cancel: F,
    ) -> Result<TranscriptionResult, C>
    where
        F: Future<Output = C>,
    {
        let audio_b64 = STANDARD.encode(request.audio());
        let body = self.settings.payload.build(
            request.mode(),
            request.app_key(),
            &audio_b64,
            request.model_name(),
        );

        tracing::info!(
            mode = %request.mode(),
            resource_id = request.resource_id(),
            request_id = request.request_id(),
            audio_bytes = request.audio().len(),
            "Starting speech recognition"
        );

        let result = match request.mode() {
            Mode::Flash => {
                let invoker = FlashInvoker::new(&self.transport, &self.settings.endpoints);
                match invoker.invoke(request, &body).await {
                    Ok(exchange) => interpret(&exchange, request.mode(), request.request_id()),
                    Err(failure) => TranscriptionResult::transport_failure(
                        request.mode(),
                        failure.stage,
                        request.request_id(),
                        &failure.error,
                    ),
                }
            }
            Mode::Standard => {
                let invoker = PollingInvoker::new(
                    &self.transport,
                    &self.settings.endpoints,
                    &self.settings.vendor_codes,
                );
                match invoker.run(request, &body, cancel).await {
                    Ok(PollEnd::Finished(exchange)) => {
                        interpret(&exchange, request.mode(), request.request_id())
                    }
                    Ok(PollEnd::TimedOut(exchange)) => {
                        interpret(&exchange, request.mode(), request.request_id())
                            .with_error_kind(ErrorKind::PollTimeout)
                    }
                    Ok(PollEnd::Cancelled(reason)) => {
                        tracing::warn!(request_id = request.request_id(), "Polling cancelled");
                        return Err(reason);
                    }
                    Err(failure) => TranscriptionResult::transport_failure(
                        request.mode(),
                        failure.stage,
                        request.request_id(),
                        &failure.error,
                    ),
                }
            }
        };

        match result.outcome {
            Outcome::Success => tracing::info!(
                stage = %result.stage,
                chars = result.result_text.chars().count(),
                "Speech recognition completed"
            ),
            Outcome::Error => tracing::warn!(
                stage = %result.stage,
                http_status = ?result.http_status,
                api_status_code = %result.api_status_code,
                api_message = %result.api_message,
                log_id = %result.log_id,
                "Speech recognition failed"
            ),
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn options(mode: ModeChoice, access_key: Option<&str>) -> RequestOptions {
        RequestOptions {
            mode,
            resource_id: "volc.bigasr.auc_turbo".to_string(),
            model_name: "bigmodel".to_string(),
            credentials: Credentials {
                app_key: "app".to_string(),
                access_key: access_key.map(str::to_string),
            },
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    fn client() -> SpeechClient<transport::MockTransport> {
        SpeechClient::with_transport(transport::MockTransport::new(), AsrSettings::default())
    }

    #[test]
    fn test_prepare_requires_access_key_for_flash() {
        let err = client()
            .prepare(vec![1, 2, 3], options(ModeChoice::Flash, None))
            .unwrap_err();
        assert!(matches!(
            err,
            InputError::MissingCredential {
                mode: Mode::Flash,
                name: "access key"
            }
        ));
    }

    #[test]
    fn test_prepare_standard_needs_only_app_key() {
        let request = assert_ok!(client().prepare(vec![1], options(ModeChoice::Standard, None)));
        assert_eq!(request.mode(), Mode::Standard);
        assert_eq!(request.access_key(), "");
    }

    #[test]
    fn test_prepare_rejects_blank_app_key() {
        let mut opts = options(ModeChoice::Standard, None);
        opts.credentials.app_key = "  ".to_string();
        assert_err!(client().prepare(vec![1], opts));
    }

    #[test]
    fn test_prepare_rejects_oversized_audio() {
        let mut settings = AsrSettings::default();
        settings.max_file_size = 4;
        let client = SpeechClient::with_transport(transport::MockTransport::new(), settings);

        let err = client
            .prepare(vec![0; 5], options(ModeChoice::Flash, Some("key")))
            .unwrap_err();
        assert!(matches!(err, InputError::FileTooLarge { size: 5, limit: 4 }));
    }

    #[test]
    fn test_each_request_gets_fresh_id() {
        let client = client();
        let a = client
            .prepare(vec![1], options(ModeChoice::Flash, Some("key")))
            .unwrap();
        let b = client
            .prepare(vec![1], options(ModeChoice::Flash, Some("key")))
            .unwrap();

        assert_ne!(a.request_id(), b.request_id());
        assert_eq!(Uuid::parse_str(a.request_id()).unwrap().get_version_num(), 4);
    }

    #[test]
    fn test_check_audio_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, vec![0u8; 10]).unwrap();

        assert_eq!(check_audio_file(&path, 10).unwrap(), 10);
        assert!(matches!(
            check_audio_file(&path, 9),
            Err(InputError::FileTooLarge { size: 10, limit: 9 })
        ));
        assert!(matches!(
            check_audio_file(&dir.path().join("missing.mp4"), 10),
            Err(InputError::FileNotFound(_))
        ));
        assert!(matches!(
            check_audio_file(dir.path(), 10),
            Err(InputError::NotAFile(_))
        ));
    }

    #[test]
    fn test_raw_exchange_header_lookup_is_case_insensitive() {
        let exchange = RawExchange {
            status: 200,
            headers: HashMap::from([("x-api-status-code".to_string(), "20000000".to_string())]),
            body: String::new(),
            stage: Stage::Flash,
        };
        assert_eq!(exchange.header("X-Api-Status-Code"), "20000000");
        assert_eq!(exchange.header("x-tt-logid"), "");
    }
}
