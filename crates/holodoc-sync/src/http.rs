//! HTTP implementation of [`DocumentService`].
//!
//! Every operation is a `POST` of a JSON body to `http://host:port{path}`
//! with the configured content type. The response body alone decides the
//! outcome; the HTTP status is only logged.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use holodoc_core::defaults;
use holodoc_core::wire::{
    BackgroundColorRequest, LinkRequest, MatchOrCreateRequest, PingRequest, UpdatePhotoRequest,
    UpdateRequest,
};
use holodoc_core::{
    Answer, CameraFrame, ConnectedAnswer, DocumentAnswer, DocumentId, DocumentService, Endpoint,
    PendingEdit, Reply, Result, Rgb, SimpleAnswer,
};

use crate::config::ServerConfig;

/// Document-matching server reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDocumentService {
    client: Client,
    config: ServerConfig,
}

impl HttpDocumentService {
    /// Validate `config` and build the HTTP client.
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        debug!(
            base_url = %config.base_url(),
            content_type = %config.content_type,
            success_policy = %config.success_policy,
            "Initializing HTTP document service"
        );

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    async fn post<B, T>(&self, endpoint: Endpoint, request: &B) -> Reply<T>
    where
        B: Serialize + ?Sized,
        T: Answer,
    {
        let start = Instant::now();
        let payload = match serde_json::to_vec(request) {
            Ok(payload) => payload,
            Err(e) => return Reply::transport(format!("Failed to encode request: {}", e)),
        };
        let payload_len = payload.len();

        let response = match self
            .client
            .post(self.config.url(endpoint))
            .header(CONTENT_TYPE, self.config.content_type.as_str())
            .body(payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, path = endpoint.path(), "Request failed");
                return Reply::transport(format!("Request failed: {}", e));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, path = endpoint.path(), "Failed to read response body");
                return Reply::transport(format!("Failed to read response: {}", e));
            }
        };
        if !status.is_success() {
            warn!(status = %status, path = endpoint.path(), "Server returned non-success status");
        }

        let reply = Reply::from_body(&body, self.config.success_policy);

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            payload_len,
            response_len = body.len(),
            duration_ms = elapsed,
            success = reply.success,
            "Request complete"
        );
        if elapsed > defaults::SLOW_REQUEST_MS {
            warn!(
                duration_ms = elapsed,
                path = endpoint.path(),
                slow = true,
                "Slow server request"
            );
        }
        if let Some(failure) = &reply.failure {
            debug!(error = %failure, "Reply carries a failure");
        }
        reply
    }
}

#[async_trait]
impl DocumentService for HttpDocumentService {
    #[instrument(skip(self), fields(subsystem = "sync", component = "http", op = "ping"))]
    async fn ping(&self) -> Reply<SimpleAnswer> {
        self.post(Endpoint::Ping, &PingRequest::default()).await
    }

    #[instrument(skip(self, frame), fields(subsystem = "sync", component = "http", op = "match_or_create", width = frame.width(), height = frame.height()))]
    async fn match_or_create(&self, frame: &CameraFrame) -> Reply<DocumentAnswer> {
        match MatchOrCreateRequest::from_frame(frame, self.config.jpeg_quality) {
            Ok(request) => self.post(Endpoint::MatchOrCreate, &request).await,
            Err(e) => Reply::transport(format!("Failed to encode frame: {}", e)),
        }
    }

    #[instrument(skip(self, edit), fields(subsystem = "sync", component = "http", op = "update_document", document_id = %edit.identity))]
    async fn update_document(&self, edit: &PendingEdit) -> Reply<DocumentAnswer> {
        self.post(Endpoint::UpdateDocument, &UpdateRequest::from(edit))
            .await
    }

    #[instrument(skip(self, frame), fields(subsystem = "sync", component = "http", op = "update_photo", document_id = %identity))]
    async fn update_photo(&self, identity: &DocumentId, frame: &CameraFrame) -> Reply<DocumentAnswer> {
        match UpdatePhotoRequest::new(identity, frame, self.config.jpeg_quality) {
            Ok(request) => self.post(Endpoint::UpdatePhoto, &request).await,
            Err(e) => Reply::transport(format!("Failed to encode frame: {}", e)),
        }
    }

    #[instrument(skip(self), fields(subsystem = "sync", component = "http", op = "set_background_color"))]
    async fn set_background_color(&self, color: Rgb) -> Reply<SimpleAnswer> {
        self.post(Endpoint::BackgroundColor, &BackgroundColorRequest::from(color))
            .await
    }

    #[instrument(skip(self), fields(subsystem = "sync", component = "http", op = "create_link", first = %first, second = %second))]
    async fn create_link(&self, first: &DocumentId, second: &DocumentId) -> Reply<SimpleAnswer> {
        self.post(Endpoint::CreateLink, &LinkRequest::pair(first, second))
            .await
    }

    #[instrument(skip(self), fields(subsystem = "sync", component = "http", op = "remove_link", first = %first))]
    async fn remove_link(&self, first: &DocumentId) -> Reply<SimpleAnswer> {
        self.post(Endpoint::RemoveLink, &LinkRequest::single(first))
            .await
    }

    #[instrument(skip(self), fields(subsystem = "sync", component = "http", op = "are_connected", first = %first, second = %second))]
    async fn are_connected(&self, first: &DocumentId, second: &DocumentId) -> Reply<ConnectedAnswer> {
        self.post(Endpoint::Connected, &LinkRequest::pair(first, second))
            .await
    }
}
