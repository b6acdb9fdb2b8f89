//! Wire types for the document-matching server.
//!
//! Every request is a POST with a JSON body. Field names are fixed by the
//! server and must not change. Answers are decoded leniently: every field is
//! optional, `null` reads as the default, and capitalised names are accepted.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::frame::CameraFrame;
use crate::models::{DocumentFields, DocumentId, PendingEdit, Rgb};

// =============================================================================
// ENDPOINTS
// =============================================================================

/// Server endpoints, one per remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Ping,
    MatchOrCreate,
    UpdateDocument,
    UpdatePhoto,
    BackgroundColor,
    CreateLink,
    RemoveLink,
    Connected,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Ping => "/utils/ping",
            Endpoint::MatchOrCreate => "/document/matchorcreate",
            Endpoint::UpdateDocument => "/document/update",
            Endpoint::UpdatePhoto => "/document/updatephoto",
            Endpoint::BackgroundColor => "/document/background",
            Endpoint::CreateLink => "/link/create",
            Endpoint::RemoveLink => "/link/remove",
            Endpoint::Connected => "/document/connected",
        }
    }

    /// Operation name used in log fields.
    pub fn operation(&self) -> &'static str {
        match self {
            Endpoint::Ping => "ping",
            Endpoint::MatchOrCreate => "match_or_create",
            Endpoint::UpdateDocument => "update_document",
            Endpoint::UpdatePhoto => "update_photo",
            Endpoint::BackgroundColor => "set_background_color",
            Endpoint::CreateLink => "create_link",
            Endpoint::RemoveLink => "remove_link",
            Endpoint::Connected => "are_connected",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Body of `/utils/ping`: an empty object.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PingRequest {}

/// Body of `/document/matchorcreate`.
#[derive(Debug, Clone, Serialize)]
pub struct MatchOrCreateRequest {
    /// Upper-case hex of the JPEG encoding.
    pub image: String,
}

impl MatchOrCreateRequest {
    pub fn from_frame(frame: &CameraFrame, quality: u8) -> Result<Self> {
        Ok(Self {
            image: frame.to_hex_jpeg(quality)?,
        })
    }
}

/// Body of `/document/update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateRequest {
    pub id: String,
    pub label: String,
    pub desc: String,
    pub author: String,
    pub date: String,
}

impl From<&PendingEdit> for UpdateRequest {
    fn from(edit: &PendingEdit) -> Self {
        Self {
            id: edit.identity.as_str().to_string(),
            label: edit.fields.label.clone(),
            desc: edit.fields.description.clone(),
            author: edit.fields.author.clone(),
            date: edit.fields.date.clone(),
        }
    }
}

/// Body of `/document/updatephoto`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdatePhotoRequest {
    pub id: String,
    pub image: String,
}

impl UpdatePhotoRequest {
    pub fn new(identity: &DocumentId, frame: &CameraFrame, quality: u8) -> Result<Self> {
        Ok(Self {
            id: identity.as_str().to_string(),
            image: frame.to_hex_jpeg(quality)?,
        })
    }
}

/// Body of `/document/background`. Components travel as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackgroundColorRequest {
    #[serde(rename = "R")]
    pub r: String,
    #[serde(rename = "G")]
    pub g: String,
    #[serde(rename = "B")]
    pub b: String,
}

impl From<Rgb> for BackgroundColorRequest {
    fn from(color: Rgb) -> Self {
        Self {
            r: color.r.to_string(),
            g: color.g.to_string(),
            b: color.b.to_string(),
        }
    }
}

/// Body of `/link/create`, `/link/remove` and `/document/connected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRequest {
    #[serde(rename = "firstId")]
    pub first_id: String,
    #[serde(rename = "secondId", skip_serializing_if = "Option::is_none")]
    pub second_id: Option<String>,
}

impl LinkRequest {
    pub fn pair(first: &DocumentId, second: &DocumentId) -> Self {
        Self {
            first_id: first.as_str().to_string(),
            second_id: Some(second.as_str().to_string()),
        }
    }

    pub fn single(first: &DocumentId) -> Self {
        Self {
            first_id: first.as_str().to_string(),
            second_id: None,
        }
    }
}

// =============================================================================
// ANSWERS
// =============================================================================

fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A decoded server answer that may carry an embedded error message.
pub trait Answer: DeserializeOwned + Send + 'static {
    /// The embedded error, if non-empty.
    fn error(&self) -> Option<&str>;
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Answer carrying only the error field (links, background colour, ping).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimpleAnswer {
    #[serde(alias = "Error", deserialize_with = "nullable")]
    pub error: String,
}

impl Answer for SimpleAnswer {
    fn error(&self) -> Option<&str> {
        non_empty(&self.error)
    }
}

/// Answer of `/document/connected`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectedAnswer {
    #[serde(alias = "Connected", deserialize_with = "nullable")]
    pub connected: bool,
    #[serde(alias = "Error", deserialize_with = "nullable")]
    pub error: String,
}

impl Answer for ConnectedAnswer {
    fn error(&self) -> Option<&str> {
        non_empty(&self.error)
    }
}

/// Document answer of match-or-create, update and update-photo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DocumentAnswer {
    #[serde(alias = "Id", deserialize_with = "nullable")]
    pub id: String,
    #[serde(alias = "Name", deserialize_with = "nullable")]
    pub name: String,
    #[serde(alias = "Label", deserialize_with = "nullable")]
    pub label: String,
    #[serde(alias = "Desc", deserialize_with = "nullable")]
    pub desc: String,
    #[serde(alias = "Author", deserialize_with = "nullable")]
    pub author: String,
    #[serde(alias = "Date", deserialize_with = "nullable")]
    pub date: String,
    #[serde(alias = "Path", deserialize_with = "nullable")]
    pub path: String,
    /// Base64-encoded image.
    #[serde(alias = "Image", deserialize_with = "nullable")]
    pub image: String,
    #[serde(alias = "Link", deserialize_with = "nullable")]
    pub link: Vec<String>,
    #[serde(alias = "Error", deserialize_with = "nullable")]
    pub error: String,
}

impl DocumentAnswer {
    /// The server identity; `Error::Sync` when the answer carries none.
    pub fn identity(&self) -> Result<DocumentId> {
        DocumentId::new(self.id.clone())
            .map_err(|_| Error::Sync("server answer carries no document id".to_string()))
    }

    pub fn fields(&self) -> DocumentFields {
        DocumentFields::new(
            self.label.clone(),
            self.author.clone(),
            self.desc.clone(),
            self.date.clone(),
        )
    }

    /// Linked document identities, skipping empty entries.
    pub fn linked_documents(&self) -> Vec<DocumentId> {
        self.link
            .iter()
            .filter_map(|id| DocumentId::new(id.clone()).ok())
            .collect()
    }

    /// Decoded photo, if the answer carries one.
    pub fn photo(&self) -> Option<Result<CameraFrame>> {
        non_empty(&self.image).map(CameraFrame::from_base64)
    }
}

impl Answer for DocumentAnswer {
    fn error(&self) -> Option<&str> {
        non_empty(&self.error)
    }
}

// =============================================================================
// REPLIES
// =============================================================================

/// How a reply's `success` flag is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuccessPolicy {
    /// Non-empty, well-formed body with an empty `error` field.
    #[default]
    Strict,
    /// Any non-empty, well-formed body; the embedded `error` field is ignored.
    BodyPresent,
}

impl FromStr for SuccessPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "body-present" | "body_present" | "legacy" => Ok(Self::BodyPresent),
            other => Err(Error::Config(format!("unknown success policy: {}", other))),
        }
    }
}

impl fmt::Display for SuccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::BodyPresent => write!(f, "body-present"),
        }
    }
}

/// Why a reply is not (fully) successful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncFailure {
    /// Request not sent or response not read.
    Transport(String),
    /// Empty response body.
    EmptyResponse,
    /// Non-empty body that does not decode as the expected answer.
    Malformed(String),
    /// Embedded non-empty `error` field.
    Server(String),
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport failure: {}", msg),
            Self::EmptyResponse => write!(f, "empty response"),
            Self::Malformed(msg) => write!(f, "malformed response: {}", msg),
            Self::Server(msg) => write!(f, "server error: {}", msg),
        }
    }
}

impl From<SyncFailure> for Error {
    fn from(failure: SyncFailure) -> Self {
        match failure {
            SyncFailure::Transport(msg) => Error::Transport(msg),
            SyncFailure::EmptyResponse => Error::EmptyResponse,
            SyncFailure::Malformed(msg) => Error::Serialization(msg),
            SyncFailure::Server(msg) => Error::Sync(msg),
        }
    }
}

/// Completed remote call as seen by the caller's continuation.
///
/// `answer` is present whenever the body decoded, even if `success` is false.
/// Under [`SuccessPolicy::BodyPresent`] a reply can be successful and still
/// carry a `Server` failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<T> {
    pub answer: Option<T>,
    pub success: bool,
    pub failure: Option<SyncFailure>,
}

impl<T: Answer> Reply<T> {
    /// Reply for a request that never produced a body.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            answer: None,
            success: false,
            failure: Some(SyncFailure::Transport(message.into())),
        }
    }

    /// Successful reply wrapping an already-decoded answer.
    pub fn ok(answer: T) -> Self {
        Self {
            answer: Some(answer),
            success: true,
            failure: None,
        }
    }

    /// Classify a raw response body.
    pub fn from_body(body: &str, policy: SuccessPolicy) -> Self {
        if body.trim().is_empty() {
            return Self {
                answer: None,
                success: false,
                failure: Some(SyncFailure::EmptyResponse),
            };
        }

        let answer: T = match serde_json::from_str(body) {
            Ok(answer) => answer,
            Err(e) => {
                return Self {
                    answer: None,
                    success: false,
                    failure: Some(SyncFailure::Malformed(e.to_string())),
                }
            }
        };

        let failure = answer.error().map(|e| SyncFailure::Server(e.to_string()));
        let success = match policy {
            SuccessPolicy::Strict => failure.is_none(),
            SuccessPolicy::BodyPresent => true,
        };

        Self {
            answer: Some(answer),
            success,
            failure,
        }
    }

    /// The answer of a successful reply, or the failure as an [`Error`].
    pub fn into_result(self) -> Result<T> {
        match (self.success, self.answer) {
            (true, Some(answer)) => Ok(answer),
            (_, _) => Err(self
                .failure
                .map(Error::from)
                .unwrap_or(Error::EmptyResponse)),
        }
    }
}
