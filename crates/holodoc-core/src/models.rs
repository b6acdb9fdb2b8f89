//! Core data models for HoloDoc.
//!
//! These types are shared across all HoloDoc crates and represent the core
//! domain entities: local entity handles, server document identities, link
//! groups and the document record itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};
use crate::frame::CameraFrame;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Local handle for one presentation entity (one displayed document).
///
/// Assigned when a record is created locally and never sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Allocate a new time-ordered handle.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned document identity. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap a server identity, rejecting empty or whitespace-only strings.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::Sync("document identity is empty".to_string()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for DocumentId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DocumentId::new(raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier shared by every document of one link group.
///
/// "No link" is `Option::<LinkId>::None`; wire and display surfaces use
/// [`LinkId::NO_LINK_SENTINEL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(u32);

impl LinkId {
    /// Sentinel used when a link id has to be rendered as a plain integer.
    pub const NO_LINK_SENTINEL: i64 = -1;

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Integer form of an optional link id, `-1` meaning "no link".
    pub fn to_sentinel(link: Option<LinkId>) -> i64 {
        link.map_or(Self::NO_LINK_SENTINEL, |l| i64::from(l.0))
    }

    /// Parse the integer form; negative values mean "no link".
    pub fn from_sentinel(value: i64) -> Option<LinkId> {
        u32::try_from(value).ok().map(LinkId)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// METADATA
// =============================================================================

/// The user-editable metadata of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFields {
    pub label: String,
    pub author: String,
    pub description: String,
    pub date: String,
}

impl DocumentFields {
    pub fn new(
        label: impl Into<String>,
        author: impl Into<String>,
        description: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            author: author.into(),
            description: description.into(),
            date: date.into(),
        }
    }

    /// Copy of these fields with a different label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl Default for DocumentFields {
    fn default() -> Self {
        Self::new(
            defaults::PLACEHOLDER_LABEL,
            defaults::PLACEHOLDER_AUTHOR,
            defaults::PLACEHOLDER_DESCRIPTION,
            defaults::PLACEHOLDER_DATE,
        )
    }
}

/// An optimistic local edit awaiting server confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    pub identity: DocumentId,
    pub fields: DocumentFields,
}

/// Background colour the page detector should treat as "not a document".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

// =============================================================================
// DOCUMENT RECORD
// =============================================================================

/// Canonical local record of one displayed document.
///
/// Identity is write-once: [`DocumentRegistry`](crate::DocumentRegistry) is
/// the only writer and refuses to replace an assigned identity.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    entity: EntityId,
    identity: Option<DocumentId>,
    name: String,
    path: String,
    fields: DocumentFields,
    link_id: Option<LinkId>,
    linked_documents: Vec<DocumentId>,
    photo: Option<CameraFrame>,
}

impl DocumentRecord {
    /// Speculative record with placeholder metadata.
    pub(crate) fn speculative(entity: EntityId) -> Self {
        Self {
            entity,
            identity: None,
            name: String::new(),
            path: String::new(),
            fields: DocumentFields::default(),
            link_id: None,
            linked_documents: Vec::new(),
            photo: None,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn identity(&self) -> Option<&DocumentId> {
        self.identity.as_ref()
    }

    /// True once the server has assigned an identity.
    pub fn is_durable(&self) -> bool {
        self.identity.is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn fields(&self) -> &DocumentFields {
        &self.fields
    }

    pub fn label(&self) -> &str {
        &self.fields.label
    }

    pub fn author(&self) -> &str {
        &self.fields.author
    }

    pub fn description(&self) -> &str {
        &self.fields.description
    }

    pub fn date(&self) -> &str {
        &self.fields.date
    }

    pub fn link_id(&self) -> Option<LinkId> {
        self.link_id
    }

    /// Documents the server reports as linked to this one.
    pub fn linked_documents(&self) -> &[DocumentId] {
        &self.linked_documents
    }

    pub fn photo(&self) -> Option<&CameraFrame> {
        self.photo.as_ref()
    }

    pub fn has_photo(&self) -> bool {
        self.photo.is_some()
    }

    pub(crate) fn assign_identity(&mut self, identity: DocumentId) {
        debug_assert!(self.identity.is_none() || self.identity.as_ref() == Some(&identity));
        self.identity = Some(identity);
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_path(&mut self, path: String) {
        self.path = path;
    }

    pub(crate) fn set_fields(&mut self, fields: DocumentFields) {
        self.fields = fields;
    }

    pub(crate) fn set_link(&mut self, link: Option<LinkId>) {
        self.link_id = link;
    }

    pub(crate) fn set_linked_documents(&mut self, linked: Vec<DocumentId>) {
        self.linked_documents = linked;
    }

    pub(crate) fn set_photo(&mut self, photo: CameraFrame) {
        self.photo = Some(photo);
    }
}

impl fmt::Display for DocumentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let identity = self
            .identity
            .as_ref()
            .map_or("(unassigned)", DocumentId::as_str);
        writeln!(f, "Unique ID: {}", identity)?;
        writeln!(f, "author: {}", self.fields.author)?;
        writeln!(f, "label: {}", self.fields.label)?;
        writeln!(f, "description: {}", self.fields.description)?;
        writeln!(f, "date: {}", self.fields.date)?;
        write!(f, "photo available: {}", self.has_photo())
    }
}
