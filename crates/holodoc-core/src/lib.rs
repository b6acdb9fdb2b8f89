//! # holodoc-core
//!
//! Core types, traits, and state for HoloDoc.
//!
//! This crate provides:
//! - Document identity and record types ([`DocumentRecord`], [`DocumentId`], [`EntityId`])
//! - The [`DocumentRegistry`] with optimistic edits and server reconciliation
//! - The [`LinkGraph`] grouping documents into link groups
//! - Wire types and the [`DocumentService`] trait for the matching server
//! - Camera frame encoding, single-field edit sessions, and the event bus

pub mod defaults;
pub mod edit;
pub mod error;
pub mod events;
pub mod frame;
pub mod links;
pub mod logging;
pub mod models;
pub mod registry;
pub mod traits;
pub mod wire;

// Re-export commonly used types at crate root
pub use edit::{DocumentField, FieldEditSession, InputLayout};
pub use error::{Error, Result};
pub use events::{DocumentEvent, EventBus, EventEnvelope};
pub use frame::CameraFrame;
pub use links::{LinkGraph, LinkOutcome};
pub use models::*;
pub use registry::{DocumentRegistry, Reconciliation};
pub use traits::DocumentService;
pub use wire::{
    Answer, ConnectedAnswer, DocumentAnswer, Endpoint, Reply, SimpleAnswer, SuccessPolicy,
    SyncFailure,
};
