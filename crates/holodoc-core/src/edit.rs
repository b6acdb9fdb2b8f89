//! Single-field edit sessions.
//!
//! A [`FieldEditSession`] lives for exactly one edit of one field. It is
//! consumed by [`submit`](FieldEditSession::submit) or
//! [`close`](FieldEditSession::close), so text typed after the session ended
//! cannot leak into another field.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::models::{DocumentFields, DocumentRecord, EntityId};

/// Editable document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentField {
    Label,
    Author,
    Description,
    Date,
}

impl DocumentField {
    /// Keyboard layout the presentation should offer for this field.
    pub fn layout(&self) -> InputLayout {
        match self {
            DocumentField::Date => InputLayout::Symbol,
            _ => InputLayout::Alpha,
        }
    }

    fn get<'a>(&self, fields: &'a DocumentFields) -> &'a str {
        match self {
            DocumentField::Label => &fields.label,
            DocumentField::Author => &fields.author,
            DocumentField::Description => &fields.description,
            DocumentField::Date => &fields.date,
        }
    }

    fn set(&self, fields: &mut DocumentFields, value: String) {
        match self {
            DocumentField::Label => fields.label = value,
            DocumentField::Author => fields.author = value,
            DocumentField::Description => fields.description = value,
            DocumentField::Date => fields.date = value,
        }
    }
}

impl FromStr for DocumentField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "label" => Ok(Self::Label),
            "author" => Ok(Self::Author),
            "description" | "desc" => Ok(Self::Description),
            "date" => Ok(Self::Date),
            other => Err(Error::InvalidInput(format!("unknown field: {}", other))),
        }
    }
}

impl fmt::Display for DocumentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Label => write!(f, "label"),
            Self::Author => write!(f, "author"),
            Self::Description => write!(f, "description"),
            Self::Date => write!(f, "date"),
        }
    }
}

/// Layout hint for the on-screen keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    Alpha,
    Symbol,
}

/// Edit of one field of one document.
#[derive(Debug)]
pub struct FieldEditSession {
    entity: EntityId,
    field: DocumentField,
    base: DocumentFields,
    text: String,
}

impl FieldEditSession {
    /// Start editing `field` of `record`, seeded with its current value.
    pub fn open(record: &DocumentRecord, field: DocumentField) -> Self {
        let base = record.fields().clone();
        let text = field.get(&base).to_string();
        Self {
            entity: record.entity(),
            field,
            base,
            text,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn field(&self) -> DocumentField {
        self.field
    }

    pub fn layout(&self) -> InputLayout {
        self.field.layout()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the edited text. Empty content is ignored.
    pub fn update_text(&mut self, content: &str) {
        if !content.is_empty() {
            self.text = content.to_string();
        }
    }

    /// End the session, returning the record's fields with the edit applied.
    pub fn submit(self) -> DocumentFields {
        let mut fields = self.base;
        self.field.set(&mut fields, self.text);
        fields
    }

    /// End the session without changes.
    pub fn close(self) {}
}
