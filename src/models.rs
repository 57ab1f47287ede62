//!
//! Schema models
//! -------------
//! Shapes exchanged with the notebook front end and the remote publishing
//! service, plus the rules every inbound body is checked against before it
//! reaches the client or a handler.

mod contents;
mod fields;
mod published;
mod validate;

pub use contents::{ContentsModel, CONTENT_FORMATS};
pub use fields::{Patch, Timestamp, VersionTag};
pub use published::{
    id_from_link, Collaborator, CreateSharedFileModel, PatchSharedFileModel, PublishedFileIdentifier,
    PublishedFileMetadata, User,
};
pub use validate::{FieldError, ValidationError};

/// A model that can be built from an untrusted JSON body, reporting every
/// offending field on failure.
pub trait Ingest: Sized {
    fn ingest(value: serde_json::Value) -> Result<Self, ValidationError>;
}

impl Ingest for ContentsModel {
    fn ingest(value: serde_json::Value) -> Result<Self, ValidationError> { ContentsModel::from_value(value) }
}

impl Ingest for PatchSharedFileModel {
    fn ingest(value: serde_json::Value) -> Result<Self, ValidationError> { PatchSharedFileModel::from_value(value) }
}

impl Ingest for PublishedFileIdentifier {
    fn ingest(value: serde_json::Value) -> Result<Self, ValidationError> { PublishedFileIdentifier::from_value(value) }
}
