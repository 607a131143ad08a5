//! Record catalog service.
//!
//! This crate provides:
//! - [`RecordCatalogService`]: cached catalog reads, validated writes with
//!   cache invalidation, and tracklist enrichment from an external provider
//! - [`MetadataProvider`] with [`MusicBrainzProvider`] and
//!   [`InMemoryMetadataProvider`] implementations

pub mod error;
pub mod musicbrainz;
pub mod provider;
pub mod service;

pub use error::{CatalogError, Result};
pub use musicbrainz::MusicBrainzProvider;
pub use provider::{
    InMemoryMetadataProvider, Medium, MetadataProvider, ReleaseMetadata, ReleaseTrack,
    ScriptedFailure,
};
pub use service::RecordCatalogService;
