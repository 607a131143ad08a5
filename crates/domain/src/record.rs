//! Catalog records and their write models.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::RecordId;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};
use crate::money::Money;

/// Physical or digital release format.
///
/// Parsed case-insensitively, rendered in canonical form (`"CD"`, `"Vinyl"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum RecordFormat {
    Vinyl,
    Cd,
    Cassette,
    Digital,
}

impl RecordFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordFormat::Vinyl => "Vinyl",
            RecordFormat::Cd => "CD",
            RecordFormat::Cassette => "Cassette",
            RecordFormat::Digital => "Digital",
        }
    }
}

impl std::fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vinyl" => Ok(RecordFormat::Vinyl),
            "cd" => Ok(RecordFormat::Cd),
            "cassette" => Ok(RecordFormat::Cassette),
            "digital" => Ok(RecordFormat::Digital),
            other => Err(DomainError::validation(
                "format",
                format!("unknown format '{other}'"),
            )),
        }
    }
}

impl TryFrom<String> for RecordFormat {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RecordFormat> for &'static str {
    fn from(format: RecordFormat) -> Self {
        format.as_str()
    }
}

/// A single track on a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// 1-based position on the release.
    pub position: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_ms: Option<u64>,
}

impl Track {
    pub fn new(position: u32, title: impl Into<String>) -> Self {
        Self {
            position,
            title: title.into(),
            length_ms: None,
        }
    }
}

/// A catalog record.
///
/// `(artist, album, format)` is unique across the catalog. `mbid` is unique
/// only among records that carry one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub artist: String,
    pub album: String,
    pub format: RecordFormat,
    pub price: Money,
    pub qty: u32,
    pub category: String,
    #[serde(default)]
    pub mbid: Option<String>,
    #[serde(default)]
    pub tracklist: Vec<Track>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Builds a new record from validated input, assigning a fresh id.
    pub fn from_new(new: NewRecord) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            artist: new.artist,
            album: new.album,
            format: new.format,
            price: new.price,
            qty: new.qty,
            category: new.category,
            mbid: new.mbid,
            tracklist: new.tracklist,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if this record has the given identity triple.
    pub fn has_identity(&self, artist: &str, album: &str, format: RecordFormat) -> bool {
        self.artist == artist && self.album == album && self.format == format
    }

    /// Applies the present fields of an update and bumps `updated_at`.
    pub fn apply_update(&mut self, update: RecordUpdate) {
        if let Some(artist) = update.artist {
            self.artist = artist;
        }
        if let Some(album) = update.album {
            self.album = album;
        }
        if let Some(format) = update.format {
            self.format = format;
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(qty) = update.qty {
            self.qty = qty;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(mbid) = update.mbid {
            self.mbid = Some(mbid);
        }
        if let Some(tracklist) = update.tracklist {
            self.tracklist = tracklist;
        }
        self.updated_at = Utc::now();
    }
}

/// Input for creating a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub artist: String,
    pub album: String,
    pub format: RecordFormat,
    pub price: Money,
    pub qty: u32,
    pub category: String,
    #[serde(default)]
    pub mbid: Option<String>,
    #[serde(default)]
    pub tracklist: Vec<Track>,
}

impl NewRecord {
    pub fn new(
        artist: impl Into<String>,
        album: impl Into<String>,
        format: RecordFormat,
        price: Money,
        qty: u32,
        category: impl Into<String>,
    ) -> Self {
        Self {
            artist: artist.into(),
            album: album.into(),
            format,
            price,
            qty,
            category: category.into(),
            mbid: None,
            tracklist: Vec::new(),
        }
    }

    pub fn with_mbid(mut self, mbid: impl Into<String>) -> Self {
        self.mbid = Some(mbid.into());
        self
    }

    /// Trims text fields and checks the record invariants.
    pub fn validate(mut self) -> Result<Self> {
        self.artist = required_text("artist", &self.artist)?;
        self.album = required_text("album", &self.album)?;
        self.category = required_text("category", &self.category)?;
        self.mbid = optional_text("mbid", self.mbid.as_deref())?;
        if self.price.is_negative() {
            return Err(DomainError::validation("price", "must not be negative"));
        }
        validate_tracklist(&self.tracklist)?;
        Ok(self)
    }
}

/// Partial update of a record. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdate {
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub format: Option<RecordFormat>,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub qty: Option<u32>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub mbid: Option<String>,
    #[serde(default)]
    pub tracklist: Option<Vec<Track>>,
}

impl RecordUpdate {
    /// Trims text fields and checks the same invariants as [`NewRecord`].
    pub fn validate(mut self) -> Result<Self> {
        if let Some(artist) = self.artist.as_deref() {
            self.artist = Some(required_text("artist", artist)?);
        }
        if let Some(album) = self.album.as_deref() {
            self.album = Some(required_text("album", album)?);
        }
        if let Some(category) = self.category.as_deref() {
            self.category = Some(required_text("category", category)?);
        }
        if let Some(mbid) = self.mbid.as_deref() {
            self.mbid = Some(required_text("mbid", mbid)?);
        }
        if self.price.is_some_and(|p| p.is_negative()) {
            return Err(DomainError::validation("price", "must not be negative"));
        }
        if let Some(tracklist) = &self.tracklist {
            validate_tracklist(tracklist)?;
        }
        Ok(self)
    }
}

fn required_text(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn optional_text(field: &'static str, value: Option<&str>) -> Result<Option<String>> {
    value.map(|v| required_text(field, v)).transpose()
}

fn validate_tracklist(tracks: &[Track]) -> Result<()> {
    for (index, track) in tracks.iter().enumerate() {
        if track.position != index as u32 + 1 {
            return Err(DomainError::validation(
                "tracklist",
                format!(
                    "positions must be sequential from 1 (track {} has position {})",
                    index + 1,
                    track.position
                ),
            ));
        }
        if track.title.trim().is_empty() {
            return Err(DomainError::validation("tracklist", "track titles must not be empty"));
        }
    }
    Ok(())
}
