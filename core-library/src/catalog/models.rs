//! Catalogue row types
//!
//! Field names match the column names in [`CatalogTables`](super::CatalogTables)
//! so rows deserialize straight from fetched records.

use crate::error::{LibraryError, Result};
use crate::id::Identifier;
use serde::{Deserialize, Serialize};

/// Performing artist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: Identifier,
    pub name: String,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: Identifier,
    pub artist_id: Identifier,
    pub title: String,
    /// Release year
    pub year: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: Identifier,
    pub album_id: Identifier,
    pub title: String,
    /// Position on the album, starting at 1
    pub track_number: i64,
    pub duration_ms: Option<i64>,
    pub explicit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: Identifier,
    pub name: String,
}

/// Album fields supplied by the caller; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlbum {
    pub title: String,
    pub year: Option<i64>,
}

impl NewAlbum {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            year: None,
        }
    }

    pub fn with_year(mut self, year: i64) -> Self {
        self.year = Some(year);
        self
    }

    /// Validate album data
    pub fn validate(&self) -> Result<()> {
        require_name("title", &self.title)?;
        if let Some(year) = self.year {
            if !(1900..=2100).contains(&year) {
                return Err(invalid("year", format!("Album year {} is out of valid range", year)));
            }
        }
        Ok(())
    }
}

/// Track fields supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrack {
    pub title: String,
    pub track_number: i64,
    pub duration_ms: Option<i64>,
    pub explicit: bool,
}

impl NewTrack {
    pub fn new(title: impl Into<String>, track_number: i64) -> Self {
        Self {
            title: title.into(),
            track_number,
            duration_ms: None,
            explicit: false,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn explicit(mut self) -> Self {
        self.explicit = true;
        self
    }

    /// Validate track data
    pub fn validate(&self) -> Result<()> {
        require_name("title", &self.title)?;
        if self.track_number < 1 {
            return Err(invalid("track_number", "Track number must be at least 1"));
        }
        if matches!(self.duration_ms, Some(ms) if ms < 0) {
            return Err(invalid("duration_ms", "Duration cannot be negative"));
        }
        Ok(())
    }
}

/// A track together with the album and artist it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackListing {
    pub track: Track,
    pub album: AlbumSummary,
    pub artist: ArtistSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumSummary {
    pub title: String,
    pub year: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistSummary {
    pub name: String,
}

pub(crate) fn require_name(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field, format!("{} cannot be empty", field)));
    }
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> LibraryError {
    LibraryError::InvalidInput {
        field: field.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_album_validation() {
        assert!(NewAlbum::new("Kind of Blue").with_year(1959).validate().is_ok());
        assert!(matches!(
            NewAlbum::new("  ").validate(),
            Err(LibraryError::InvalidInput { field, .. }) if field == "title"
        ));
        assert!(NewAlbum::new("Future").with_year(3000).validate().is_err());
    }

    #[test]
    fn test_track_validation() {
        assert!(NewTrack::new("So What", 1).with_duration_ms(545_000).validate().is_ok());
        assert!(NewTrack::new("Zero", 0).validate().is_err());
        assert!(NewTrack::new("Negative", 1)
            .with_duration_ms(-1)
            .validate()
            .is_err());
    }
}
