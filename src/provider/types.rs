use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    Spotify,
    Youtube,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Spotify => f.write_str("Spotify"),
            ProviderKind::Youtube => f.write_str("YouTube"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuthToken {
    /// True once `now` has entered the `skew` window before expiry.
    pub fn expires_within(&self, skew: Duration) -> bool {
        Utc::now() >= self.expires_at - skew
    }

    pub fn is_expired(&self) -> bool {
        self.expires_within(Duration::zero())
    }

    /// Seconds until expiry, negative once expired.
    pub fn remaining_secs(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds()
    }
}

/// Track length in the `{minutes, seconds}` shape songs are stored with.
///
/// Hours are folded into minutes and `seconds` always stays below 60.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackLength {
    pub minutes: u32,
    pub seconds: u32,
}

impl TrackLength {
    pub fn from_parts(hours: u32, minutes: u32, seconds: u32) -> Self {
        let total = u64::from(hours) * 3600 + u64::from(minutes) * 60 + u64::from(seconds);
        Self::from_total_seconds(total)
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::from_total_seconds(ms / 1000)
    }

    pub fn from_total_seconds(total: u64) -> Self {
        Self {
            minutes: u32::try_from(total / 60).unwrap_or(u32::MAX),
            seconds: (total % 60) as u32,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }

    /// Running time of a setlist.
    pub fn total<I>(lengths: I) -> Self
    where
        I: IntoIterator<Item = TrackLength>,
    {
        Self::from_total_seconds(lengths.into_iter().map(|l| l.total_seconds()).sum())
    }
}

impl fmt::Display for TrackLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.minutes, self.seconds)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid track length {0:?}, expected m:ss or h:mm:ss")]
pub struct ParseLengthError(String);

impl FromStr for TrackLength {
    type Err = ParseLengthError;

    /// Accepts `m:ss` and the `h:mm:ss` form interval columns come back as.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseLengthError(s.to_string());
        let parts = s
            .trim()
            .split(':')
            .map(|p| p.parse::<u32>().map_err(|_| err()))
            .collect::<Result<Vec<_>, _>>()?;

        match parts.as_slice() {
            [m, sec] => Ok(Self::from_parts(0, *m, *sec)),
            [h, m, sec] => Ok(Self::from_parts(*h, *m, *sec)),
            _ => Err(err()),
        }
    }
}

/// Normalized metadata for one song link, handed back to the caller to store
/// on the song record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDetails {
    pub title: String,
    pub artist: String,
    pub thumbnail_url: String,
    pub duration: TrackLength,
    #[serde(default)]
    pub preview_url: Option<String>,
}

/// Best Spotify catalog match for an artist/title pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub spotify_url: Option<String>,
    pub preview_url: Option<String>,
    pub album_image_url: Option<String>,
}
