//! Pulls canonical video/track IDs out of pasted YouTube and Spotify links.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::provider::ProviderKind;

const YOUTUBE_ID_LEN: usize = 11;

static YOUTUBE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*((youtu\.be/)|(v/)|(/u/[A-Za-z0-9_]/)|(embed/)|(watch\?))\??v?=?([^#&?]*).*")
        .expect("youtube link pattern")
});

static SPOTIFY_TRACK_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"spotify\.com/(?:intl-[a-z]+/)?track/([a-zA-Z0-9]+)")
        .expect("spotify link pattern")
});

/// A provider ID derived from a link. Never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalLinkIdentifier {
    pub provider: ProviderKind,
    pub id: String,
}

/// Which platform a stored song link points at, judged by host only.
pub fn detect_platform(link: &str) -> Option<ProviderKind> {
    if link.contains("youtube.com") || link.contains("youtu.be") {
        Some(ProviderKind::Youtube)
    } else if link.contains("spotify.com") {
        Some(ProviderKind::Spotify)
    } else {
        None
    }
}

/// Extract the provider ID from `url`, or `None` when the link does not match
/// any supported shape.
pub fn extract_id(url: &str, provider: ProviderKind) -> Option<String> {
    match provider {
        ProviderKind::Youtube => youtube_video_id(url),
        ProviderKind::Spotify => spotify_track_id(url),
    }
}

/// Detect the platform and extract its ID in one step.
pub fn parse_link(url: &str) -> Option<ExternalLinkIdentifier> {
    let provider = detect_platform(url)?;
    extract_id(url, provider).map(|id| ExternalLinkIdentifier { provider, id })
}

fn youtube_video_id(url: &str) -> Option<String> {
    let caps = YOUTUBE_ID.captures(url)?;
    let id = caps.get(7)?.as_str();
    // A partial match is worse than none: anything but exactly 11 chars is rejected.
    (id.chars().count() == YOUTUBE_ID_LEN).then(|| id.to_string())
}

fn spotify_track_id(url: &str) -> Option<String> {
    SPOTIFY_TRACK_ID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
