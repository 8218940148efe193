use anyhow::{Context as _, Result};
use serde::Serialize;

use bandmeta::provider::{extract_id, MediaDetails, PreviewSource, ProviderKind};

use super::utils::{emit, Context};

fn print_details(details: &MediaDetails) {
    println!("{}", details.title);
    println!("  Artist:    {}", details.artist);
    println!("  Duration:  {}", details.duration);
    if !details.thumbnail_url.is_empty() {
        println!("  Thumbnail: {}", details.thumbnail_url);
    }
    match &details.preview_url {
        Some(url) => println!("  Preview:   {}", url),
        None => println!("  Preview:   (none)"),
    }
}

pub async fn resolve(ctx: &Context, url: &str, json: bool) -> Result<()> {
    let resolved = ctx
        .resolver()
        .resolve(url)
        .await
        .with_context(|| format!("Failed to fetch metadata for {}", url))?
        .with_context(|| format!("Not a YouTube or Spotify link: {}", url))?;

    emit(json, &resolved, |r| {
        println!("[{} {}]", r.link.provider, r.link.id);
        print_details(&r.details);
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewReport {
    track_id: String,
    embed_url: String,
    preview_url: Option<String>,
}

/// Scrape the embed page directly, regardless of the `scrape_previews` switch.
pub async fn preview(ctx: &Context, track: &str, json: bool) -> Result<()> {
    let track_id = extract_id(track, ProviderKind::Spotify).unwrap_or_else(|| track.to_string());
    let scraper = ctx.embed_previews();

    let report = PreviewReport {
        embed_url: scraper.embed_url(&track_id),
        preview_url: scraper.preview_url(&track_id).await,
        track_id,
    };

    emit(json, &report, |r| match &r.preview_url {
        Some(url) => println!("{}", url),
        None => println!("No preview found on {}", r.embed_url),
    })
}

pub async fn search(ctx: &Context, artist: &str, title: &str, json: bool) -> Result<()> {
    let found = ctx
        .spotify()
        .search_best_match(artist, title)
        .await
        .context("Spotify search failed")?;

    emit(json, &found, |found| match found {
        Some(m) => {
            println!("{} - {}", m.artist_name, m.track_name);
            println!("  Track ID: {}", m.track_id);
            if let Some(url) = &m.spotify_url {
                println!("  Spotify:  {}", url);
            }
            if let Some(url) = &m.album_image_url {
                println!("  Cover:    {}", url);
            }
            match &m.preview_url {
                Some(url) => println!("  Preview:  {}", url),
                None => println!("  Preview:  (none)"),
            }
        }
        None => println!("No match for {} - {}", artist, title),
    })
}
