use anyhow::{Context as _, Result};
use serde::Serialize;

use bandmeta::provider::TrackLength;

use super::utils::emit;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetlistTotal {
    songs: usize,
    total: String,
    total_seconds: u64,
}

fn sum_lengths(lengths: &[String]) -> Result<TrackLength> {
    let parsed = lengths
        .iter()
        .map(|raw| {
            raw.parse::<TrackLength>()
                .with_context(|| format!("Invalid song length {:?}", raw))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(TrackLength::total(parsed))
}

pub fn run(lengths: &[String], json: bool) -> Result<()> {
    let total = sum_lengths(lengths)?;
    let report = SetlistTotal {
        songs: lengths.len(),
        total: total.to_string(),
        total_seconds: total.total_seconds(),
    };

    emit(json, &report, |r| {
        println!("{} songs, {} total", r.songs, r.total)
    })
}
