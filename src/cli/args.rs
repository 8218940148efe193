use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// bandmeta - song metadata for band playlists and setlists
///
/// Resolves YouTube and Spotify links to title, artist, thumbnail,
/// duration and a playable preview.
#[derive(Parser, Debug)]
#[command(name = "bandmeta")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding config.toml and stored credentials
    #[arg(short = 'd', long, global = true, default_value = ".bandmeta")]
    pub data_dir: PathBuf,

    /// Print results as JSON
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in to Spotify with the authorization-code flow
    Auth,
    /// Delete the stored Spotify token
    Logout,
    /// Show the Spotify token state
    Status,
    /// Fetch metadata for a YouTube or Spotify link
    Resolve {
        /// e.g. https://youtu.be/dQw4w9WgXcQ or https://open.spotify.com/track/3n3P...
        url: String,
    },
    /// Scrape the preview URL from a track's embed page
    Preview {
        /// Spotify track ID or URL
        track: String,
    },
    /// Find the best Spotify match for a song
    Search {
        #[arg(short, long)]
        artist: String,
        #[arg(short, long)]
        title: String,
    },
    /// Add up song lengths (m:ss) into a setlist running time
    Total {
        #[arg(required = true)]
        lengths: Vec<String>,
    },
}
