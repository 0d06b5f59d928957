/*
    spotify-features-rs | Rust CLI tool to export track metadata and audio features.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use features_core::{
    load_descriptors, serialize_to_csv, trigger_download, AccessToken, AppConfig, AuthError,
    Authenticator, CsvQuoting, EnrichedRow, Enricher, FileSink, FileStore, LoginStep,
    MinIntervalGate, SpotifyClient, TrackDescriptor, Url, UserAgent, REPORT_FILE_NAME,
};
use log::debug;
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "spotify-features")]
#[command(about = "Export Spotify metadata and audio features for a list of tracks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Starts the PKCE login and prints the authorization URL.
    Login,
    /// Finishes the login and exports the CSV report.
    Export {
        /// The URL Spotify redirected to after approval. Without it, a new login
        /// is started and the URL is read from stdin.
        #[arg(long)]
        callback: Option<String>,

        /// JSON file with the tracks to look up (overrides FEATURES_TRACKS_FILE)
        #[arg(long)]
        tracks: Option<PathBuf>,

        /// Directory the CSV is written to (overrides FEATURES_OUT_DIR)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Quote fields that contain commas, quotes or newlines (RFC 4180).
        /// By default values are written verbatim.
        #[arg(long)]
        quote_fields: bool,

        /// Also write the merged rows to a JSON file (e.g., --json=report.json)
        #[arg(long)]
        json: Option<String>,
    },
}

/// Prints the authorization URL for the user to open.
struct TerminalAgent;

impl UserAgent for TerminalAgent {
    fn navigate(&self, url: &Url) -> Result<(), AuthError> {
        let mut out = io::stdout().lock();
        writeln!(
            out,
            "\nOpen this URL in your browser and approve access:\n\n   {}\n",
            url
        )
        .map_err(|e| AuthError::Navigation(e.to_string()))
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if dotenv().is_err() {
        // Silently ignore
    }

    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Login => handle_login(&config),
        Commands::Export {
            callback,
            tracks,
            out_dir,
            quote_fields,
            json,
        } => {
            let quoting = if quote_fields {
                CsvQuoting::Rfc4180
            } else {
                CsvQuoting::Never
            };
            handle_export(
                &config,
                callback.as_deref(),
                tracks,
                out_dir,
                quoting,
                json.as_deref(),
            )
            .await;
        }
    }
}

fn get_client(config: &AppConfig) -> Arc<SpotifyClient> {
    match SpotifyClient::new(&config.api, &config.auth) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Error initializing HTTP client: {}", e);
            process::exit(1);
        }
    }
}

fn get_authenticator(config: &AppConfig, client: Arc<SpotifyClient>) -> Authenticator {
    let store = Arc::new(FileStore::new(&config.report.verifier_cache));
    Authenticator::new(config.auth.clone(), store, client)
}

fn handle_login(config: &AppConfig) {
    let auth = get_authenticator(config, get_client(config));

    if let Err(e) = auth.begin_login(&TerminalAgent) {
        eprintln!("[ERROR] Login failed: {}", e);
        process::exit(1);
    }

    println!("After approving, run:");
    println!("   spotify-features export --callback '<the URL you were redirected to>'");
}

async fn handle_export(
    config: &AppConfig,
    callback: Option<&str>,
    tracks: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    quoting: CsvQuoting,
    json_path: Option<&str>,
) {
    let client = get_client(config);
    let auth = get_authenticator(config, client.clone());

    let tracks_path = tracks.unwrap_or_else(|| config.report.tracks_file.clone());
    let (descriptors, token) = match prepare_export(&auth, &tracks_path, callback).await {
        Ok(ready) => ready,
        Err(e) => {
            eprintln!();
            eprintln!("[ERROR] {:#}", e);
            process::exit(1);
        }
    };

    println!(
        "Looking up {} tracks from {} ...",
        descriptors.len(),
        tracks_path.display()
    );

    let enricher = Enricher::new(
        client,
        Arc::new(MinIntervalGate::new(config.api.search_interval)),
    );

    let rows = match enricher.build_report(&token, &descriptors).await {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!();
            eprintln!("[ERROR] Report failed: {}", e);
            process::exit(1);
        }
    };

    let csv_text = match serialize_to_csv(&rows, quoting) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            process::exit(1);
        }
    };

    let sink = FileSink::new(out_dir.unwrap_or_else(|| config.report.out_dir.clone()));
    match trigger_download(&sink, &csv_text, REPORT_FILE_NAME) {
        Ok(path) => {
            println!();
            println!("---------------------------------------------------");
            println!("EXPORT COMPLETE");
            println!("---------------------------------------------------");
            println!("Tracks exported: {}", rows.len());
            println!("Columns:         {}", rows[0].keys().count());
            println!("Quoting:         {:?}", quoting);
            println!("---------------------------------------------------");
            println!("[SAVED] CSV saved to: {}", path.display());
        }
        Err(e) => {
            eprintln!("[ERROR] Failed to save CSV: {}", e);
            process::exit(1);
        }
    }

    if let Some(path) = json_path {
        match write_json(&rows, path) {
            Ok(()) => println!("[SAVED] JSON copy saved to: {}", path),
            Err(e) => {
                eprintln!();
                eprintln!("[ERROR] {:#}", e);
                process::exit(1);
            }
        }
    }
}

/// Reads the track list, then authenticates. The list is checked first so a
/// bad file does not spend the single-use authorization code.
async fn prepare_export(
    auth: &Authenticator,
    tracks_path: &Path,
    callback: Option<&str>,
) -> anyhow::Result<(Vec<TrackDescriptor>, AccessToken)> {
    let descriptors = load_descriptors(tracks_path)
        .with_context(|| format!("could not read '{}'", tracks_path.display()))?;
    let token = authenticate(auth, callback)
        .await
        .context("authentication failed")?;
    Ok((descriptors, token))
}

/// Entry selection: a callback carrying `code` completes the login,
/// anything else starts it.
async fn authenticate(
    auth: &Authenticator,
    callback: Option<&str>,
) -> anyhow::Result<AccessToken> {
    let step = match callback {
        Some(url) => LoginStep::from_callback_url(url)?,
        None => LoginStep::Begin,
    };

    let code = match step {
        LoginStep::Complete { code } => code,
        LoginStep::Begin => {
            auth.begin_login(&TerminalAgent)?;
            if callback.is_some() {
                bail!("the callback URL has no authorization code; a new login was started");
            }
            match LoginStep::from_callback_url(&prompt_for_callback()?)? {
                LoginStep::Complete { code } => code,
                LoginStep::Begin => bail!("the entered URL has no authorization code"),
            }
        }
    };

    debug!("Exchanging authorization code");
    Ok(auth.complete_login(&code).await?)
}

fn prompt_for_callback() -> anyhow::Result<String> {
    print!("Enter the URL you were redirected to: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read the redirect URL from stdin")?;
    Ok(line.trim().to_string())
}

fn write_json(rows: &[EnrichedRow], path: &str) -> anyhow::Result<()> {
    let json_content =
        serde_json::to_string_pretty(rows).context("failed to serialize the report")?;
    let mut file =
        File::create(path).with_context(|| format!("failed to create file '{}'", path))?;
    file.write_all(json_content.as_bytes())
        .with_context(|| format!("failed to write report to '{}'", path))?;
    Ok(())
}
