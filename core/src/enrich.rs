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

use crate::models::{
    AccessToken, AudioFeatures, EnrichedRow, TrackDescriptor, TrackMetadata, TrackObject,
};
use crate::rate_limit::RateGate;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Largest id list the audio-features endpoint accepts in one call.
pub const MAX_AUDIO_FEATURE_IDS: usize = 100;

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("Track search failed: {0}")]
    Search(String),
    #[error("No track found for query: {0}")]
    NotFound(String),
    #[error("Audio feature lookup failed: {0}")]
    AudioFeatures(String),
    #[error("Invalid track list: {0}")]
    InvalidInput(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The two Web API lookups the pipeline depends on.
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    /// Best match for `query`, or `None` when the search has no items.
    async fn search_track(
        &self,
        token: &AccessToken,
        query: &str,
    ) -> Result<Option<TrackObject>, EnrichError>;

    /// Raw batch response, one entry per submitted id.
    async fn audio_features(
        &self,
        token: &AccessToken,
        ids: &[String],
    ) -> Result<Vec<Option<AudioFeatures>>, EnrichError>;
}

/// Resolves descriptors into enriched rows, one search at a time.
pub struct Enricher {
    catalog: Arc<dyn TrackCatalog>,
    gate: Arc<dyn RateGate>,
}

impl Enricher {
    pub fn new(catalog: Arc<dyn TrackCatalog>, gate: Arc<dyn RateGate>) -> Self {
        Self { catalog, gate }
    }

    /// Searches for `query` with `limit=1`, trusting the provider's ranking.
    pub async fn resolve_track(
        &self,
        token: &AccessToken,
        query: &str,
    ) -> Result<Option<TrackObject>, EnrichError> {
        self.gate.wait().await;
        self.catalog.search_track(token, query).await
    }

    /// One batched lookup. The result is checked to line up with `ids`
    /// one-to-one and in order.
    pub async fn fetch_audio_features(
        &self,
        token: &AccessToken,
        ids: &[String],
    ) -> Result<Vec<AudioFeatures>, EnrichError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if ids.len() > MAX_AUDIO_FEATURE_IDS {
            warn!(
                "Requesting audio features for {} ids; the API accepts at most {}",
                ids.len(),
                MAX_AUDIO_FEATURE_IDS
            );
        }

        let entries = self.catalog.audio_features(token, ids).await?;
        if entries.len() != ids.len() {
            return Err(EnrichError::AudioFeatures(format!(
                "expected {} entries, got {}",
                ids.len(),
                entries.len()
            )));
        }

        ids.iter()
            .zip(entries)
            .map(|(id, entry)| match entry {
                Some(features) if features.id == *id => Ok(features),
                Some(features) => Err(EnrichError::AudioFeatures(format!(
                    "entry for {} came back as {}",
                    id, features.id
                ))),
                None => Err(EnrichError::AudioFeatures(format!("no audio features for {id}"))),
            })
            .collect()
    }

    /// Search every descriptor in order, fetch features in one batch, and
    /// merge by position. The first failure aborts the whole report.
    pub async fn build_report(
        &self,
        token: &AccessToken,
        descriptors: &[TrackDescriptor],
    ) -> Result<Vec<EnrichedRow>, EnrichError> {
        let mut metadata = Vec::with_capacity(descriptors.len());

        for (i, descriptor) in descriptors.iter().enumerate() {
            let query = descriptor.query();
            let track = self
                .resolve_track(token, query)
                .await?
                .ok_or_else(|| EnrichError::NotFound(query.to_string()))?;

            let meta = to_metadata(&track);
            info!("({}/{}) {:?} -> {}", i + 1, descriptors.len(), query, meta);
            metadata.push(meta);
        }

        let ids: Vec<String> = metadata.iter().map(|m| m.id.clone()).collect();
        let features = self.fetch_audio_features(token, &ids).await?;
        debug!("Merging {} rows", features.len());

        Ok(descriptors
            .iter()
            .zip(&metadata)
            .zip(&features)
            .map(|((descriptor, meta), feat)| EnrichedRow::merge(descriptor, meta, feat))
            .collect())
    }
}

/// Flattens a search hit. Artist attributes are joined with `;` and an
/// artist missing a value contributes nothing to that column.
pub fn to_metadata(track: &TrackObject) -> TrackMetadata {
    let artists = &track.artists;
    let join = |values: Vec<String>| values.join(";");

    TrackMetadata {
        id: track.id.clone(),
        name: track.name.clone(),
        artists_name: join(artists.iter().filter_map(|a| a.name.clone()).collect()),
        artists_follower: join(
            artists
                .iter()
                .filter_map(|a| a.followers.as_ref().and_then(|f| f.total))
                .map(|n| n.to_string())
                .collect(),
        ),
        artists_popularity: join(
            artists
                .iter()
                .filter_map(|a| a.popularity)
                .map(|p| p.to_string())
                .collect(),
        ),
        artists_genres: join(
            artists
                .iter()
                .filter_map(|a| a.genres.as_ref())
                .flatten()
                .cloned()
                .collect(),
        ),
        album_name: track.album.name.clone(),
        album_release_date: track.album.release_date.clone(),
        duration_ms: track.duration_ms,
        explicit: track.explicit,
        popularity: track.popularity,
    }
}

/// Reads the track list: a JSON array of objects, each with a string `name`.
pub fn load_descriptors(path: &Path) -> Result<Vec<TrackDescriptor>, EnrichError> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| EnrichError::InvalidInput(format!("{}: {}", path.display(), e)))
}
