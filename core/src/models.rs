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

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Bearer credential returned by the token endpoint. Lives only in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Body of a successful `POST /api/token`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

/// One input row. Must carry a string `name` (the search query); every
/// other field is passed through to the report untouched and in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct TrackDescriptor {
    fields: Map<String, Value>,
}

impl TrackDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::String(name.into()));
        Self { fields }
    }

    /// The text sent to the search endpoint.
    pub fn query(&self) -> &str {
        self.fields
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl TryFrom<Map<String, Value>> for TrackDescriptor {
    type Error = String;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        match fields.get("name") {
            Some(Value::String(_)) => Ok(Self { fields }),
            Some(other) => Err(format!("track `name` must be a string, got {other}")),
            None => Err("track descriptor is missing the `name` field".to_string()),
        }
    }
}

impl From<TrackDescriptor> for Map<String, Value> {
    fn from(descriptor: TrackDescriptor) -> Self {
        descriptor.fields
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// `GET /search` response. Only the `tracks` page is requested.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub tracks: Option<Page<TrackObject>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Followers {
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ArtistObject {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub followers: Option<Followers>,
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(default)]
    pub genres: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AlbumObject {
    pub name: String,
    pub release_date: String,
}

/// A track as returned inside search results. Only the artist list may be
/// partial; every other field is required and a hit without one is rejected.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrackObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
    pub album: AlbumObject,
    pub duration_ms: u64,
    pub explicit: bool,
    pub popularity: u32,
}

/// Flat projection of a [`TrackObject`]. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackMetadata {
    pub id: String,
    #[serde(rename = "track_name")]
    pub name: String,
    pub artists_name: String,
    pub artists_follower: String,
    pub artists_popularity: String,
    pub artists_genres: String,
    pub album_name: String,
    pub album_release_date: String,
    pub duration_ms: u64,
    pub explicit: bool,
    pub popularity: u32,
}

impl fmt::Display for TrackMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} - {} (Album: {})",
            self.id, self.name, self.artists_name, self.album_name
        )
    }
}

/// One entry of `GET /audio-features`. The id is only used to check
/// ordering and is not emitted as a column.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AudioFeatures {
    #[serde(skip_serializing)]
    pub id: String,
    pub acousticness: f64,
    pub danceability: f64,
    pub energy: f64,
    pub instrumentalness: f64,
    pub key: i32,
    pub liveness: f64,
    pub loudness: f64,
    pub mode: i32,
    pub speechiness: f64,
    pub tempo: f64,
    pub time_signature: i32,
    pub valence: f64,
}

/// Unknown ids come back as `null` entries.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioFeaturesResponse {
    pub audio_features: Vec<Option<AudioFeatures>>,
}

/// Descriptor fields, then metadata, then audio features, as one ordered record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EnrichedRow(Map<String, Value>);

impl EnrichedRow {
    /// Merges the three parts left to right. A later column whose key is
    /// already present is dropped so descriptor fields reach the output unmodified.
    pub fn merge(
        descriptor: &TrackDescriptor,
        metadata: &TrackMetadata,
        features: &AudioFeatures,
    ) -> Self {
        let mut fields = descriptor.fields().clone();

        for (key, value) in object_fields(metadata)
            .into_iter()
            .chain(object_fields(features))
        {
            if fields.contains_key(&key) {
                warn!(
                    "Column '{}' of track {} collides with an input field; keeping the input value",
                    key, metadata.id
                );
                continue;
            }
            fields.insert(key, value);
        }

        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

impl From<Map<String, Value>> for EnrichedRow {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

fn object_fields<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_features(id: &str) -> AudioFeatures {
        AudioFeatures {
            id: id.to_string(),
            acousticness: 0.1,
            danceability: 0.7,
            energy: 0.8,
            instrumentalness: 0.0,
            key: 5,
            liveness: 0.12,
            loudness: -5.5,
            mode: 1,
            speechiness: 0.04,
            tempo: 118.2,
            time_signature: 4,
            valence: 0.6,
        }
    }

    fn sample_metadata() -> TrackMetadata {
        TrackMetadata {
            id: "T1".to_string(),
            name: "Song X".to_string(),
            artists_name: "A;B".to_string(),
            artists_follower: "10".to_string(),
            artists_popularity: "5".to_string(),
            artists_genres: "pop".to_string(),
            album_name: "Album".to_string(),
            album_release_date: "2020-01-01".to_string(),
            duration_ms: 200_000,
            explicit: false,
            popularity: 42,
        }
    }

    #[test]
    fn test_descriptor_requires_string_name() {
        let missing: Result<TrackDescriptor, _> = serde_json::from_value(json!({"artist": "A"}));
        assert!(missing.is_err());

        let numeric: Result<TrackDescriptor, _> = serde_json::from_value(json!({"name": 7}));
        assert!(numeric.is_err());

        let ok: TrackDescriptor =
            serde_json::from_value(json!({"rank": 1, "name": "Song X"})).unwrap();
        assert_eq!(ok.query(), "Song X");
    }

    #[test]
    fn test_descriptor_keeps_field_order() {
        let descriptor: TrackDescriptor =
            serde_json::from_value(json!({"rank": 1, "name": "Song X", "note": "live"})).unwrap();
        let keys: Vec<&String> = descriptor.fields().keys().collect();
        assert_eq!(keys, ["rank", "name", "note"]);
    }

    #[test]
    fn test_merge_orders_descriptor_metadata_features() {
        let descriptor: TrackDescriptor =
            serde_json::from_value(json!({"name": "Song X", "rank": 3})).unwrap();
        let row = EnrichedRow::merge(&descriptor, &sample_metadata(), &sample_features("T1"));

        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(&keys[..3], ["name", "rank", "id"]);
        assert_eq!(keys[3], "track_name");
        assert_eq!(keys[13], "acousticness");
        assert_eq!(keys.last(), Some(&"valence"));
        // The features id is not a column.
        assert_eq!(keys.iter().filter(|k| **k == "id").count(), 1);
        assert_eq!(row.get("rank"), Some(&json!(3)));
        assert_eq!(row.get("key"), Some(&json!(5)));
    }

    #[test]
    fn test_merge_keeps_descriptor_value_on_collision() {
        let descriptor: TrackDescriptor =
            serde_json::from_value(json!({"name": "Song X", "popularity": "mine"})).unwrap();
        let row = EnrichedRow::merge(&descriptor, &sample_metadata(), &sample_features("T1"));
        assert_eq!(row.get("popularity"), Some(&json!("mine")));
        assert_eq!(row.get("name"), Some(&json!("Song X")));
    }

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("BQD-very-secret");
        assert_eq!(format!("{:?}", token), "AccessToken(<redacted>)");
        assert_eq!(token.secret(), "BQD-very-secret");
    }

    #[test]
    fn test_metadata_display() {
        let display = format!("{}", sample_metadata());
        assert_eq!(display, "[T1] Song X - A;B (Album: Album)");
    }

    #[test]
    fn test_search_response_parses_partial_artists() {
        let body = json!({
            "tracks": {
                "href": "https://api.spotify.com/v1/search?query=x",
                "items": [{
                    "id": "T1",
                    "name": "Song X",
                    "artists": [
                        {"name": "A", "followers": {"href": null, "total": 10}, "popularity": 5, "genres": ["pop"]},
                        {"name": "B"}
                    ],
                    "album": {"name": "Album", "release_date": "2020"},
                    "duration_ms": 1000,
                    "explicit": true,
                    "popularity": 9
                }]
            }
        });

        let parsed: SearchResponse = serde_json::from_value(body).unwrap();
        let items = parsed.tracks.unwrap().items;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].artists.len(), 2);
        assert!(items[0].artists[1].followers.is_none());
        assert!(items[0].explicit);
    }

    #[test]
    fn test_search_hit_without_required_fields_is_rejected() {
        let complete = json!({
            "id": "T1",
            "name": "Song X",
            "artists": [{"name": "A"}],
            "album": {"name": "Album", "release_date": "2020"},
            "duration_ms": 1000,
            "explicit": false,
            "popularity": 9
        });
        assert!(serde_json::from_value::<TrackObject>(complete.clone()).is_ok());

        for field in ["popularity", "duration_ms", "explicit", "album"] {
            let mut partial = complete.clone();
            partial.as_object_mut().unwrap().remove(field);
            let err = serde_json::from_value::<TrackObject>(partial).unwrap_err();
            assert!(err.to_string().contains(field), "{field}: {err}");
        }

        let mut no_release = complete;
        no_release["album"].as_object_mut().unwrap().remove("release_date");
        assert!(serde_json::from_value::<TrackObject>(no_release).is_err());

        let bare = json!({"tracks": {"items": [{"id": "T1", "name": "Song X", "artists": [{"name": "A"}]}]}});
        assert!(serde_json::from_value::<SearchResponse>(bare).is_err());
    }

    #[test]
    fn test_audio_features_response_allows_null_entries() {
        let body = json!({"audio_features": [null]});
        let parsed: AudioFeaturesResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.audio_features, vec![None]);
    }
}
