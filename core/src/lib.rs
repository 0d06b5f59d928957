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

pub mod api;
pub mod auth;
pub mod config;
pub mod enrich;
pub mod export;
pub mod models;
pub mod pkce;
pub mod rate_limit;
pub mod storage;

// Re-export key items for convenience
pub use api::SpotifyClient;
pub use auth::{AuthError, Authenticator, LoginStep, UserAgent};
pub use config::AppConfig;
pub use enrich::{load_descriptors, Enricher};
pub use export::{serialize_to_csv, trigger_download, CsvQuoting, FileSink, REPORT_FILE_NAME};
pub use models::{AccessToken, EnrichedRow, TrackDescriptor};
pub use rate_limit::MinIntervalGate;
pub use storage::FileStore;
pub use url::Url;
