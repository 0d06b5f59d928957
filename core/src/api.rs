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

use crate::auth::{AuthError, TokenEndpoint, TokenRequest};
use crate::config::{ApiConfig, AuthConfig};
use crate::enrich::{EnrichError, TrackCatalog};
use crate::models::{
    AccessToken, AudioFeatures, AudioFeaturesResponse, SearchResponse, TokenResponse, TrackObject,
};
use async_trait::async_trait;
use log::debug;
use reqwest::RequestBuilder;
use url::Url;

/// Thin reqwest wrapper over the accounts service and the Web API.
pub struct SpotifyClient {
    http: reqwest::Client,
    accounts_base: Url,
    api_base: Url,
}

impl SpotifyClient {
    pub fn new(api: &ApiConfig, auth: &AuthConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(api.timeout).build()?;
        Ok(Self::with_base_urls(
            http,
            auth.accounts_base.clone(),
            api.api_base.clone(),
        ))
    }

    /// Uses `http` against explicit service roots. Both bases must end in `/`.
    pub fn with_base_urls(http: reqwest::Client, accounts_base: Url, api_base: Url) -> Self {
        Self {
            http,
            accounts_base,
            api_base,
        }
    }

    pub fn token_request(&self, request: &TokenRequest) -> Result<RequestBuilder, AuthError> {
        let url = self
            .accounts_base
            .join("api/token")
            .map_err(|e| AuthError::InvalidUrl(e.to_string()))?;
        Ok(self.http.post(url).form(request))
    }

    pub fn search_request(
        &self,
        token: &AccessToken,
        query: &str,
    ) -> Result<RequestBuilder, EnrichError> {
        let url = self
            .api_base
            .join("search")
            .map_err(|e| EnrichError::Search(e.to_string()))?;
        Ok(self
            .http
            .get(url)
            .bearer_auth(token.secret())
            .query(&[("q", query), ("type", "track"), ("limit", "1")]))
    }

    pub fn audio_features_request(
        &self,
        token: &AccessToken,
        ids: &[String],
    ) -> Result<RequestBuilder, EnrichError> {
        let url = self
            .api_base
            .join("audio-features")
            .map_err(|e| EnrichError::AudioFeatures(e.to_string()))?;
        Ok(self
            .http
            .get(url)
            .bearer_auth(token.secret())
            .query(&[("ids", ids.join(","))]))
    }
}

#[async_trait]
impl TokenEndpoint for SpotifyClient {
    async fn exchange_code(&self, request: &TokenRequest) -> Result<TokenResponse, AuthError> {
        let response = self
            .token_request(request)?
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchange(format!("{status}: {body}")));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("unreadable token response: {e}")))
    }
}

#[async_trait]
impl TrackCatalog for SpotifyClient {
    async fn search_track(
        &self,
        token: &AccessToken,
        query: &str,
    ) -> Result<Option<TrackObject>, EnrichError> {
        debug!("Searching for track {:?}", query);

        let response = self
            .search_request(token, query)?
            .send()
            .await
            .map_err(|e| EnrichError::Search(format!("{query}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichError::Search(format!("{query}: {status}: {body}")));
        }

        let result: SearchResponse = response
            .json()
            .await
            .map_err(|e| EnrichError::Search(format!("{query}: {e}")))?;

        let page = result
            .tracks
            .ok_or_else(|| EnrichError::Search(format!("{query}: response has no tracks page")))?;

        Ok(page.items.into_iter().next())
    }

    async fn audio_features(
        &self,
        token: &AccessToken,
        ids: &[String],
    ) -> Result<Vec<Option<AudioFeatures>>, EnrichError> {
        debug!("Fetching audio features for {} tracks", ids.len());

        let response = self
            .audio_features_request(token, ids)?
            .send()
            .await
            .map_err(|e| EnrichError::AudioFeatures(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichError::AudioFeatures(format!("{status}: {body}")));
        }

        let result: AudioFeaturesResponse = response
            .json()
            .await
            .map_err(|e| EnrichError::AudioFeatures(e.to_string()))?;

        Ok(result.audio_features)
    }
}
