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

use crate::config::AuthConfig;
use crate::models::{AccessToken, TokenResponse};
use crate::pkce::CodeVerifier;
use crate::storage::{KeyValueStore, StoreError, VERIFIER_KEY};
use async_trait::async_trait;
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use url::{form_urlencoded, Url};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No stored code verifier; start the login again from the same machine")]
    MissingVerifier,
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    #[error("Verifier storage failed: {0}")]
    Storage(#[from] StoreError),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Could not hand the authorization URL to the user agent: {0}")]
    Navigation(String),
}

/// Form body of `POST /api/token` for the authorization-code grant.
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest {
    pub client_id: String,
    pub grant_type: &'static str,
    pub code: String,
    pub redirect_uri: String,
    pub code_verifier: String,
}

/// Whatever trades an authorization code for a token.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn exchange_code(&self, request: &TokenRequest) -> Result<TokenResponse, AuthError>;
}

/// Sends the user to the authorization page. A browser would follow the
/// URL; a terminal prints it.
pub trait UserAgent {
    fn navigate(&self, url: &Url) -> Result<(), AuthError>;
}

/// Which half of the handshake the current invocation should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStep {
    /// No authorization code yet; redirect to the provider.
    Begin,
    /// Back from the provider with a code to exchange.
    Complete { code: String },
}

impl LoginStep {
    /// Decides from a query string (with or without the leading `?`).
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, value)| key == "code" && !value.is_empty())
            .map(|(_, code)| LoginStep::Complete {
                code: code.into_owned(),
            })
            .unwrap_or(LoginStep::Begin)
    }

    /// Decides from the full URL the provider redirected to.
    pub fn from_callback_url(callback: &str) -> Result<Self, AuthError> {
        let url = Url::parse(callback.trim())
            .map_err(|e| AuthError::InvalidUrl(format!("{callback}: {e}")))?;
        Ok(Self::from_query(url.query().unwrap_or_default()))
    }
}

/// Runs the Authorization Code + PKCE handshake.
pub struct Authenticator {
    config: AuthConfig,
    store: Arc<dyn KeyValueStore>,
    tokens: Arc<dyn TokenEndpoint>,
}

impl Authenticator {
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn KeyValueStore>,
        tokens: Arc<dyn TokenEndpoint>,
    ) -> Self {
        Self {
            config,
            store,
            tokens,
        }
    }

    /// Generates and stores a fresh verifier, then sends `agent` to the
    /// authorization page. Any verifier from an earlier attempt is replaced.
    pub fn begin_login(&self, agent: &dyn UserAgent) -> Result<(), AuthError> {
        let verifier = CodeVerifier::generate();
        self.store.set(VERIFIER_KEY, verifier.as_str())?;
        debug!("Stored new code verifier ({} chars)", verifier.as_str().len());

        let url = self.authorize_url(&verifier)?;
        info!("Redirecting to {}", url);
        agent.navigate(&url)
    }

    /// Exchanges `code` plus the stored verifier for an access token.
    /// The verifier is removed from the store before the exchange, so a
    /// failed exchange requires a new login.
    pub async fn complete_login(&self, code: &str) -> Result<AccessToken, AuthError> {
        let verifier = self
            .store
            .get(VERIFIER_KEY)?
            .ok_or(AuthError::MissingVerifier)?;
        self.store.remove(VERIFIER_KEY)?;

        let request = TokenRequest {
            client_id: self.config.client_id.clone(),
            grant_type: "authorization_code",
            code: code.to_string(),
            redirect_uri: self.config.redirect_uri.clone(),
            code_verifier: verifier,
        };

        let response = self.tokens.exchange_code(&request).await?;
        let token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::TokenExchange("response has no access_token".to_string()))?;

        info!(
            "Obtained access token (type: {}, expires in: {}s)",
            response.token_type.as_deref().unwrap_or("unknown"),
            response.expires_in.unwrap_or_default()
        );

        Ok(AccessToken::new(token))
    }

    /// `{accounts}/authorize?...` for the given verifier. Spaces are encoded
    /// as `%20` rather than `+`.
    pub fn authorize_url(&self, verifier: &CodeVerifier) -> Result<Url, AuthError> {
        let challenge = verifier.challenge();
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", self.config.scope.as_str()),
            ("code_challenge_method", "S256"),
            ("code_challenge", challenge.as_str()),
        ];

        let query = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, encode_component(value)))
            .collect::<Vec<_>>()
            .join("&");

        let mut url = self
            .config
            .accounts_base
            .join("authorize")
            .map_err(|e| AuthError::InvalidUrl(e.to_string()))?;
        url.set_query(Some(&query));
        Ok(url)
    }
}

fn encode_component(value: &str) -> String {
    // byte_serialize turns a literal '+' into %2B, so any '+' left is a space.
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
