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

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};
use std::fmt;

/// Shortest verifier allowed by RFC 7636.
pub const MIN_VERIFIER_LEN: usize = 43;
/// Longest verifier allowed by RFC 7636. Also the length we generate.
pub const MAX_VERIFIER_LEN: usize = 128;

/// The client-generated PKCE secret.
#[derive(Clone, PartialEq, Eq)]
pub struct CodeVerifier(String);

impl CodeVerifier {
    /// Generates a verifier of the maximum length from `[A-Za-z0-9]`.
    pub fn generate() -> Self {
        Self::generate_with_len(MAX_VERIFIER_LEN)
    }

    /// Generates a verifier of `len` characters, clamped into the RFC 7636 range.
    pub fn generate_with_len(len: usize) -> Self {
        let len = len.clamp(MIN_VERIFIER_LEN, MAX_VERIFIER_LEN);
        let value = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        Self(value)
    }

    /// Wraps a verifier read back from storage.
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `BASE64URL-NOPAD(SHA256(verifier))`, the S256 method.
    pub fn challenge(&self) -> CodeChallenge {
        let digest = Sha256::digest(self.0.as_bytes());
        CodeChallenge(URL_SAFE_NO_PAD.encode(digest))
    }
}

// The verifier is a secret; keep it out of logs.
impl fmt::Debug for CodeVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodeVerifier({} chars)", self.0.len())
    }
}

/// Hash-derived, URL-safe encoding of a [`CodeVerifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChallenge(String);

impl CodeChallenge {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CodeChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns true when every character is in the RFC 7636 unreserved set.
pub fn is_unreserved(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
}
