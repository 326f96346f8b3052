// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Challenge-response authentication for the `client_signature` grant.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::{
    common::{consts::DERIBIT_WS_AUTH_SCOPE, credential::Credential},
    websocket::messages::DeribitAuthParams,
};

const NONCE_LEN: usize = 8;
const NONCE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a random 8-character nonce from `[a-z0-9]`.
#[must_use]
pub fn generate_nonce() -> String {
    let mut rng = rand::thread_rng();
    (0..NONCE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..NONCE_ALPHABET.len());
            NONCE_ALPHABET[idx] as char
        })
        .collect()
}

/// Returns the current Unix timestamp in milliseconds.
#[must_use]
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Builds `public/auth` parameters for the given credential.
///
/// The signature covers `timestamp + "\n" + nonce + "\n" + data` with an
/// empty `data` component.
#[must_use]
pub fn build_auth_params(credential: &Credential) -> DeribitAuthParams {
    let timestamp = timestamp_ms();
    let nonce = generate_nonce();
    let signature = credential.sign_ws_auth(timestamp, &nonce, "");

    DeribitAuthParams {
        grant_type: "client_signature".to_string(),
        client_id: credential.api_key().to_string(),
        timestamp,
        signature,
        nonce,
        scope: DERIBIT_WS_AUTH_SCOPE.to_string(),
    }
}

/// Authentication state held after a successful `public/auth` exchange.
#[derive(Debug, Clone)]
pub struct AuthState {
    /// Access token attached to private requests.
    pub access_token: String,
    /// Granted scope.
    pub scope: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
    /// Millisecond timestamp at which the token was obtained.
    pub obtained_at: u64,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_nonce_length_and_charset() {
        for _ in 0..100 {
            let nonce = generate_nonce();
            assert_eq!(nonce.len(), NONCE_LEN);
            assert!(nonce
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
        }
    }

    #[rstest]
    fn test_nonce_alphabet_uniformity() {
        const DRAWS: usize = 50_000;

        let mut counts = [0usize; 256];
        for _ in 0..DRAWS {
            for byte in generate_nonce().into_bytes() {
                counts[byte as usize] += 1;
            }
        }

        // Each symbol should land within 10% of the expected frequency;
        // the binomial standard deviation here is well under 2%.
        let expected = (DRAWS * NONCE_LEN) / NONCE_ALPHABET.len();
        let tolerance = expected / 10;
        for symbol in NONCE_ALPHABET {
            let count = counts[*symbol as usize];
            assert!(
                count.abs_diff(expected) <= tolerance,
                "symbol {} occurred {count} times, expected {expected} +/- {tolerance}",
                *symbol as char,
            );
        }

        let total: usize = NONCE_ALPHABET.iter().map(|b| counts[*b as usize]).sum();
        assert_eq!(total, DRAWS * NONCE_LEN, "nonce produced out-of-alphabet symbols");
    }

    #[rstest]
    fn test_timestamp_is_recent_millis() {
        let ts = timestamp_ms();
        // 2020-01-01 in milliseconds; anything earlier means seconds, not millis.
        assert!(ts > 1_577_836_800_000);
    }

    #[rstest]
    fn test_build_auth_params() {
        let credential = Credential::new("client_id".to_string(), "client_secret".to_string());
        let params = build_auth_params(&credential);

        assert_eq!(params.grant_type, "client_signature");
        assert_eq!(params.client_id, "client_id");
        assert_eq!(params.nonce.len(), NONCE_LEN);
        assert_eq!(params.signature.len(), 64);
        assert_eq!(params.scope, DERIBIT_WS_AUTH_SCOPE);
        assert_eq!(
            params.signature,
            credential.sign_ws_auth(params.timestamp, &params.nonce, "")
        );
    }
}
