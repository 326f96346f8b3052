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

//! Deribit API credential handling and request signing.

use std::fmt::Debug;

use aws_lc_rs::hmac;
use ustr::Ustr;
use zeroize::ZeroizeOnDrop;

/// Deribit API credentials for signing requests.
///
/// Uses HMAC SHA256 with hexadecimal encoding, as required by the Deribit
/// `client_signature` authentication grant.
#[derive(Clone, ZeroizeOnDrop)]
pub struct Credential {
    #[zeroize(skip)]
    pub api_key: Ustr,
    api_secret: Box<[u8]>,
}

impl Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(Credential))
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl Credential {
    /// Creates a new [`Credential`] instance.
    #[must_use]
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into_bytes().into_boxed_slice(),
        }
    }

    /// Returns the API key (client id).
    #[must_use]
    pub fn api_key(&self) -> &str {
        self.api_key.as_str()
    }

    /// Returns the API key with all but the first four characters masked.
    #[must_use]
    pub fn api_key_masked(&self) -> String {
        let key = self.api_key.as_str();
        if key.len() <= 4 {
            "****".to_string()
        } else {
            format!("{}****", &key[..4])
        }
    }

    /// Signs a message with HMAC SHA256 and returns a lowercase hex digest.
    #[must_use]
    pub fn sign(&self, message: &str) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, &self.api_secret);
        let tag = hmac::sign(&key, message.as_bytes());
        hex::encode(tag.as_ref())
    }

    /// Signs the WebSocket authentication challenge.
    ///
    /// The string to sign is `timestamp + "\n" + nonce + "\n" + data`, where
    /// `data` is empty for WebSocket authentication.
    #[must_use]
    pub fn sign_ws_auth(&self, timestamp: u64, nonce: &str, data: &str) -> String {
        self.sign(&format!("{timestamp}\n{nonce}\n{data}"))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const TEST_SECRET: &str = "client_secret_test";

    #[rstest]
    fn test_sign_ws_auth_known_vector() {
        let cred = Credential::new("test_key".to_string(), TEST_SECRET.to_string());
        let expected = "d415b4cbec214a9d0f859b83ba348191ec7d7d9a2124f8335bc88a08190e6c96";

        assert_eq!(cred.sign_ws_auth(1_699_000_000_000, "abcd1234", ""), expected);
    }

    #[rstest]
    fn test_sign_ws_auth_deterministic() {
        let cred = Credential::new("test_key".to_string(), TEST_SECRET.to_string());
        let a = cred.sign_ws_auth(1_699_000_000_000, "abcd1234", "");
        let b = cred.sign_ws_auth(1_699_000_000_000, "abcd1234", "");

        assert_eq!(a, b);
    }

    #[rstest]
    #[case(1_699_000_000_001, "abcd1234", "5afff17628578da1f6e7e8c72d262485d024fbf8e3d70020d67738a7d13238d4")]
    #[case(1_699_000_000_000, "abcd1235", "094fb36d56c772844abdd288d34dfdb4ee3943d103a746c62d95825fb5230604")]
    fn test_sign_ws_auth_input_sensitivity(
        #[case] timestamp: u64,
        #[case] nonce: &str,
        #[case] expected: &str,
    ) {
        let cred = Credential::new("test_key".to_string(), TEST_SECRET.to_string());
        let baseline = cred.sign_ws_auth(1_699_000_000_000, "abcd1234", "");
        let signature = cred.sign_ws_auth(timestamp, nonce, "");

        assert_ne!(signature, baseline);
        assert_eq!(signature, expected);
    }

    #[rstest]
    fn test_sign_ws_auth_second_vector() {
        let cred = Credential::new("other_key".to_string(), "2a3b4c5d".to_string());
        let expected = "e07382d969944899a61eeacc7a1fab61aba539f0a15a17293f3c88296d13380f";

        assert_eq!(cred.sign_ws_auth(1_617_000_000_000, "xv94kt0q", ""), expected);
    }

    #[rstest]
    fn test_api_key_masked() {
        let cred = Credential::new("abcdef123456".to_string(), TEST_SECRET.to_string());
        assert_eq!(cred.api_key_masked(), "abcd****");

        let short = Credential::new("abc".to_string(), TEST_SECRET.to_string());
        assert_eq!(short.api_key_masked(), "****");
    }

    #[rstest]
    fn test_debug_redacts_secret() {
        let cred = Credential::new("test_key".to_string(), TEST_SECRET.to_string());
        let debug_str = format!("{cred:?}");

        assert!(debug_str.contains("<redacted>"));
        assert!(!debug_str.contains(TEST_SECRET));
    }
}
