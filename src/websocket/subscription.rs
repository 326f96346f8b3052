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

//! Subscription tracking and duplicate-notification suppression.

use ahash::AHashMap;
use serde_json::Value;

/// Outcome of evaluating an inbound notification against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryDecision {
    /// Payload differs from the last delivered one; forward it.
    Deliver,
    /// Payload is byte-identical to the last delivered one; drop it.
    Duplicate,
    /// Channel is not (or no longer) subscribed; drop it.
    Stale,
}

/// Tracks active channel subscriptions and the fingerprint of the last
/// payload delivered on each.
///
/// The fingerprint is the canonical serialization of the payload:
/// `serde_json::Value` keeps object keys sorted, so two payloads that are
/// semantically equal serialize to identical bytes regardless of the key
/// order the venue sent them in.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    channels: AHashMap<String, Option<String>>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a channel, resetting any previous fingerprint.
    ///
    /// Re-subscribing an already tracked channel clears its fingerprint so
    /// the next notification is always delivered.
    pub fn subscribe(&mut self, channel: &str) {
        self.channels.insert(channel.to_string(), None);
    }

    /// Removes a channel and its fingerprint.
    pub fn unsubscribe(&mut self, channel: &str) {
        self.channels.remove(channel);
    }

    /// Returns whether the channel is currently tracked.
    #[must_use]
    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    /// Returns the currently tracked channel names.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Returns the number of tracked channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns whether no channels are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Evaluates a notification payload, updating the stored fingerprint
    /// when the payload is delivered.
    pub fn evaluate(&mut self, channel: &str, data: &Value) -> DeliveryDecision {
        let Some(fingerprint) = self.channels.get_mut(channel) else {
            return DeliveryDecision::Stale;
        };

        let canonical = data.to_string();
        if fingerprint.as_deref() == Some(canonical.as_str()) {
            return DeliveryDecision::Duplicate;
        }

        *fingerprint = Some(canonical);
        DeliveryDecision::Deliver
    }
}
