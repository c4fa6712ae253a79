//! Host-facing entry point: one call per keystroke, bounded by a timeout.

use std::sync::Arc;
use std::time::Duration;

use crate::gate::{Activation, InactiveReason, WeatherGate};
use crate::suggestion::{Suggestion, SuggestionBuilder};

pub struct WeatherSuggester {
    gate: Arc<WeatherGate>,
    builder: SuggestionBuilder,
    query_timeout: Duration,
}

impl WeatherSuggester {
    pub fn new(
        gate: Arc<WeatherGate>,
        builder: SuggestionBuilder,
        query_timeout: Duration,
    ) -> Self {
        Self {
            gate,
            builder,
            query_timeout,
        }
    }

    pub fn gate(&self) -> &Arc<WeatherGate> {
        &self.gate
    }

    /// Activate for `search` and build the suggestion from the cached entry.
    ///
    /// A run that outlives the timeout is dropped and its token abandoned, so
    /// it can neither cache nor negative-cache anything afterwards.
    pub async fn query(&self, search: &str) -> Result<Suggestion, InactiveReason> {
        let token = self.gate.begin_query();

        let activation =
            match tokio::time::timeout(self.query_timeout, self.gate.run(search, &token)).await {
                Ok(activation) => activation,
                Err(_) => {
                    tracing::debug!(query = token.id(), "Weather query timed out");
                    self.gate.abandon(&token);
                    Activation::Inactive(InactiveReason::TimedOut)
                }
            };

        match activation {
            Activation::Ready(entry) => Ok(self.builder.build(&entry)),
            Activation::Inactive(reason) => Err(reason),
        }
    }

    /// Build a suggestion from whatever is cached for `search`, without
    /// starting a lookup.
    pub fn cached(&self, search: &str) -> Option<Suggestion> {
        self.gate.lookup(search).map(|entry| self.builder.build(&entry))
    }
}
