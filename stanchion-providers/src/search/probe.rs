//! Credential probe for the search API.

use async_trait::async_trait;

use stanchion_fetch::{CredentialProbe, ProbeVerdict};

use super::api::SearchApiClient;

/// Probes search API keys with a one-item query.
#[derive(Debug, Clone)]
pub struct SearchProbe {
    client: SearchApiClient,
}

impl SearchProbe {
    /// Creates a probe backed by `client`.
    pub fn new(client: SearchApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialProbe for SearchProbe {
    async fn probe(&self, secret: &str) -> ProbeVerdict {
        self.client.probe(secret).await
    }
}
