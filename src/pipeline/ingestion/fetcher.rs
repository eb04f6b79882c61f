use super::retry::{with_retry, RetryPolicy};
use crate::app::ports::HttpClientPort;
use crate::common::error::Result;
use std::sync::Arc;

/// Shared GET helper handed to every extractor: one port, one retry policy
#[derive(Clone)]
pub struct PageFetcher {
    http: Arc<dyn HttpClientPort>,
    policy: RetryPolicy,
}

impl PageFetcher {
    pub fn new(http: Arc<dyn HttpClientPort>, policy: RetryPolicy) -> Self {
        Self { http, policy }
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        with_retry(self.policy, url, |_| {
            let http = self.http.clone();
            let url = url.to_string();
            async move { http.get(&url).await.map(|resp| resp.text()) }
        })
        .await
    }
}
