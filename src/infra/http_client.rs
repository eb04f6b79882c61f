use crate::app::ports::{HttpClientPort, HttpGetResult};
use crate::common::error::{Result, ScraperError};
use crate::observability::metrics;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

/// reqwest-backed client; each call is one attempt bounded by `timeout`
pub struct ReqwestHttp {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestHttp {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get(&self, url: &str) -> Result<HttpGetResult> {
        let t0 = Instant::now();
        let request = async {
            let resp = self.client.get(url).send().await?;
            let status = resp.status().as_u16();
            let bytes = resp.bytes().await?.to_vec();
            Ok::<_, ScraperError>(HttpGetResult { status, bytes })
        };

        let result = match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result.map_err(|e| {
                metrics::sources::request_error();
                e
            })?,
            Err(_) => {
                metrics::sources::request_error();
                return Err(ScraperError::Timeout {
                    url: url.to_string(),
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if !(200..=299).contains(&result.status) {
            metrics::sources::request_error();
            return Err(ScraperError::Status {
                status: result.status,
                url: url.to_string(),
            });
        }

        let dur = t0.elapsed().as_secs_f64();
        metrics::sources::request_success();
        metrics::sources::request_duration(dur);
        metrics::sources::payload_bytes(result.bytes.len());
        debug!(url, status = result.status, bytes = result.bytes.len(), "fetched");
        Ok(result)
    }
}
