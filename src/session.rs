//! Process-wide AWS SDK session
//!
//! Open one [`SdkSession`] at startup and keep it for the life of the process.
//! Sinks borrow its client; dropping the session releases the SDK resources.

use crate::client::KinesisSink;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_kinesis::config::Region;
use aws_sdk_kinesis::Client;
use std::time::{Duration, Instant};
use tracing::info;

const DEFAULT_REGION: &str = "us-west-2";

/// Static credentials, mainly for local endpoints
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Settings applied when loading the SDK configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub region: String,
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
    /// Timeout for a single request attempt
    pub request_timeout: Duration,
    /// Override the service endpoint (e.g. a local Kinesis emulator)
    pub endpoint_url: Option<String>,
    /// Use these instead of the default credential chain
    pub credentials: Option<StaticCredentials>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(2),
            endpoint_url: None,
            credentials: None,
        }
    }
}

/// Loaded SDK configuration plus the Kinesis client built from it
#[derive(Debug)]
pub struct SdkSession {
    sdk_config: SdkConfig,
    client: Client,
    opened_at: Instant,
}

impl SdkSession {
    pub async fn open(config: SessionConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(config.connect_timeout)
                    .operation_attempt_timeout(config.request_timeout)
                    .build(),
            );

        if let Some(url) = &config.endpoint_url {
            loader = loader.endpoint_url(url);
        }

        if let Some(creds) = config.credentials {
            loader = loader.credentials_provider(Credentials::new(
                creds.access_key_id,
                creds.secret_access_key,
                creds.session_token,
                None,
                "kinesis-batch-ingest",
            ));
        }

        let sdk_config = loader.load().await;
        let client = Client::new(&sdk_config);

        info!(
            region = %config.region,
            endpoint = ?config.endpoint_url,
            "Opened SDK session"
        );

        Self {
            sdk_config,
            client,
            opened_at: Instant::now(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.sdk_config
    }

    /// A sink writing to `stream_name` through this session's client
    pub fn sink(&self, stream_name: impl Into<String>) -> KinesisSink {
        KinesisSink::new(self.client.clone(), stream_name)
    }

    /// Release the session explicitly
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for SdkSession {
    fn drop(&mut self) {
        info!(
            uptime_ms = ?self.opened_at.elapsed().as_millis(),
            "Closed SDK session"
        );
    }
}
