use std::time::Duration;

use anyhow::{Context, Result};
use ethers::types::Address;
use jsonrpsee::core::ClientError;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::Serialize;

use crate::chain::ChainError;

const ETH_CALL: &str = "eth_call";
const MAX_RETURN_DATA_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct RpcClient {
    inner: HttpClient,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        assert!(!endpoint.is_empty(), "RPC endpoint must be provided");
        assert!(
            timeout >= Duration::from_millis(100),
            "Timeout below 100ms is unsafe"
        );

        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(endpoint)
            .with_context(|| format!("Failed to build RPC client for {endpoint}"))?;

        Ok(Self {
            inner: client,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        assert!(
            self.timeout >= Duration::from_millis(100),
            "Timeout invariant broken"
        );
        assert!(
            self.timeout <= Duration::from_secs(60),
            "Timeout exceeds maximum bound"
        );
        self.timeout
    }

    /// Read-only contract call against the latest block. Returns the raw
    /// ABI-encoded return data.
    pub async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        let request = CallRequest {
            to: format!("{to:#x}"),
            data: format!("0x{}", hex::encode(data)),
        };

        let response: String = self
            .inner
            .request(ETH_CALL, rpc_params![request, "latest"])
            .await
            .map_err(|err| match err {
                ClientError::RequestTimeout => ChainError::Timeout { method: ETH_CALL },
                other => ChainError::Transport {
                    method: ETH_CALL,
                    reason: other.to_string(),
                },
            })?;

        let trimmed = response.trim();
        let payload = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if payload.len() / 2 > MAX_RETURN_DATA_BYTES {
            return Err(ChainError::Malformed {
                call: ETH_CALL.to_string(),
                reason: format!("return data exceeds {MAX_RETURN_DATA_BYTES} bytes"),
            });
        }
        hex::decode(payload).map_err(|err| ChainError::Malformed {
            call: ETH_CALL.to_string(),
            reason: format!("return data is not hex: {err}"),
        })
    }
}

#[derive(Debug, Serialize)]
struct CallRequest {
    to: String,
    data: String,
}
