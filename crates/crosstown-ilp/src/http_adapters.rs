//! Default `reqwest`-backed adapters for hosts that expose the connector
//! admin API and payment runtime over plain HTTP/JSON. Hosts with a
//! different transport (in-process, gRPC, …) implement the traits
//! directly instead of using these.

use async_trait::async_trait;

use crate::error::IlpError;
use crate::traits::{
    AddPeerRequest, ChannelOps, ChannelState, ConnectorAdmin, OpenChannelRequest, OpenChannelResult,
    PaymentRuntime, SendIlpPacketRequest, SendIlpPacketResult,
};

pub struct HttpConnectorAdmin {
    base_url: String,
    client: reqwest::Client,
    supports_channels: bool,
}

impl HttpConnectorAdmin {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            supports_channels: false,
        }
    }

    /// Construct a variant that advertises channel-operation support, so
    /// the facade's capability probe populates `channelClient`.
    pub fn with_channel_support(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            supports_channels: true,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ConnectorAdmin for HttpConnectorAdmin {
    async fn add_peer(&self, req: AddPeerRequest) -> Result<(), IlpError> {
        self.client
            .post(self.url("/peers"))
            .json(&req)
            .send()
            .await
            .map_err(|e| IlpError::ConnectorError(e.to_string()))?
            .error_for_status()
            .map_err(|e| IlpError::ConnectorError(e.to_string()))?;
        Ok(())
    }

    async fn remove_peer(&self, id: &str) -> Result<(), IlpError> {
        self.client
            .delete(self.url(&format!("/peers/{id}")))
            .send()
            .await
            .map_err(|e| IlpError::ConnectorError(e.to_string()))?
            .error_for_status()
            .map_err(|e| IlpError::ConnectorError(e.to_string()))?;
        Ok(())
    }

    async fn open_channel(&self, req: OpenChannelRequest) -> Result<OpenChannelResult, IlpError> {
        if !self.supports_channels {
            return Err(IlpError::ConnectorError("channel operations not supported".into()));
        }
        let resp = self
            .client
            .post(self.url("/channels"))
            .json(&req)
            .send()
            .await
            .map_err(|e| IlpError::ConnectorError(e.to_string()))?
            .error_for_status()
            .map_err(|e| IlpError::ConnectorError(e.to_string()))?;
        resp.json::<OpenChannelResult>()
            .await
            .map_err(|e| IlpError::ConnectorError(e.to_string()))
    }

    async fn get_channel_state(&self, channel_id: &str) -> Result<ChannelState, IlpError> {
        if !self.supports_channels {
            return Err(IlpError::ConnectorError("channel operations not supported".into()));
        }
        let resp = self
            .client
            .get(self.url(&format!("/channels/{channel_id}")))
            .send()
            .await
            .map_err(|e| IlpError::ConnectorError(e.to_string()))?
            .error_for_status()
            .map_err(|e| IlpError::ConnectorError(e.to_string()))?;
        resp.json::<ChannelState>()
            .await
            .map_err(|e| IlpError::ConnectorError(e.to_string()))
    }
}

impl ChannelOps for HttpConnectorAdmin {}

pub struct HttpPaymentRuntime {
    base_url: String,
    client: reqwest::Client,
}

impl HttpPaymentRuntime {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

/// Raw reply shape before normalizing the `accepted`/`fulfilled` field
/// discrepancy spec.md §6.3 calls out.
#[derive(serde::Deserialize)]
struct RawSendResult {
    #[serde(default)]
    accepted: Option<bool>,
    #[serde(default)]
    fulfilled: Option<bool>,
    #[serde(default)]
    fulfillment: Option<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[async_trait]
impl PaymentRuntime for HttpPaymentRuntime {
    async fn send_ilp_packet(&self, req: SendIlpPacketRequest) -> Result<SendIlpPacketResult, IlpError> {
        let resp = self
            .client
            .post(format!("{}/ilp/send", self.base_url.trim_end_matches('/')))
            .json(&req)
            .send()
            .await
            .map_err(|e| IlpError::ConnectorError(e.to_string()))?
            .error_for_status()
            .map_err(|e| IlpError::ConnectorError(e.to_string()))?;
        let raw: RawSendResult = resp
            .json()
            .await
            .map_err(|e| IlpError::ConnectorError(e.to_string()))?;
        let accepted = raw.accepted.or(raw.fulfilled).unwrap_or(false);
        Ok(SendIlpPacketResult {
            accepted,
            fulfillment: raw.fulfillment,
            data: raw.data,
            code: raw.code,
            message: raw.message,
        })
    }
}
