//! Fabric REST bridge gateway
//!
//! Talks to the ledger network's HTTP bridge: identity enrollment under
//! `/users`, transactions under `/channels/{channel}/chaincodes/{cc}`.
//! Enrollment tokens are cached per (identity, org) and refreshed once
//! on a 401 before the call is failed.
//!
//! Every call carries a bounded timeout; a hung bridge fails closed as
//! a ledger error rather than hanging the request.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::Args;
use crate::ledger::response::LedgerRecord;
use crate::ledger::{Credential, LedgerGateway, Receipt};
use crate::types::{GatekeeperError, Result};

/// Configuration for the Fabric REST bridge client
#[derive(Debug, Clone)]
pub struct FabricConfig {
    /// Base URL of the bridge, e.g. `http://localhost:4000`
    pub base_url: String,
    /// Per-call timeout
    pub request_timeout: Duration,
}

impl FabricConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            base_url: args.ledger_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_millis(args.ledger_timeout_ms),
        }
    }
}

/// Ledger gateway over the Fabric REST bridge
pub struct FabricGateway {
    config: FabricConfig,
    http_client: reqwest::Client,
    /// Enrollment tokens keyed by (identity, org)
    tokens: RwLock<HashMap<(String, String), String>>,
}

/// Bridge response to enrollment requests.
///
/// Older bridge builds return `{"token": ...}` at the top level, newer
/// ones nest it as `{"message": {"token": ...}}`.
#[derive(Debug, Deserialize)]
struct EnrollResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    message: Option<serde_json::Value>,
}

impl EnrollResponse {
    fn into_token(self) -> Option<String> {
        if let Some(token) = self.token {
            return Some(token);
        }
        self.message
            .as_ref()
            .and_then(|m| m.get("token"))
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
    }
}

impl FabricGateway {
    pub fn new(config: FabricConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent("gatekeeper/1.0")
            .build()
            .unwrap_or_default();

        Self {
            config,
            http_client,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    fn chaincode_url(&self, channel: &str, chaincode: &str) -> String {
        format!(
            "{}/channels/{}/chaincodes/{}",
            self.config.base_url, channel, chaincode
        )
    }

    /// Get a cached enrollment token or enroll the identity
    async fn token_for(&self, identity: &str, org: &str) -> Result<String> {
        let key = (identity.to_string(), org.to_string());

        {
            let tokens = self.tokens.read().await;
            if let Some(token) = tokens.get(&key) {
                return Ok(token.clone());
            }
        }

        let credential = self.enroll(identity, org, "client", false).await?;

        let mut tokens = self.tokens.write().await;
        tokens.insert(key, credential.token.clone());
        Ok(credential.token)
    }

    /// Drop a cached token so the next call re-enrolls
    async fn invalidate_token(&self, identity: &str, org: &str) {
        let mut tokens = self.tokens.write().await;
        tokens.remove(&(identity.to_string(), org.to_string()));
    }

    async fn enroll(&self, identity: &str, org: &str, role: &str, admin: bool) -> Result<Credential> {
        let url = format!("{}/users", self.config.base_url);
        debug!(identity = %identity, org = %org, "Enrolling identity with ledger CA");

        let response = self
            .http_client
            .post(&url)
            .json(&json!({
                "username": identity,
                "orgName": org,
                "role": role,
                "isAdmin": admin,
            }))
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        let body: EnrollResponse = response
            .json()
            .await
            .map_err(|e| GatekeeperError::Ledger(format!("Malformed enrollment response: {}", e)))?;

        if !status.is_success() || !body.success {
            return Err(GatekeeperError::Ledger(format!(
                "Identity enrollment for '{}' ({}) rejected: HTTP {}",
                identity, org, status
            )));
        }

        let token = body.into_token().ok_or_else(|| {
            GatekeeperError::Ledger("Enrollment response carried no token".into())
        })?;

        Ok(Credential {
            identity: identity.to_string(),
            org: org.to_string(),
            token,
        })
    }

    /// POST a transaction to the bridge with the identity's token,
    /// re-enrolling once if the token has gone stale
    async fn post_invoke(
        &self,
        url: &str,
        function: &str,
        args: &[String],
        identity: &str,
        org: &str,
    ) -> Result<reqwest::Response> {
        for attempt in 0..2 {
            let token = self.token_for(identity, org).await?;

            let response = self
                .http_client
                .post(url)
                .bearer_auth(&token)
                .json(&json!({ "fcn": function, "args": args }))
                .send()
                .await
                .map_err(classify_reqwest_error)?;

            if response.status() == reqwest::StatusCode::UNAUTHORIZED && attempt == 0 {
                warn!(identity = %identity, "Ledger token rejected, re-enrolling");
                self.invalidate_token(identity, org).await;
                continue;
            }

            return Ok(response);
        }
        unreachable!("invoke retry loop always returns")
    }
}

#[async_trait]
impl LedgerGateway for FabricGateway {
    async fn invoke(
        &self,
        channel: &str,
        chaincode: &str,
        function: &str,
        args: &[String],
        identity: &str,
        org: &str,
    ) -> Result<Receipt> {
        let url = self.chaincode_url(channel, chaincode);
        debug!(function = %function, channel = %channel, "Ledger invoke");

        let response = self
            .post_invoke(&url, function, args, identity, org)
            .await?;

        let status = response.status();
        let raw = response
            .bytes()
            .await
            .map_err(classify_reqwest_error)?
            .to_vec();

        if !status.is_success() {
            return Err(GatekeeperError::Ledger(format!(
                "Invoke {} failed: HTTP {}: {}",
                function,
                status,
                String::from_utf8_lossy(&raw)
            )));
        }

        // The receipt body is not guaranteed to be JSON; pull a tx id
        // out when it happens to be, and carry the raw bytes otherwise.
        let tx_id = serde_json::from_slice::<serde_json::Value>(&raw)
            .ok()
            .and_then(|v| {
                v.get("txId")
                    .or_else(|| v.get("tx_id"))
                    .or_else(|| v.get("transactionId"))
                    .and_then(|t| t.as_str())
                    .map(|s| s.to_string())
            });

        Ok(Receipt { raw, tx_id })
    }

    async fn query(
        &self,
        channel: &str,
        chaincode: &str,
        args: &[String],
        function: &str,
        identity: &str,
        org: &str,
    ) -> Result<LedgerRecord> {
        let url = self.chaincode_url(channel, chaincode);
        let token = self.token_for(identity, org).await?;
        let args_json = serde_json::to_string(args)
            .map_err(|e| GatekeeperError::Ledger(format!("Failed to encode args: {}", e)))?;

        debug!(function = %function, channel = %channel, "Ledger query");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&token)
            .query(&[("fcn", function), ("args", args_json.as_str())])
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        let value: serde_json::Value = response.json().await.map_err(|e| {
            GatekeeperError::Ledger(format!("Malformed query response for {}: {}", function, e))
        })?;

        if !status.is_success() {
            return Err(GatekeeperError::Ledger(format!(
                "Query {} failed: HTTP {}",
                function, status
            )));
        }

        // The bridge wraps the chaincode result in a "result" envelope
        // on some builds and returns it bare on others.
        let record = value.get("result").cloned().unwrap_or(value);
        Ok(LedgerRecord::new(record))
    }

    async fn register_identity(
        &self,
        identity: &str,
        org: &str,
        role: &str,
        admin: bool,
    ) -> Result<Credential> {
        let credential = self.enroll(identity, org, role, admin).await?;

        let mut tokens = self.tokens.write().await;
        tokens.insert(
            (identity.to_string(), org.to_string()),
            credential.token.clone(),
        );
        Ok(credential)
    }
}

/// Map transport errors onto the ledger taxonomy; timeouts fail closed
fn classify_reqwest_error(e: reqwest::Error) -> GatekeeperError {
    if e.is_timeout() {
        GatekeeperError::Ledger("Ledger bridge timed out".into())
    } else if e.is_connect() {
        GatekeeperError::Ledger(format!("Ledger bridge unreachable: {}", e))
    } else {
        GatekeeperError::Ledger(format!("Ledger bridge request failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enroll_response_token_shapes() {
        let flat: EnrollResponse =
            serde_json::from_str(r#"{"success":true,"token":"abc"}"#).unwrap();
        assert_eq!(flat.into_token().as_deref(), Some("abc"));

        let nested: EnrollResponse =
            serde_json::from_str(r#"{"success":true,"message":{"token":"xyz"}}"#).unwrap();
        assert_eq!(nested.into_token().as_deref(), Some("xyz"));

        let missing: EnrollResponse =
            serde_json::from_str(r#"{"success":true,"message":"enrolled"}"#).unwrap();
        assert_eq!(missing.into_token(), None);
    }

    #[test]
    fn test_chaincode_url() {
        let gateway = FabricGateway::new(FabricConfig {
            base_url: "http://localhost:4000".into(),
            request_timeout: Duration::from_secs(5),
        });
        assert_eq!(
            gateway.chaincode_url("residentschannel", "residentManagement"),
            "http://localhost:4000/channels/residentschannel/chaincodes/residentManagement"
        );
    }
}
