//! HTTP-backed control-plane client.
//!
//! Talks to a generic fleet-management REST surface:
//! `POST {base}/v1/deployments` to start a deployment and
//! `GET {base}/v1/deployments/{id}` to observe it. Credentials are treated as
//! opaque and passed through as headers; the region header tells the control
//! plane which fleet partition to route to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::{DeploymentClient, DeploymentId, DeploymentRequest, DeploymentStatus};
use crate::config::Credentials;
use crate::errors::TransportError;

/// Default control-plane endpoint when the config does not name one.
pub const DEFAULT_ENDPOINT: &str = "https://api.fleetops.cloud";

const ACCESS_KEY_HEADER: &str = "x-access-key-id";
const SECRET_KEY_HEADER: &str = "x-secret-access-key";
const REGION_HEADER: &str = "x-fleet-region";

/// reqwest-backed [`DeploymentClient`].
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl HttpClient {
    /// Build a client for the given credentials, optionally overriding the endpoint.
    pub fn new(credentials: Credentials, endpoint: Option<String>) -> Self {
        let base_url = endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            credentials,
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(ACCESS_KEY_HEADER, &self.credentials.access_key_id)
            .header(SECRET_KEY_HEADER, &self.credentials.secret_access_key)
            .header(REGION_HEADER, &self.credentials.region)
    }
}

#[derive(Serialize)]
struct CreateDeploymentBody<'a> {
    stack_id: &'a str,
    app_id: &'a str,
    command: CommandBody<'a>,
}

#[derive(Serialize)]
struct CommandBody<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<&'a BTreeMap<String, Vec<String>>>,
}

#[derive(Deserialize)]
struct CreateDeploymentResponse {
    deployment_id: String,
}

#[derive(Deserialize)]
struct DescribeDeploymentResponse {
    deployment_id: String,
    status: super::DeploymentState,
    created_at: DateTime<Utc>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}

/// Map a non-2xx response to a `TransportError::Api`, capturing the body.
async fn api_error(operation: &'static str, response: reqwest::Response) -> TransportError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    TransportError::Api {
        operation,
        status,
        body,
    }
}

#[async_trait]
impl DeploymentClient for HttpClient {
    async fn start_deployment(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentId, TransportError> {
        const OP: &str = "start_deployment";

        let url = format!("{}/v1/deployments", self.base_url);
        let body = CreateDeploymentBody {
            stack_id: &request.stack_id,
            app_id: &request.app_id,
            command: CommandBody {
                name: &request.command,
                args: request.args.as_ref(),
            },
        };

        debug!(%url, command = %request.command, "starting deployment");

        let response = self
            .authed(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                operation: OP,
                source,
            })?;

        if !response.status().is_success() {
            return Err(api_error(OP, response).await);
        }

        let created: CreateDeploymentResponse =
            response
                .json()
                .await
                .map_err(|source| TransportError::Request {
                    operation: OP,
                    source,
                })?;

        Ok(DeploymentId(created.deployment_id))
    }

    async fn fetch_status(&self, id: &DeploymentId) -> Result<DeploymentStatus, TransportError> {
        const OP: &str = "fetch_status";

        let url = format!("{}/v1/deployments/{}", self.base_url, id);

        let response =
            self.authed(self.http.get(&url))
                .send()
                .await
                .map_err(|source| TransportError::Request {
                    operation: OP,
                    source,
                })?;

        if !response.status().is_success() {
            return Err(api_error(OP, response).await);
        }

        let described: DescribeDeploymentResponse =
            response
                .json()
                .await
                .map_err(|source| TransportError::Request {
                    operation: OP,
                    source,
                })?;

        debug!(id = %described.deployment_id, state = %described.status, "fetched deployment status");

        Ok(DeploymentStatus {
            id: DeploymentId(described.deployment_id),
            state: described.status,
            created_at: described.created_at,
            completed_at: described.completed_at,
        })
    }
}
