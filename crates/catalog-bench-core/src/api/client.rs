//! API client for the Iceberg REST catalog.
//!
//! This module provides the `CatalogClient` struct for obtaining access
//! tokens and issuing the catalog requests the workload is made of.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::auth::Authenticator;
use crate::config::ConnectionConfig;
use crate::dataset::{EntityIdentity, NamespaceIdentity};
use crate::workload::{Invocation, Operation, OperationExecutor, OperationInput};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Path prefix of the Iceberg REST API relative to the base URL
const API_PREFIX: [&str; 3] = ["api", "catalog", "v1"];

/// Header carrying the realm for multi-realm deployments
const REALM_HEADER: &str = "Polaris-Realm";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// A fully resolved request, before any credential is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<Value>,
}

/// REST client for the catalog.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: Url,
    client_id: String,
    client_secret: String,
    scope: String,
}

impl CatalogClient {
    pub fn new(connection: &ConnectionConfig) -> Result<Self> {
        let base_url = Url::parse(connection.base_url.trim())
            .with_context(|| format!("Invalid base URL {}", connection.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Base URL {} cannot carry a path", base_url);
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(ref realm) = connection.realm {
            headers.insert(
                REALM_HEADER,
                header::HeaderValue::from_str(realm).context("Invalid realm header value")?,
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(connection.request_timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            client_id: connection.client_id.clone(),
            client_secret: connection.client_secret.clone(),
            scope: connection.scope.clone(),
        })
    }

    /// Build `{base}/api/catalog/v1/{segments...}`, percent-encoding each segment.
    fn api_url<S: AsRef<str>>(&self, segments: &[S]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(API_PREFIX);
            path.extend(segments.iter().map(|s| s.as_ref()));
        }
        url
    }

    pub fn token_url(&self) -> Url {
        self.api_url(&["oauth", "tokens"])
    }

    fn namespace_url(&self, ns: &NamespaceIdentity, tail: &[&str]) -> Url {
        let encoded = ns.namespace.encoded();
        let mut segments = vec![ns.catalog.as_str(), "namespaces", encoded.as_str()];
        segments.extend_from_slice(tail);
        self.api_url(&segments[..])
    }

    fn entity_url(&self, entity: &EntityIdentity, collection: &str) -> Url {
        let encoded = entity.namespace.encoded();
        self.api_url(&[
            entity.catalog.as_str(),
            "namespaces",
            encoded.as_str(),
            collection,
            entity.name.as_str(),
        ])
    }

    /// Resolve an invocation into method, URL and body.
    pub fn prepare(&self, invocation: &Invocation) -> Result<PreparedRequest> {
        use Operation::*;

        let mismatch = || {
            anyhow::anyhow!(
                "{} cannot be fed with {:?}",
                invocation.operation,
                invocation.input
            )
        };

        let prepared = match (invocation.operation, &invocation.input) {
            (ListNamespaces, OperationInput::Namespace(ns)) => {
                let mut url = self.api_url(&[ns.catalog.as_str(), "namespaces"]);
                url.query_pairs_mut().append_pair("parent", &ns.namespace.encoded());
                PreparedRequest { method: Method::GET, url, body: None }
            }
            (NamespaceExists, OperationInput::Namespace(ns)) => PreparedRequest {
                method: Method::HEAD,
                url: self.namespace_url(ns, &[]),
                body: None,
            },
            (FetchNamespace, OperationInput::Namespace(ns)) => PreparedRequest {
                method: Method::GET,
                url: self.namespace_url(ns, &[]),
                body: None,
            },
            (ListTables, OperationInput::Namespace(ns)) => PreparedRequest {
                method: Method::GET,
                url: self.namespace_url(ns, &["tables"]),
                body: None,
            },
            (ListViews, OperationInput::Namespace(ns)) => PreparedRequest {
                method: Method::GET,
                url: self.namespace_url(ns, &["views"]),
                body: None,
            },
            (TableExists, OperationInput::Entity(t)) => PreparedRequest {
                method: Method::HEAD,
                url: self.entity_url(t, "tables"),
                body: None,
            },
            (FetchTable, OperationInput::Entity(t)) => PreparedRequest {
                method: Method::GET,
                url: self.entity_url(t, "tables"),
                body: None,
            },
            (ViewExists, OperationInput::Entity(v)) => PreparedRequest {
                method: Method::HEAD,
                url: self.entity_url(v, "views"),
                body: None,
            },
            (FetchView, OperationInput::Entity(v)) => PreparedRequest {
                method: Method::GET,
                url: self.entity_url(v, "views"),
                body: None,
            },
            (UpdateNamespaceProperties, OperationInput::NamespaceUpdate(update)) => {
                PreparedRequest {
                    method: Method::POST,
                    url: self.namespace_url(&update.target, &["properties"]),
                    body: Some(json!({ "removals": [], "updates": update.updates })),
                }
            }
            (UpdateTableProperties, OperationInput::EntityUpdate(update)) => PreparedRequest {
                method: Method::POST,
                url: self.entity_url(&update.target, "tables"),
                body: Some(set_properties_body(&update.updates)),
            },
            (UpdateViewProperties, OperationInput::EntityUpdate(update)) => PreparedRequest {
                method: Method::POST,
                url: self.entity_url(&update.target, "views"),
                body: Some(set_properties_body(&update.updates)),
            },
            _ => return Err(mismatch()),
        };
        Ok(prepared)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send(&self, prepared: PreparedRequest, token: &str) -> Result<(), ApiError> {
        trace!(method = %prepared.method, url = %prepared.url, "Sending catalog request");
        let mut request = self
            .client
            .request(prepared.method, prepared.url)
            .bearer_auth(token);
        if let Some(body) = prepared.body {
            request = request.json(&body);
        }

        let response = Self::check_response(request.send().await?).await?;
        // Drain the body so the connection goes back to the pool
        response.bytes().await?;
        Ok(())
    }

    /// Exchange the configured client credentials for an access token.
    pub async fn fetch_access_token(&self) -> Result<String> {
        let url = self.token_url();
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .client
            .post(url.clone())
            .form(&form)
            .send()
            .await
            .with_context(|| format!("Failed to send token request to {}", url))?;

        let response = Self::check_response(response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        debug!(
            token_type = token.token_type.as_deref().unwrap_or("bearer"),
            expires_in = ?token.expires_in,
            "Access token obtained"
        );
        Ok(token.access_token)
    }
}

fn set_properties_body(updates: &impl serde::Serialize) -> Value {
    json!({
        "updates": [
            { "action": "set-properties", "updates": updates }
        ]
    })
}

#[async_trait]
impl Authenticator for CatalogClient {
    async fn authenticate(&self) -> Result<String> {
        self.fetch_access_token().await
    }
}

#[async_trait]
impl OperationExecutor for CatalogClient {
    async fn execute(&self, invocation: &Invocation, token: &str) -> Result<()> {
        let prepared = self.prepare(invocation)?;
        self.send(prepared, token)
            .await
            .with_context(|| invocation.operation.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{NamespacePath, PropertyUpdate};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn client(base: &str) -> CatalogClient {
        CatalogClient::new(&ConnectionConfig {
            base_url: base.to_string(),
            client_id: "id".into(),
            client_secret: "secret".into(),
            ..ConnectionConfig::default()
        })
        .expect("client should build")
    }

    fn ns() -> NamespaceIdentity {
        NamespaceIdentity {
            catalog: "C_0".into(),
            namespace: NamespacePath::new(vec!["NS_0".into(), "NS_1".into()]),
        }
    }

    fn table() -> EntityIdentity {
        EntityIdentity {
            catalog: "C_0".into(),
            namespace: NamespacePath::new(vec!["NS_0".into(), "NS_1".into()]),
            name: "T_3".into(),
        }
    }

    fn invoke(operation: Operation, input: OperationInput) -> Invocation {
        Invocation { operation, input }
    }

    fn prepare(c: &CatalogClient, operation: Operation, input: OperationInput) -> PreparedRequest {
        c.prepare(&invoke(operation, input)).unwrap()
    }

    #[test]
    fn test_token_url() {
        assert_eq!(
            client("http://localhost:8181").token_url().as_str(),
            "http://localhost:8181/api/catalog/v1/oauth/tokens"
        );
        // Base paths are preserved, trailing slash or not
        assert_eq!(
            client("https://host/polaris/").token_url().as_str(),
            "https://host/polaris/api/catalog/v1/oauth/tokens"
        );
    }

    #[test]
    fn test_namespace_requests() {
        let c = client("http://localhost:8181");

        let list = prepare(&c, Operation::ListNamespaces, OperationInput::Namespace(ns()));
        assert_eq!(list.method, Method::GET);
        assert_eq!(
            list.url.as_str(),
            "http://localhost:8181/api/catalog/v1/C_0/namespaces?parent=NS_0%1FNS_1"
        );

        let exists = prepare(&c, Operation::NamespaceExists, OperationInput::Namespace(ns()));
        assert_eq!(exists.method, Method::HEAD);
        assert_eq!(
            exists.url.as_str(),
            "http://localhost:8181/api/catalog/v1/C_0/namespaces/NS_0%1FNS_1"
        );

        let tables = prepare(&c, Operation::ListTables, OperationInput::Namespace(ns()));
        assert_eq!(
            tables.url.as_str(),
            "http://localhost:8181/api/catalog/v1/C_0/namespaces/NS_0%1FNS_1/tables"
        );
        assert!(tables.body.is_none());
    }

    #[test]
    fn test_entity_requests() {
        let c = client("http://localhost:8181");

        let fetch = prepare(&c, Operation::FetchTable, OperationInput::Entity(table()));
        assert_eq!(fetch.method, Method::GET);
        assert_eq!(
            fetch.url.as_str(),
            "http://localhost:8181/api/catalog/v1/C_0/namespaces/NS_0%1FNS_1/tables/T_3"
        );

        let view_exists = prepare(&c, Operation::ViewExists, OperationInput::Entity(table()));
        assert_eq!(view_exists.method, Method::HEAD);
        assert!(view_exists.url.path().ends_with("/views/T_3"));
    }

    #[test]
    fn test_update_bodies() {
        let c = client("http://localhost:8181");
        let mut updates = BTreeMap::new();
        updates.insert("UpdatedAttribute_0".to_string(), "UpdatedValue_7".to_string());

        let ns_update = prepare(
            &c,
            Operation::UpdateNamespaceProperties,
            OperationInput::NamespaceUpdate(PropertyUpdate {
                target: ns(),
                updates: updates.clone(),
            }),
        );
        assert_eq!(ns_update.method, Method::POST);
        assert!(ns_update.url.path().ends_with("/namespaces/NS_0%1FNS_1/properties"));
        assert_eq!(
            ns_update.body,
            Some(json!({ "removals": [], "updates": { "UpdatedAttribute_0": "UpdatedValue_7" } }))
        );

        let table_update = prepare(
            &c,
            Operation::UpdateTableProperties,
            OperationInput::EntityUpdate(PropertyUpdate {
                target: table(),
                updates,
            }),
        );
        assert_eq!(
            table_update.body,
            Some(json!({
                "updates": [{
                    "action": "set-properties",
                    "updates": { "UpdatedAttribute_0": "UpdatedValue_7" }
                }]
            }))
        );
    }

    #[test]
    fn test_mismatched_input_rejected() {
        let c = client("http://localhost:8181");
        let mismatched = invoke(Operation::FetchTable, OperationInput::Namespace(ns()));
        assert!(c.prepare(&mismatched).is_err());
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(CatalogClient::new(&ConnectionConfig {
            base_url: "not a url".into(),
            ..ConnectionConfig::default()
        })
        .is_err());
    }

    #[test]
    fn test_realm_header_value_checked() {
        let with_realm = |realm: &str| {
            CatalogClient::new(&ConnectionConfig {
                realm: Some(realm.into()),
                ..ConnectionConfig::default()
            })
        };
        assert!(with_realm("POLARIS").is_ok());
        assert!(with_realm("bad\nrealm").is_err());
    }

    #[test]
    fn test_parse_token_response() {
        let json = r#"{
            "access_token": "abc.def",
            "token_type": "bearer",
            "expires_in": 3600,
            "issued_token_type": "urn:ietf:params:oauth:token-type:access_token"
        }"#;
        let parsed: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.access_token, "abc.def");
        assert_eq!(parsed.expires_in, Some(3600));
    }
}
