//! Pinecone implementation for vector search
//!
//! Talks to the Pinecone REST API directly: the controller resolves the
//! project behind an API key, and each index is served from its own
//! data-plane host derived from index name, project and environment.
//!
//! Author: hephaex@gmail.com

use crate::embedding::http_client;
use async_trait::async_trait;
use reqwest::Client;
use rq_core::{Document, Metadata, PineconeConfig, Result, RqError, VectorIndex};
use serde::{Deserialize, Serialize};

/// Authenticated Pinecone client for one project
pub struct PineconeClient {
    http: Client,
    config: PineconeConfig,
    project_name: String,
}

#[derive(Debug, Deserialize)]
struct WhoAmIResponse {
    project_name: String,
}

impl PineconeClient {
    /// Connect to the controller and resolve the project name
    pub async fn init(config: &PineconeConfig, timeout_secs: u64) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(RqError::Config("Pinecone API key required".to_string()));
        }

        let http = http_client(timeout_secs)?;
        let url = format!(
            "{}/actions/whoami",
            config.controller_base_url().trim_end_matches('/')
        );

        let response = http
            .get(&url)
            .header("Api-Key", &config.api_key)
            .send()
            .await
            .map_err(|e| RqError::Config(format!("Pinecone controller unreachable: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RqError::Config(format!(
                "Pinecone client initialization failed ({status}): {error_text}"
            )));
        }

        let whoami: WhoAmIResponse = response
            .json()
            .await
            .map_err(|e| RqError::Config(format!("Failed to parse whoami response: {e}")))?;

        tracing::debug!("Pinecone project resolved: {}", whoami.project_name);

        Ok(Self {
            http,
            config: config.clone(),
            project_name: whoami.project_name,
        })
    }

    /// Project the API key belongs to
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Handle for an existing index
    pub fn index(&self, name: &str) -> Result<IndexHandle> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RqError::Config("Pinecone index name required".to_string()));
        }

        let host = match &self.config.index_host {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}-{}.svc.{}.pinecone.io",
                name, self.project_name, self.config.environment
            ),
        };

        Ok(IndexHandle {
            http: self.http.clone(),
            api_key: self.config.api_key.clone(),
            name: name.to_string(),
            host,
            namespace: self.config.namespace.clone(),
            text_key: self.config.text_key.clone(),
        })
    }
}

/// One Pinecone index, queried over its data-plane host
pub struct IndexHandle {
    http: Client,
    api_key: String,
    name: String,
    host: String,
    namespace: Option<String>,
    text_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Metadata>,
}

impl IndexHandle {
    /// Index name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Data-plane base URL
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Split the stored metadata into chunk text and the remaining fields
    fn to_document(&self, found: QueryMatch) -> Document {
        let mut metadata = found.metadata.unwrap_or_default();
        let content = match metadata.remove(&self.text_key) {
            Some(serde_json::Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => {
                tracing::warn!(
                    "Pinecone match {} has no `{}` metadata field",
                    found.id,
                    self.text_key
                );
                String::new()
            }
        };

        Document { content, metadata }
    }
}

#[async_trait]
impl VectorIndex for IndexHandle {
    async fn similarity_search(&self, vector: &[f32], k: usize) -> Result<Vec<Document>> {
        let request = QueryRequest {
            vector,
            top_k: k,
            include_metadata: true,
            include_values: false,
            namespace: self.namespace.as_deref(),
        };

        let response = self
            .http
            .post(format!("{}/query", self.host))
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RqError::Retrieval(format!("Pinecone query failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RqError::Retrieval(format!(
                "Pinecone query error on index {} ({status}): {error_text}",
                self.name
            )));
        }

        let result: QueryResponse = response
            .json()
            .await
            .map_err(|e| RqError::Retrieval(format!("Failed to parse Pinecone response: {e}")))?;

        tracing::debug!(
            "Pinecone index {} returned {} matches",
            self.name,
            result.matches.len()
        );

        Ok(result
            .matches
            .into_iter()
            .take(k)
            .map(|m| self.to_document(m))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> PineconeConfig {
        PineconeConfig {
            api_key: "pc-key".to_string(),
            environment: "us-west1-gcp".to_string(),
            index_name: "resumes".to_string(),
            controller_url: Some(server.uri()),
            ..Default::default()
        }
    }

    async fn mount_whoami(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/actions/whoami"))
            .and(header("Api-Key", "pc-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "project_name": "abc123",
                "user_label": "default",
                "user_name": "someone"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_init_resolves_project_and_index_host() {
        let server = MockServer::start().await;
        mount_whoami(&server).await;

        let client = PineconeClient::init(&config_for(&server), 5).await.unwrap();
        assert_eq!(client.project_name(), "abc123");

        let index = client.index("resumes").unwrap();
        assert_eq!(index.name(), "resumes");
        assert_eq!(index.host(), "https://resumes-abc123.svc.us-west1-gcp.pinecone.io");
    }

    #[tokio::test]
    async fn test_init_rejects_bad_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/actions/whoami"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = PineconeClient::init(&config_for(&server), 5)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RqError::Config(ref msg) if msg.contains("invalid api key")));
    }

    #[tokio::test]
    async fn test_init_requires_api_key() {
        let config = PineconeConfig::default();
        let err = PineconeClient::init(&config, 5).await.err().unwrap();
        assert!(matches!(err, RqError::Config(_)));
    }

    #[tokio::test]
    async fn test_empty_index_name_rejected() {
        let server = MockServer::start().await;
        mount_whoami(&server).await;

        let client = PineconeClient::init(&config_for(&server), 5).await.unwrap();
        assert!(matches!(client.index("  "), Err(RqError::Config(_))));
    }

    #[tokio::test]
    async fn test_similarity_search_maps_matches() {
        let server = MockServer::start().await;
        mount_whoami(&server).await;

        Mock::given(method("POST"))
            .and(path("/query"))
            .and(header("Api-Key", "pc-key"))
            .and(body_json(json!({
                "vector": [0.5, 0.25],
                "topK": 2,
                "includeMetadata": true,
                "includeValues": false,
                "namespace": "2024"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "matches": [
                    {
                        "id": "jane",
                        "score": 0.91,
                        "metadata": { "text": "Jane Doe - 5 years Go", "source": "jane.pdf" }
                    },
                    {
                        "id": "john",
                        "score": 0.84,
                        "metadata": { "text": "John Smith - 2 years Python", "source": "john.pdf" }
                    }
                ],
                "namespace": "2024"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.index_host = Some(server.uri());
        config.namespace = Some("2024".to_string());

        let client = PineconeClient::init(&config, 5).await.unwrap();
        let index = client.index("resumes").unwrap();
        let docs = index.similarity_search(&[0.5, 0.25], 2).await.unwrap();

        assert_eq!(
            docs,
            vec![
                Document::new("Jane Doe - 5 years Go").with_metadata("source", "jane.pdf"),
                Document::new("John Smith - 2 years Python").with_metadata("source", "john.pdf"),
            ]
        );
    }

    #[tokio::test]
    async fn test_similarity_search_custom_text_key() {
        let server = MockServer::start().await;
        mount_whoami(&server).await;

        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "matches": [
                    { "id": "a", "score": 0.5, "metadata": { "pageContent": "resume a", "page": 1 } },
                    { "id": "b", "score": 0.4 }
                ]
            })))
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.index_host = Some(server.uri());
        config.text_key = "pageContent".to_string();

        let client = PineconeClient::init(&config, 5).await.unwrap();
        let docs = client
            .index("resumes")
            .unwrap()
            .similarity_search(&[0.1], 2)
            .await
            .unwrap();

        assert_eq!(docs[0], Document::new("resume a").with_metadata("page", 1));
        assert_eq!(docs[1], Document::new(""));
    }

    #[tokio::test]
    async fn test_unknown_index_is_retrieval_error() {
        let server = MockServer::start().await;
        mount_whoami(&server).await;

        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(404).set_body_string("index not found"))
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.index_host = Some(server.uri());

        let client = PineconeClient::init(&config, 5).await.unwrap();
        let err = client
            .index("missing")
            .unwrap()
            .similarity_search(&[0.1], 2)
            .await
            .unwrap_err();

        assert!(matches!(err, RqError::Retrieval(ref msg) if msg.contains("missing")));
    }
}
