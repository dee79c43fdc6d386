//! Supabase REST client.
//!
//! Endpoint: `{url}/rest/v1/{table or rpc}`
//! Auth: anon key in the `apikey` header and as a bearer token

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::{BackendError, ContentStore};
use crate::domain::collection::DEFAULT_COLLECTION_NAME;
use crate::domain::{Artifact, ExhibitionData, UserCollection, UserCollectionArtifact};

const ARTIFACTS_RPC: &str = "rpc/get_all_artifacts";
const EXHIBITIONS_RPC: &str = "rpc/get_exhibition_data";
const COLLECTIONS_TABLE: &str = "user_collections";
const MEMBERS_TABLE: &str = "user_collection_artifacts";

/// Connection settings for the Supabase project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,

    /// Public anon key
    pub anon_key: String,
}

/// Supabase REST client
pub struct SupabaseClient {
    /// Project URL without trailing slash
    base_url: String,
    /// Public anon key
    anon_key: String,
    /// HTTP client
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct NewCollection<'a> {
    user_id: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct NewMember {
    collection_id: Uuid,
    artifact_id: Uuid,
    is_favorite: bool,
}

impl SupabaseClient {
    /// Create a new client
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self::with_client(url, anon_key, reqwest::Client::new())
    }

    /// Create a client sharing an existing HTTP client
    pub fn with_client(
        url: impl Into<String>,
        anon_key: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            client,
        }
    }

    /// Build REST URL
    fn rest_url(&self, endpoint: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, endpoint)
    }

    /// Build a request URL. Query values are percent-encoded.
    fn request_url(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Url, BackendError> {
        let mut url = Url::parse(&self.rest_url(endpoint)).map_err(|e| BackendError::InvalidUrl {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }

        Ok(url)
    }

    /// Filter selecting one member row
    fn member_filter(artifact_id: Uuid, collection_id: Uuid) -> Vec<(&'static str, String)> {
        vec![
            ("collection_id", format!("eq.{}", collection_id)),
            ("artifact_id", format!("eq.{}", artifact_id)),
        ]
    }

    /// Send a request and return the raw body of a 2xx response
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        return_representation: bool,
    ) -> Result<Vec<u8>, BackendError> {
        let url = self.request_url(endpoint, query)?;

        debug!(%method, %endpoint, "Content store request");

        let mut request = self
            .client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
            .header("Content-Type", "application/json");

        if return_representation {
            request = request.header("Prefer", "return=representation");
        }

        if let Some(body) = body {
            let json = serde_json::to_vec(body).map_err(|e| BackendError::Encode {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;
            request = request.body(json);
        }

        let response = request.send().await.map_err(|e| BackendError::Request {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| BackendError::Request {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(BackendError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        debug!(%endpoint, status = status.as_u16(), bytes = bytes.len(), "Content store response");
        Ok(bytes.to_vec())
    }

    /// GET an endpoint and decode its JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, BackendError> {
        let bytes = self
            .send::<()>(Method::GET, endpoint, query, None, false)
            .await?;
        decode(endpoint, &bytes)
    }
}

/// Decode a JSON payload, tagging failures with the endpoint
fn decode<T: DeserializeOwned>(endpoint: &str, bytes: &[u8]) -> Result<T, BackendError> {
    serde_json::from_slice(bytes).map_err(|e| BackendError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl ContentStore for SupabaseClient {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn fetch_all_artifacts(&self) -> Result<Vec<Artifact>, BackendError> {
        self.get_json(ARTIFACTS_RPC, &[]).await
    }

    async fn fetch_exhibition_data(&self) -> Result<Vec<ExhibitionData>, BackendError> {
        self.get_json(EXHIBITIONS_RPC, &[]).await
    }

    async fn fetch_user_collections(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserCollection>, BackendError> {
        let query = [
            ("user_id", format!("eq.{}", user_id)),
            ("select", "*".to_string()),
        ];
        self.get_json(COLLECTIONS_TABLE, &query).await
    }

    async fn create_user_collection(&self, user_id: &str) -> Result<UserCollection, BackendError> {
        let body = NewCollection {
            user_id,
            name: DEFAULT_COLLECTION_NAME,
        };

        let bytes = self
            .send(Method::POST, COLLECTIONS_TABLE, &[], Some(&body), true)
            .await?;

        // PostgREST answers inserts with an array of the created rows
        let mut rows: Vec<UserCollection> = decode(COLLECTIONS_TABLE, &bytes)?;
        rows.pop().ok_or_else(|| BackendError::Decode {
            endpoint: COLLECTIONS_TABLE.to_string(),
            message: "insert returned no rows".to_string(),
        })
    }

    async fn fetch_collection_artifacts(
        &self,
        collection_id: Uuid,
    ) -> Result<Vec<UserCollectionArtifact>, BackendError> {
        let query = [
            ("collection_id", format!("eq.{}", collection_id)),
            ("select", "*".to_string()),
        ];
        self.get_json(MEMBERS_TABLE, &query).await
    }

    async fn add_artifact_to_collection(
        &self,
        artifact_id: Uuid,
        collection_id: Uuid,
    ) -> Result<(), BackendError> {
        let body = NewMember {
            collection_id,
            artifact_id,
            is_favorite: false,
        };

        self.send(Method::POST, MEMBERS_TABLE, &[], Some(&body), false)
            .await
            .map(|_| ())
    }

    async fn remove_artifact_from_collection(
        &self,
        artifact_id: Uuid,
        collection_id: Uuid,
    ) -> Result<(), BackendError> {
        let query = Self::member_filter(artifact_id, collection_id);
        self.send::<()>(Method::DELETE, MEMBERS_TABLE, &query, None, false)
            .await
            .map(|_| ())
    }

    async fn set_favorite(
        &self,
        artifact_id: Uuid,
        collection_id: Uuid,
        is_favorite: bool,
    ) -> Result<(), BackendError> {
        let query = Self::member_filter(artifact_id, collection_id);
        let body = serde_json::json!({ "is_favorite": is_favorite });

        self.send(Method::PATCH, MEMBERS_TABLE, &query, Some(&body), false)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_url() {
        let client = SupabaseClient::new("https://abc.supabase.co/", "KEY");
        assert_eq!(
            client.rest_url("rpc/get_all_artifacts"),
            "https://abc.supabase.co/rest/v1/rpc/get_all_artifacts"
        );
    }

    #[test]
    fn test_member_filter_url() {
        let client = SupabaseClient::new("https://abc.supabase.co", "KEY");
        let artifact = Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap();
        let collection = Uuid::parse_str("22222222-2222-2222-2222-222222222222").unwrap();

        let url = client
            .request_url(MEMBERS_TABLE, &SupabaseClient::member_filter(artifact, collection))
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://abc.supabase.co/rest/v1/user_collection_artifacts\
             ?collection_id=eq.22222222-2222-2222-2222-222222222222\
             &artifact_id=eq.11111111-1111-1111-1111-111111111111"
        );
    }

    #[test]
    fn test_query_values_are_encoded() {
        let client = SupabaseClient::new("https://abc.supabase.co", "KEY");
        let query = [("user_id", "eq.a&role=eq.admin".to_string())];

        let url = client.request_url(COLLECTIONS_TABLE, &query).unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("user_id".to_string(), "eq.a&role=eq.admin".to_string())]);
        assert!(!url.as_str().contains("&role="));
    }

    #[test]
    fn test_decode_error_names_endpoint() {
        let err = decode::<Vec<Artifact>>(ARTIFACTS_RPC, b"{not json").unwrap_err();

        assert!(err.is_decode());
        assert!(err.to_string().contains(ARTIFACTS_RPC));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_error() {
        let client = SupabaseClient::new("http://127.0.0.1:1", "KEY");
        let err = client.fetch_all_artifacts().await.unwrap_err();

        assert!(matches!(err, BackendError::Request { .. }));
        assert_eq!(err.status(), None);
    }
}
