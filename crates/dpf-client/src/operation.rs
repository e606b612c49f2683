//! GraphQL request/response envelope types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::GraphqlError;

/// A GraphQL request body: query text plus typed variables.
///
/// Query texts are static templates; user input only ever travels
/// through `variables`, never spliced into the query string.
#[derive(Debug, Clone, Serialize)]
pub struct GraphqlRequest<V> {
    /// Query text.
    pub query: &'static str,
    /// Operation variables.
    pub variables: V,
    /// Operation name, when the template declares one.
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<&'static str>,
}

impl<V: Serialize> GraphqlRequest<V> {
    /// Create a request from a static query template.
    pub const fn new(query: &'static str, variables: V) -> Self {
        Self {
            query,
            variables,
            operation_name: None,
        }
    }

    /// Set the operation name.
    #[must_use]
    pub const fn with_operation_name(mut self, name: &'static str) -> Self {
        self.operation_name = Some(name);
        self
    }
}

/// A GraphQL response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlResponse<T> {
    /// Response data (may be absent when errors are present).
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    /// GraphQL errors.
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
    /// Extensions metadata.
    #[serde(default)]
    pub extensions: Option<serde_json::Value>,
}

impl<T: DeserializeOwned> GraphqlResponse<T> {
    /// Whether the envelope carries neither data nor errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_none() && self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_operation_name_only_when_set() {
        let request = GraphqlRequest::new("query { x }", serde_json::json!({"a": 1}));
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("operationName").is_none());
        assert_eq!(body["query"], "query { x }");
        assert_eq!(body["variables"]["a"], 1);

        let named = request.with_operation_name("X");
        let body = serde_json::to_value(&named).unwrap();
        assert_eq!(body["operationName"], "X");
    }

    #[test]
    fn response_tolerates_missing_fields() {
        let response: GraphqlResponse<serde_json::Value> = serde_json::from_str("{}").unwrap();
        assert!(response.is_empty());

        let response: GraphqlResponse<serde_json::Value> =
            serde_json::from_str(r#"{"data": {"x": 1}}"#).unwrap();
        assert!(!response.is_empty());
        assert!(response.errors.is_empty());
    }
}
