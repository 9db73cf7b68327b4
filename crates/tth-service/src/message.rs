//! Background message protocol
//!
//! Requests arrive as JSON objects tagged by `type`, the way the extension's
//! content script and panels address the background process. Every request
//! gets exactly one [`Response`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tth_analysis::{AllowlistPolicy, Cluster, ContextId, Violation, ViolationCategory, ViolationReport};
use tth_security::HeaderRule;

use crate::ServiceError;

/// A response header as seen by the network layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

/// Request to the analysis service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Message {
    ViolationFound { tab_id: ContextId, violation: ViolationReport },
    ListViolationsByType { tab_id: ContextId },
    ListViolationsByCluster { tab_id: ContextId },
    DefaultPolicies { tab_id: ContextId },
    ClearHistory { tab_id: ContextId },
    DefaultPolicySet { tab_id: ContextId, timestamp: u64 },
    DefaultPolicyCreationFailed { tab_id: ContextId, timestamp: u64 },
    DefaultPolicyOverwriteFailed { tab_id: ContextId, timestamp: u64 },
    GetDefaultPolicyData { tab_id: ContextId },
    CheckHeaders { headers: Vec<HttpHeader> },
}

impl Message {
    /// Decode one line of the wire protocol.
    pub fn decode(line: &str) -> Result<Self, ServiceError> {
        serde_json::from_str(line).map_err(ServiceError::Malformed)
    }
}

/// Timestamps (ms) of the helper's default-policy lifecycle events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultPolicyStatus {
    pub was_set: Option<u64>,
    pub creation_failed: Option<u64>,
    pub overwrite_failed: Option<u64>,
}

/// Reply from the analysis service
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Response {
    /// Request applied, nothing to report
    Ack,
    Ingested { cluster_id: String, count: usize },
    ViolationsByType { violations: BTreeMap<ViolationCategory, Vec<Violation>> },
    ViolationsByCluster { clusters: Vec<Cluster> },
    DefaultPolicies { policy: AllowlistPolicy, script: String },
    DefaultPolicyData { status: DefaultPolicyStatus },
    HeaderCheck { rule: Option<HeaderRule> },
    Error { message: String },
}

impl Response {
    pub fn error(err: impl std::fmt::Display) -> Self {
        Self::Error { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_violation_found() {
        let line = r#"{"type":"violationFound","tabId":3,"violation":{"category":"HTML","payload":"<b>x</b>","rawStackTrace":"Error","documentUrl":"https://example.com/","observedAtMs":42}}"#;
        let Message::ViolationFound { tab_id, violation } = Message::decode(line).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(tab_id, ContextId(3));
        assert_eq!(violation.category, "HTML");
        assert_eq!(violation.observed_at_ms, 42);
    }

    #[test]
    fn test_decode_headers() {
        let line = r#"{"type":"checkHeaders","headers":[{"name":"content-security-policy","value":"default-src 'self'"}]}"#;
        let message = Message::decode(line).unwrap();
        assert_eq!(
            message,
            Message::CheckHeaders {
                headers: vec![HttpHeader {
                    name: "content-security-policy".into(),
                    value: "default-src 'self'".into(),
                }],
            }
        );
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(Message::decode("not json"), Err(ServiceError::Malformed(_))));
        assert!(matches!(Message::decode(r#"{"type":"launchMissiles"}"#), Err(ServiceError::Malformed(_))));
        assert!(matches!(Message::decode(r#"{"type":"clearHistory"}"#), Err(ServiceError::Malformed(_))));
    }

    #[test]
    fn test_response_wire_shape() {
        let json = serde_json::to_value(Response::Ingested { cluster_id: "0-abc".into(), count: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "ingested", "clusterId": "0-abc", "count": 2}));

        let json = serde_json::to_value(Response::Ack).unwrap();
        assert_eq!(json, serde_json::json!({"type": "ack"}));

        let json = serde_json::to_value(Response::error("boom")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "error", "message": "boom"}));
    }

    #[test]
    fn test_status_wire_shape() {
        let status = DefaultPolicyStatus { was_set: Some(5), ..Default::default() };
        let json = serde_json::to_value(Response::DefaultPolicyData { status }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "defaultPolicyData",
                "status": {"wasSet": 5, "creationFailed": null, "overwriteFailed": null}
            })
        );
    }
}
