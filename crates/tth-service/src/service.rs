//! Analysis service
//!
//! Owns the per-tab cluster store and default-policy status, and answers
//! [`Message`]s one at a time.

use std::collections::HashMap;

use tth_analysis::{ClusterStore, ContextId, Indent, PolicySynthesizer, SynthesisConfig, Violation};
use tth_html::{AllowlistSanitizer, FragmentInspector, HtmlInspector, Sanitizer};
use tth_security::trusted_types_header_rule;

use crate::config::ServiceConfig;
use crate::message::{DefaultPolicyStatus, Message, Response};

/// Background analysis service
pub struct AnalysisService<S, I> {
    sanitizer: S,
    inspector: I,
    synthesis: SynthesisConfig,
    indent: Indent,
    store: ClusterStore,
    policy_status: HashMap<ContextId, DefaultPolicyStatus>,
}

impl AnalysisService<AllowlistSanitizer, HtmlInspector> {
    /// Service backed by the local html5ever sanitizer and inspector.
    pub fn from_config(config: ServiceConfig) -> Self {
        Self::new(
            AllowlistSanitizer::new(config.sanitizer),
            HtmlInspector::new(config.inspector),
            config.synthesis,
            config.indent,
        )
    }
}

impl<S: Sanitizer, I: FragmentInspector> AnalysisService<S, I> {
    pub fn new(sanitizer: S, inspector: I, synthesis: SynthesisConfig, indent: Indent) -> Self {
        Self {
            sanitizer,
            inspector,
            synthesis,
            indent,
            store: ClusterStore::new(),
            policy_status: HashMap::new(),
        }
    }

    pub fn store(&self) -> &ClusterStore {
        &self.store
    }

    /// Apply one message and produce its response.
    pub async fn handle(&mut self, message: Message) -> Response {
        match message {
            Message::ViolationFound { tab_id, violation } => {
                let cluster = self.store.ingest(tab_id, Violation::from_report(violation));
                Response::Ingested { cluster_id: cluster.id.clone(), count: cluster.count }
            }
            Message::ListViolationsByType { tab_id } => {
                let violations = self
                    .store
                    .list_by_category(tab_id)
                    .into_iter()
                    .map(|(category, members)| (category, members.into_iter().cloned().collect()))
                    .collect();
                Response::ViolationsByType { violations }
            }
            Message::ListViolationsByCluster { tab_id } => Response::ViolationsByCluster {
                clusters: self.store.list_by_cluster(tab_id).to_vec(),
            },
            Message::DefaultPolicies { tab_id } => self.default_policies(tab_id).await,
            Message::ClearHistory { tab_id } => {
                self.store.clear(tab_id);
                self.policy_status.remove(&tab_id);
                tracing::info!("Cleared violation history for tab {}", tab_id);
                Response::Ack
            }
            Message::DefaultPolicySet { tab_id, timestamp } => {
                self.status_mut(tab_id).was_set = Some(timestamp);
                Response::Ack
            }
            Message::DefaultPolicyCreationFailed { tab_id, timestamp } => {
                tracing::warn!("Default policy creation failed in tab {}", tab_id);
                self.status_mut(tab_id).creation_failed = Some(timestamp);
                Response::Ack
            }
            Message::DefaultPolicyOverwriteFailed { tab_id, timestamp } => {
                tracing::warn!("Default policy overwrite failed in tab {}", tab_id);
                self.status_mut(tab_id).overwrite_failed = Some(timestamp);
                Response::Ack
            }
            Message::GetDefaultPolicyData { tab_id } => Response::DefaultPolicyData {
                status: self.policy_status.get(&tab_id).copied().unwrap_or_default(),
            },
            Message::CheckHeaders { headers } => {
                let rule = trusted_types_header_rule(
                    headers.iter().map(|header| (header.name.as_str(), header.value.as_str())),
                );
                if rule.is_some() {
                    tracing::debug!("Response lacks an enforced Trusted Types CSP, adding report-only header");
                }
                Response::HeaderCheck { rule }
            }
        }
    }

    async fn default_policies(&self, tab_id: ContextId) -> Response {
        // Snapshot so the policy reflects the clusters at request time
        let clusters = self.store.list_by_cluster(tab_id).to_vec();
        let synthesizer = PolicySynthesizer::new(&self.sanitizer, &self.inspector, self.synthesis.clone());
        let policy = synthesizer.synthesize(&clusters).await;
        let script = policy.render_script(self.indent);
        Response::DefaultPolicies { policy, script }
    }

    fn status_mut(&mut self, tab_id: ContextId) -> &mut DefaultPolicyStatus {
        self.policy_status.entry(tab_id).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tth_analysis::ViolationReport;

    const TAB: ContextId = ContextId(1);

    fn service() -> AnalysisService<AllowlistSanitizer, HtmlInspector> {
        AnalysisService::from_config(ServiceConfig::default())
    }

    fn found(category: &str, payload: &str, line: u32) -> Message {
        Message::ViolationFound {
            tab_id: TAB,
            violation: ViolationReport {
                category: category.into(),
                payload: payload.into(),
                raw_stack_trace: format!(
                    "Error\n  at a (content.js:1:1)\n  at b (content.js:2:2)\n  at c (content.js:3:3)\n  at render (app.js:{line}:7)"
                ),
                document_url: "https://example.com/".into(),
                observed_at_ms: line as u64,
            },
        }
    }

    #[test]
    fn test_ingest_counts() {
        let mut service = service();
        smol::block_on(async {
            let Response::Ingested { cluster_id, count } = service.handle(found("Script", "a()", 10)).await else {
                panic!("expected ingested");
            };
            assert_eq!(count, 1);

            let Response::Ingested { cluster_id: again, count } = service.handle(found("Script", "b()", 10)).await else {
                panic!("expected ingested");
            };
            assert_eq!(again, cluster_id);
            assert_eq!(count, 2);
        });
    }

    #[test]
    fn test_policy_status_per_tab() {
        let mut service = service();
        smol::block_on(async {
            service.handle(Message::DefaultPolicySet { tab_id: TAB, timestamp: 100 }).await;
            service.handle(Message::DefaultPolicyOverwriteFailed { tab_id: TAB, timestamp: 200 }).await;

            let response = service.handle(Message::GetDefaultPolicyData { tab_id: TAB }).await;
            assert_eq!(
                response,
                Response::DefaultPolicyData {
                    status: DefaultPolicyStatus { was_set: Some(100), creation_failed: None, overwrite_failed: Some(200) },
                }
            );

            let other = service.handle(Message::GetDefaultPolicyData { tab_id: ContextId(2) }).await;
            assert_eq!(other, Response::DefaultPolicyData { status: DefaultPolicyStatus::default() });
        });
    }

    #[test]
    fn test_clear_history() {
        let mut service = service();
        smol::block_on(async {
            service.handle(found("HTML", "<p>x</p>", 10)).await;
            service.handle(Message::DefaultPolicySet { tab_id: TAB, timestamp: 5 }).await;
            assert_eq!(service.handle(Message::ClearHistory { tab_id: TAB }).await, Response::Ack);
            assert!(service.store().list_by_cluster(TAB).is_empty());
            assert_eq!(service.store().context_count(), 0);
            assert!(service.policy_status.is_empty());

            let status = service.handle(Message::GetDefaultPolicyData { tab_id: TAB }).await;
            assert_eq!(status, Response::DefaultPolicyData { status: DefaultPolicyStatus::default() });
        });
    }

    #[test]
    fn test_check_headers() {
        use crate::message::HttpHeader;

        let mut service = service();
        let enforced = Message::CheckHeaders {
            headers: vec![HttpHeader {
                name: "content-security-policy".into(),
                value: "require-trusted-types-for 'script'".into(),
            }],
        };
        let bare = Message::CheckHeaders { headers: Vec::new() };

        smol::block_on(async {
            assert_eq!(service.handle(enforced).await, Response::HeaderCheck { rule: None });
            let Response::HeaderCheck { rule: Some(rule) } = service.handle(bare).await else {
                panic!("expected a rule");
            };
            assert_eq!(rule.value, "require-trusted-types-for 'script';");
        });
    }
}
