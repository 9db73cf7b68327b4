//! Default policy synthesis
//!
//! Derives the least-privilege allowlist a Trusted Types default policy needs
//! to stop blocking what a page actually does. Each cluster contributes its
//! earliest member. Markup is diffed against its sanitized form: whatever the
//! sanitizer strips is what the allowlist has to add back.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use smol::Timer;
use smol::future::FutureExt;
use tth_html::{FragmentInspector, FragmentSummary, SanitizeError, Sanitizer};
use tth_security::{ViolationCategory, allowlist_origin};

use crate::cluster::Cluster;
use crate::violation::Violation;

/// How per-violation tag/attribute diffs combine across a synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkupMerge {
    /// Each markup violation replaces the previous sets
    #[default]
    LastWins,
    /// Sets accumulate across all markup violations
    Union,
}

/// Synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Bound on one sanitizer round trip
    #[serde(with = "millis")]
    pub sanitizer_timeout: Duration,
    pub markup_merge: MarkupMerge,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            sanitizer_timeout: Duration::from_secs(5),
            markup_merge: MarkupMerge::LastWins,
        }
    }
}

/// Markup part of an allowlist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkupAllowlist {
    /// Tags the sanitizer would strip but the page uses
    pub tags: BTreeSet<String>,
    /// Attributes the sanitizer would strip but the page uses
    pub attributes: BTreeSet<String>,
    /// Payloads that could not be parsed and must be allowed verbatim
    pub unparsable_fragments: Vec<String>,
    /// Every markup payload seen, for display
    pub violation_fragments: Vec<String>,
}

/// Least-privilege allowlist for a default policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowlistPolicy {
    pub markup: MarkupAllowlist,
    pub scripts: Vec<String>,
    pub url_origins: Vec<String>,
}

/// Builds allowlists from clusters using a sanitizer and fragment inspector.
pub struct PolicySynthesizer<'a, S, I> {
    sanitizer: &'a S,
    inspector: &'a I,
    config: SynthesisConfig,
}

impl<'a, S: Sanitizer, I: FragmentInspector> PolicySynthesizer<'a, S, I> {
    pub fn new(sanitizer: &'a S, inspector: &'a I, config: SynthesisConfig) -> Self {
        Self { sanitizer, inspector, config }
    }

    /// Fold the clusters' representatives, oldest cluster first.
    pub async fn synthesize(&self, clusters: &[Cluster]) -> AllowlistPolicy {
        let mut policy = AllowlistPolicy::default();
        for cluster in clusters {
            self.accumulate(cluster.representative(), &mut policy).await;
        }
        tracing::debug!(
            "Synthesized policy from {} clusters: {} tags, {} attributes, {} scripts, {} origins",
            clusters.len(),
            policy.markup.tags.len(),
            policy.markup.attributes.len(),
            policy.scripts.len(),
            policy.url_origins.len()
        );
        policy
    }

    /// Add one violation's contribution to `policy`.
    pub async fn accumulate(&self, violation: &Violation, policy: &mut AllowlistPolicy) {
        match violation.category {
            Some(ViolationCategory::Script) => policy.scripts.push(violation.payload.clone()),
            Some(ViolationCategory::ScriptUrl) => {
                let entry = allowlist_origin(&violation.payload).unwrap_or_else(|| violation.payload.clone());
                policy.url_origins.push(entry);
            }
            Some(ViolationCategory::Markup) => self.accumulate_markup(violation, &mut policy.markup).await,
            None => tracing::warn!(
                "Skipping violation observed at {} with an unrecognized category",
                violation.observed_at
            ),
        }
    }

    async fn accumulate_markup(&self, violation: &Violation, markup: &mut MarkupAllowlist) {
        let payload = &violation.payload;

        match self.inspector.inspect(payload) {
            Ok(unsanitized) => {
                let sanitized = self.sanitized_summary(payload, &unsanitized).await;
                let tags = unsanitized.tags.difference(&sanitized.tags).cloned();
                let attributes = unsanitized.attributes.difference(&sanitized.attributes).cloned();

                match self.config.markup_merge {
                    MarkupMerge::LastWins => {
                        markup.tags = tags.collect();
                        markup.attributes = attributes.collect();
                    }
                    MarkupMerge::Union => {
                        markup.tags.extend(tags);
                        markup.attributes.extend(attributes);
                    }
                }
            }
            Err(err) => {
                tracing::warn!("Markup not parsable, allowlisting verbatim: {}", err);
                markup.unparsable_fragments.push(payload.clone());
            }
        }

        markup.violation_fragments.push(payload.clone());
    }

    /// Tags and attributes surviving sanitization. Any failure falls back to
    /// the unsanitized summary, which contributes an empty diff.
    async fn sanitized_summary(&self, payload: &str, unsanitized: &FragmentSummary) -> FragmentSummary {
        let sanitized = match self.sanitize_bounded(payload).await {
            Ok(sanitized) => sanitized,
            Err(err) => {
                tracing::warn!("Sanitizer round trip failed, assuming nothing is stripped: {}", err);
                return unsanitized.clone();
            }
        };

        match self.inspector.inspect(&sanitized) {
            Ok(summary) => summary,
            Err(err) => {
                tracing::warn!("Sanitized markup not parsable, assuming nothing is stripped: {}", err);
                unsanitized.clone()
            }
        }
    }

    async fn sanitize_bounded(&self, payload: &str) -> Result<String, SanitizeError> {
        let timeout = self.config.sanitizer_timeout;
        self.sanitizer
            .sanitize(payload)
            .or(async {
                Timer::after(timeout).await;
                Err(SanitizeError::TimedOut(timeout))
            })
            .await
    }
}

/// `Duration` as integer milliseconds on the wire
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
