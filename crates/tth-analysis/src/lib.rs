//! Trusted Types violation analysis
//!
//! The pipeline behind the helper's panels:
//!
//! raw report → [`stack_trace::parse`] → [`root_cause`] →
//! [`ClusterStore::ingest`] → (on demand) [`PolicySynthesizer::synthesize`]
//!
//! Ingestion and queries are synchronous. Synthesis awaits one sanitizer
//! round trip per markup cluster and is bounded by
//! [`SynthesisConfig::sanitizer_timeout`].

pub mod cluster;
pub mod policy;
pub mod render;
pub mod root_cause;
pub mod stack_trace;
pub mod violation;

pub use cluster::{Cluster, ClusterStore, ContextId};
pub use policy::{AllowlistPolicy, MarkupAllowlist, MarkupMerge, PolicySynthesizer, SynthesisConfig};
pub use render::Indent;
pub use root_cause::{INTERNAL_FRAME_COUNT, NO_ROOT_CAUSE, first_valid_frame, root_cause_text, same_root_cause};
pub use stack_trace::{StackFrame, StackTrace, TraceLine};
pub use violation::{Violation, ViolationReport};

pub use tth_security::ViolationCategory;
