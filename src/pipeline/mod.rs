//! The guard pipeline: request/response records, routing, risk scoring,
//! and the synchronous/async orchestrators that chain them together.
//!
//! ## Architecture
//!
//! ```text
//! GuardRequest ─► [validate] ─► RuleEngine ─► (critical? exit)
//!                                 │
//!                                 ▼
//!                        JailbreakDetector ─► (any match? exit)
//!                                 │
//!                                 ▼
//!                        SafetyClassifier
//!                                 │
//!                                 ▼
//!              DecisionRouter + RiskScorer ─► GuardResponse
//! ```
//!
//! The orchestrator ([`orchestrator::GuardPipeline`]) is a single concrete
//! struct composing concrete component types — there is no open stage
//! trait to implement, per the design notes against dynamic dispatch for
//! a fixed, small set of stages.
//!
//! ## Example
//!
//! ```rust,ignore
//! use aegis_claw::config::AegisClawConfig;
//! use aegis_claw::pipeline::model::{GuardRequest, Source};
//! use aegis_claw::pipeline::orchestrator::GuardPipeline;
//!
//! let config = AegisClawConfig::default();
//! let pipeline = GuardPipeline::new(config);
//! let response = pipeline.evaluate(&GuardRequest::new("hello", Source::User));
//! ```

pub mod async_guard;
pub mod model;
pub mod orchestrator;
pub mod risk;
pub mod router;
pub mod types;
