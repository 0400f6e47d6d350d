//! QueryCraft: deterministic natural-language to SQL over an introspected
//! relational schema.
//!
//! A question is matched against an ordered pattern catalog and bound to the
//! tables and columns of the current schema snapshot. The resulting SQL comes
//! with a confidence score, a complexity tier and a plain-language
//! explanation. Executing it is left to a `SqlExecutor`.

pub mod catalog;
pub mod complexity;
pub mod confidence;
pub mod config;
pub mod db;
pub mod erd;
pub mod error;
pub mod execution;
pub mod explain;
pub mod fuzzy_matcher;
pub mod query_engine;
pub mod schema;
pub mod synthesizer;

pub use catalog::{sample_catalog, RuleId, SampleQuery};
pub use complexity::{ComplexityClassifier, ComplexityTier, QueryFeatures};
pub use confidence::{ConfidenceBand, ConfidenceScorer, ConfidenceWeights};
pub use config::EngineConfig;
pub use db::{seed_sample_database, SqliteDatabase};
pub use erd::{ErdGraph, ErdProjector};
pub use error::{QueryCraftError, Result};
pub use execution::{RowSet, SqlExecutor};
pub use explain::ExplanationBuilder;
pub use fuzzy_matcher::{FuzzyMatcher, NameSimilarity};
pub use query_engine::{GeneratedQuery, QueryEngine, QueryResponse};
pub use schema::{SchemaBuilder, SchemaModel, SchemaRegistry, SchemaSnapshot, SchemaSource};
pub use synthesizer::{QuerySynthesizer, Synthesis, SynthesisLimits, SynthesisTrace};
