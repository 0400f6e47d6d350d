//! Query Engine
//!
//! Wires the pipeline together. Every call reads the published schema
//! snapshot once and runs Synthesizer -> {Confidence, Complexity,
//! Explanation} against that snapshot, so a concurrent refresh never mixes
//! two schema versions inside one response.

use crate::catalog::RuleId;
use crate::complexity::{ComplexityClassifier, ComplexityTier};
use crate::confidence::{ConfidenceBand, ConfidenceScorer};
use crate::config::EngineConfig;
use crate::erd::{ErdGraph, ErdProjector};
use crate::error::Result;
use crate::execution::{RowSet, SqlExecutor};
use crate::explain::ExplanationBuilder;
use crate::schema::{SchemaBuilder, SchemaModel, SchemaRegistry, SchemaSnapshot, SchemaSource};
use crate::synthesizer::QuerySynthesizer;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// A synthesized query with its scoring and explanation
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedQuery {
    pub query_id: Uuid,
    pub question: String,
    pub sql: String,
    pub tables_used: Vec<String>,
    pub confidence: u8,
    pub confidence_band: ConfidenceBand,
    pub complexity: ComplexityTier,
    pub explanation: String,
    pub rule: RuleId,
    pub fallback: bool,
    /// Set when a name in the question matched two tables equally well
    pub ambiguous: bool,
    pub schema_version: u64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub query: GeneratedQuery,
    pub rows: RowSet,
    pub elapsed_ms: u64,
}

pub struct QueryEngine {
    registry: SchemaRegistry,
    builder: SchemaBuilder,
    synthesizer: QuerySynthesizer,
    scorer: ConfidenceScorer,
    classifier: ComplexityClassifier,
    explainer: ExplanationBuilder,
    projector: ErdProjector,
}

impl QueryEngine {
    /// Engine over an already-built model, with default settings
    pub fn new(model: SchemaModel) -> Self {
        Self::with_parts(SchemaRegistry::new(model), SchemaBuilder::default(), QuerySynthesizer::default())
    }

    /// Introspect `source` with the settings in `config`.
    pub fn from_source(config: &EngineConfig, source: &dyn SchemaSource) -> Result<Self> {
        let builder = config.schema_builder();
        let registry = SchemaRegistry::from_source(&builder, source)?;
        let synthesizer = QuerySynthesizer::new(config.resolver(), config.limits());
        Ok(Self::with_parts(registry, builder, synthesizer))
    }

    fn with_parts(registry: SchemaRegistry, builder: SchemaBuilder, synthesizer: QuerySynthesizer) -> Self {
        Self {
            registry,
            builder,
            synthesizer,
            scorer: ConfidenceScorer::new(),
            classifier: ComplexityClassifier::new(),
            explainer: ExplanationBuilder::new(),
            projector: ErdProjector::new(),
        }
    }

    pub fn schema(&self) -> Arc<SchemaSnapshot> {
        self.registry.current()
    }

    pub fn erd(&self) -> ErdGraph {
        self.projector.project(&self.registry.current().model)
    }

    /// Rebuild the schema from `source` and publish it. The previous
    /// snapshot stays in place if introspection fails.
    pub fn refresh(&self, source: &dyn SchemaSource) -> Result<Arc<SchemaSnapshot>> {
        match self.registry.rebuild(&self.builder, source) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!("Schema refresh failed, keeping v{}: {}", self.registry.current().version, e);
                Err(e)
            }
        }
    }

    pub fn generate(&self, question: &str) -> Result<GeneratedQuery> {
        let snapshot = self.registry.current();
        let synthesis = self.synthesizer.synthesize(question, &snapshot.model)?;
        let trace = &synthesis.trace;

        let confidence = self.scorer.score(trace);
        let query = GeneratedQuery {
            query_id: Uuid::new_v4(),
            question: question.to_string(),
            tables_used: trace.tables.clone(),
            confidence,
            confidence_band: self.scorer.band(confidence),
            complexity: self.classifier.classify_trace(trace),
            explanation: self.explainer.explain(question, trace),
            rule: trace.rule,
            fallback: trace.fallback,
            ambiguous: trace.ambiguous,
            schema_version: snapshot.version,
            generated_at: Utc::now(),
            sql: synthesis.sql,
        };
        info!(
            "Generated {} query ({} confidence, {}) for '{}'",
            query.rule, query.confidence, query.complexity, question
        );
        Ok(query)
    }

    /// Generate and run through `executor`. Executor errors are returned
    /// unchanged and never retried.
    pub fn ask(&self, question: &str, executor: &dyn SqlExecutor) -> Result<QueryResponse> {
        let started = Instant::now();
        let query = self.generate(question)?;
        let rows = executor.execute(&query.sql).map_err(|e| {
            warn!("Execution failed for query {}: {}", query.query_id, e);
            e
        })?;
        Ok(QueryResponse {
            query,
            rows,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}
