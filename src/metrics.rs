//! Metric registration
//!
//! Descriptions for every metric the engine emits. Emission sites use the
//! `metrics` facade directly; installing an exporter is the embedding
//! application's concern.

use ::metrics::{describe_counter, describe_histogram, Unit};

/// Prefix shared by all engine metrics
pub const METRICS_PREFIX: &str = "kbfuse";

/// Register all metric descriptions
pub fn register_metrics() {
    // Ingestion
    describe_counter!(
        format!("{}_ingest_documents_total", METRICS_PREFIX),
        Unit::Count,
        "Total source documents ingested"
    );

    describe_counter!(
        format!("{}_ingest_chunks_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks stored"
    );

    describe_counter!(
        format!("{}_ingest_deletes_total", METRICS_PREFIX),
        Unit::Count,
        "Total source-document deletions"
    );

    describe_histogram!(
        format!("{}_ingest_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end ingestion latency in seconds"
    );

    // Embedding
    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    // Search
    describe_counter!(
        format!("{}_search_ops_total", METRICS_PREFIX),
        Unit::Count,
        "Total hybrid search operations"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Hybrid search latency in seconds"
    );

    describe_histogram!(
        format!("{}_search_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of results returned per search"
    );
}
