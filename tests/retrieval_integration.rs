//! Coordinator and source adapters over the sample corpus

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use auditrag::analyzer::EntityResolver;
use auditrag::rag::retrieval::{RetrieverCoordinator, SourceOverrides};
use auditrag::sources::{EvidenceSource, GraphSource, StructuredSource, VectorSource};
use auditrag::types::{Category, Constraints, DateFilter, SourceKind};
use common::*;

fn coordinator() -> RetrieverCoordinator {
    let corpus = sample_corpus();
    let resolver = EntityResolver::new(corpus.organizations());
    RetrieverCoordinator::new(Duration::from_secs(2))
        .with_source(Arc::new(VectorSource::new(corpus.clone())))
        .with_source(Arc::new(StructuredSource::new(corpus.clone()).with_resolver(resolver)))
        .with_source(Arc::new(GraphSource::new(corpus)))
}

fn kepco() -> Constraints {
    Constraints {
        organization: Some("한국전력공사".to_string()),
        ..Default::default()
    }
}

#[test]
fn test_plan_by_category() {
    let plain = Constraints::default();
    assert_eq!(
        RetrieverCoordinator::plan(Category::GeneralSearch, &plain),
        vec![SourceKind::Vector]
    );
    assert_eq!(
        RetrieverCoordinator::plan(Category::GeneralSearch, &kepco()),
        vec![SourceKind::Structured, SourceKind::Vector]
    );
    assert_eq!(
        RetrieverCoordinator::plan(Category::RegulationGraphSearch, &plain),
        vec![SourceKind::Graph, SourceKind::Vector]
    );
    assert!(RetrieverCoordinator::plan(Category::Aggregation, &kepco()).is_empty());
    assert!(RetrieverCoordinator::plan(Category::Chitchat, &plain).is_empty());
}

#[tokio::test]
async fn test_structured_results_lead_and_are_unique() {
    let retrieval = coordinator()
        .retrieve(Category::GeneralSearch, "출장비 징계", &kepco(), 5, &SourceOverrides::default())
        .await
        .unwrap();

    assert_eq!(retrieval.reports.len(), 2);
    assert_eq!(retrieval.reports[0].source, SourceKind::Structured);

    let first = &retrieval.documents[0];
    assert_eq!(first.provenance, SourceKind::Structured);
    assert_eq!(first.company(), Some("한국전력공사"));

    let keys: HashSet<_> = retrieval.documents.iter().map(|d| d.key()).collect();
    assert_eq!(keys.len(), retrieval.documents.len());

    let retrieved: usize = retrieval.reports.iter().map(|r| r.retrieved).sum();
    assert_eq!(retrieved, retrieval.documents.len() + retrieval.duplicates);
}

#[tokio::test]
async fn test_structured_source_honors_date_filter() {
    let corpus = sample_corpus();
    let source = StructuredSource::new(corpus);
    let constraints = Constraints {
        date: Some(DateFilter::Year { year: 2021 }),
        ..kepco()
    };

    let docs = source.search("", &constraints, 10).await.unwrap();

    assert_eq!(docs.len(), 2);
    assert!(docs
        .iter()
        .all(|d| d.company() == Some("한국전력공사") && d.meta_str("date").unwrap_or_default().starts_with("2021")));
}

#[tokio::test]
async fn test_per_source_overrides() {
    let overrides = SourceOverrides::from_pairs("structured=1,vector=2").unwrap();
    let retrieval = coordinator()
        .retrieve(Category::GeneralSearch, "출장비", &kepco(), 5, &overrides)
        .await
        .unwrap();

    let requested: Vec<(SourceKind, usize)> = retrieval.reports.iter().map(|r| (r.source, r.requested)).collect();
    assert_eq!(requested, vec![(SourceKind::Structured, 1), (SourceKind::Vector, 2)]);
    assert!(retrieval.documents.len() <= 3);
}

#[tokio::test]
async fn test_failed_graph_counts_as_empty() {
    let corpus = sample_corpus();
    let coordinator = RetrieverCoordinator::new(Duration::from_secs(2))
        .with_source(Arc::new(VectorSource::new(corpus)))
        .with_source(Arc::new(GraphSource::new(Arc::new(UnreachableGraph))));

    let retrieval = coordinator
        .retrieve(
            Category::RegulationGraphSearch,
            "계약 법률 위반",
            &Constraints::default(),
            3,
            &SourceOverrides::default(),
        )
        .await
        .unwrap();

    let graph = &retrieval.reports[0];
    assert_eq!(graph.source, SourceKind::Graph);
    assert_eq!(graph.retrieved, 0);
    assert!(graph.error.is_some());
    assert_eq!(retrieval.documents.len(), 3);
    assert!(retrieval.documents.iter().all(|d| d.provenance == SourceKind::Vector));
}

#[tokio::test]
async fn test_misspelled_organization_finds_same_documents() {
    let corpus = sample_corpus();
    let resolver = EntityResolver::new(corpus.organizations());
    let source = StructuredSource::new(corpus).with_resolver(resolver);

    let exact = source.search("", &kepco(), 10).await.unwrap();
    let typo = Constraints {
        organization: Some("한국전력공샤".to_string()),
        ..Default::default()
    };
    let corrected = source.search("", &typo, 10).await.unwrap();

    assert!(!exact.is_empty());
    let ids = |docs: &[auditrag::Document]| docs.iter().map(|d| d.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&exact), ids(&corrected));
}

#[tokio::test]
async fn test_global_override_caps_each_source() {
    let overrides = SourceOverrides::from_json(&serde_json::json!({"k": 2})).unwrap();
    let retrieval = coordinator()
        .retrieve(Category::GeneralSearch, "출장비", &Constraints::default(), 5, &overrides)
        .await
        .unwrap();

    assert_eq!(retrieval.reports[0].source, SourceKind::Vector);
    assert_eq!(retrieval.reports[0].retrieved, 2);
    assert_eq!(retrieval.documents.len(), 2);
}
