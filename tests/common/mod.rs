//! Scripted capability doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use auditrag::capabilities::{CompletionModel, GraphPattern, GraphSearch, SearchFilters, VectorSearch};
use auditrag::corpus::InMemoryCorpus;
use auditrag::validation::{Judgment, RelevanceJudge};
use auditrag::{CapabilityError, Document, QueryContext};
use auditrag::types::SourceKind;

pub fn sample_corpus_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data").join("sample_corpus.json")
}

pub fn sample_corpus() -> Arc<InMemoryCorpus> {
    Arc::new(InMemoryCorpus::load(&sample_corpus_path()).unwrap())
}

/// Audit-shaped document with date and company metadata
pub fn doc(id: &str, date: &str, company: &str, text: &str) -> Document {
    Document::new(id, format!("Title: {}\nDate: {}\nCompany: {}\nProblem: {}", text, date, company, text), SourceKind::Vector)
        .with_metadata("date", date)
        .with_metadata("company", company)
        .with_metadata("title", text)
        .with_metadata("problems", text)
}

/// Returns the same documents on every call
pub struct StaticVector {
    docs: Vec<Document>,
    calls: AtomicUsize,
}

impl StaticVector {
    pub fn new(docs: Vec<Document>) -> Self {
        Self {
            docs,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorSearch for StaticVector {
    async fn search(
        &self,
        _query_text: &str,
        top_k: usize,
        _soft_filters: &SearchFilters,
    ) -> Result<Vec<Document>, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.docs.iter().take(top_k).cloned().collect())
    }
}

/// Fails every call with the given error
pub struct FailingVector(pub CapabilityError);

#[async_trait]
impl VectorSearch for FailingVector {
    async fn search(&self, _: &str, _: usize, _: &SearchFilters) -> Result<Vec<Document>, CapabilityError> {
        Err(self.0.clone())
    }
}

/// Sleeps past any reasonable timeout before answering
pub struct SlowVector(pub Duration);

#[async_trait]
impl VectorSearch for SlowVector {
    async fn search(&self, _: &str, _: usize, _: &SearchFilters) -> Result<Vec<Document>, CapabilityError> {
        tokio::time::sleep(self.0).await;
        Ok(Vec::new())
    }
}

/// Graph store that is never reachable
pub struct UnreachableGraph;

#[async_trait]
impl GraphSearch for UnreachableGraph {
    async fn search(&self, _: &GraphPattern) -> Result<Vec<Document>, CapabilityError> {
        Err(CapabilityError::transient("graph_search", "connection reset"))
    }
}

/// Accepts exactly the listed document ids
pub struct AcceptIds {
    ids: HashSet<String>,
    judged: AtomicUsize,
}

impl AcceptIds {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            judged: AtomicUsize::new(0),
        }
    }

    pub fn none() -> Self {
        Self::new(&[])
    }

    pub fn judged(&self) -> usize {
        self.judged.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelevanceJudge for AcceptIds {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn judge(&self, _ctx: &QueryContext, doc: &Document) -> Result<Judgment, CapabilityError> {
        self.judged.fetch_add(1, Ordering::SeqCst);
        if self.ids.contains(&doc.id) {
            Ok(Judgment::accepted(vec!["listed".to_string()]))
        } else {
            Ok(Judgment::rejected(vec![format!("{} is not listed", doc.id)]))
        }
    }
}

/// Fails every judgment with the given error
pub struct FailingJudge(pub CapabilityError);

#[async_trait]
impl RelevanceJudge for FailingJudge {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn judge(&self, _ctx: &QueryContext, _doc: &Document) -> Result<Judgment, CapabilityError> {
        Err(self.0.clone())
    }
}

/// Replays canned replies in order, repeating the last one
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, CapabilityError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, CapabilityError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String, CapabilityError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies
                .front()
                .cloned()
                .unwrap_or_else(|| Err(CapabilityError::transient("generate", "no scripted reply")))
        }
    }
}
