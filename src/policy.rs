//! Policy-context retrieval for draft generation
//!
//! The multi-agent drafting stage grounds urgent replies in local policy
//! snippets. Retrieval is best-effort: an empty result set is a valid
//! answer and failures never block drafting.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

use crate::error::Result;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9']+").unwrap());

/// Ordered policy snippets for a query.
#[async_trait]
pub trait PolicyRetriever: Send + Sync {
    /// Return the most relevant policy snippets, best first. An empty
    /// vector means no applicable policy was found.
    async fn retrieve(&self, query: &str) -> Result<Vec<String>>;
}

/// Local-directory retriever ranking `.md`/`.txt` files by keyword overlap
/// with the query.
pub struct DirectoryPolicyStore {
    dir: PathBuf,
    top_k: usize,
}

impl DirectoryPolicyStore {
    pub fn new(dir: impl Into<PathBuf>, top_k: usize) -> Self {
        Self {
            dir: dir.into(),
            top_k,
        }
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    WORD.find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Overlap score between a query and one snippet.
fn score(query_tokens: &HashSet<String>, snippet: &str) -> usize {
    let snippet_tokens = tokenize(snippet);
    query_tokens.intersection(&snippet_tokens).count()
}

#[async_trait]
impl PolicyRetriever for DirectoryPolicyStore {
    async fn retrieve(&self, query: &str) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = ?self.dir, "policy directory unavailable: {}", e);
                return Ok(vec![]);
            }
        };

        let query_tokens = tokenize(query);
        let mut scored: Vec<(usize, String, String)> = Vec::new();

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let is_text = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("md") | Some("txt")
            );
            if !is_text {
                continue;
            }
            let Ok(content) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            scored.push((score(&query_tokens, &content), name, content));
        }

        // Best score first; tie-break on file name for a stable ordering
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.retain(|(s, _, _)| *s > 0);
        scored.truncate(self.top_k);

        Ok(scored.into_iter().map(|(_, _, content)| content).collect())
    }
}
