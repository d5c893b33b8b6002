//! Exact-token inverted index for keyword search.
//!
//! Maps keyword → document id → posting. A reverse map (document → keywords)
//! makes deletion proportional to the document's keywords; it is rebuilt
//! after deserialization rather than stored.

use crate::config;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One document's entry under a keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    /// First [`config::CONTENT_PREVIEW_CHARS`] characters of the document.
    pub content_preview: String,
    pub score: f32,
}

/// A keyword search result.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
    pub doc_id: String,
    pub content_preview: String,
    /// Sum of the document's posting scores over all matched keywords.
    pub score: f32,
    /// Normalized query keywords that matched, in query order.
    pub matched_keywords: Vec<String>,
}

/// Inverted index mapping keywords to document postings.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct KeywordIndex {
    /// keyword → doc_id → posting
    pub postings: HashMap<String, HashMap<String, Posting>>,
    /// doc_id → keywords. Derived from `postings`.
    #[serde(skip)]
    doc_keywords: HashMap<String, BTreeSet<String>>,
}

/// Trim and lowercase a keyword; `None` if nothing is left.
pub fn normalize_keyword(keyword: &str) -> Option<String> {
    let k = keyword.trim().to_lowercase();
    (!k.is_empty()).then_some(k)
}

/// Bounded, char-boundary-safe preview of `content`.
pub fn content_preview(content: &str) -> String {
    content.chars().take(config::CONTENT_PREVIEW_CHARS).collect()
}

/// Case-insensitive occurrences of `keyword` in `content_lower`, at least 1.
fn keyword_score(keyword: &str, content_lower: &str) -> f32 {
    content_lower.matches(keyword).count().max(1) as f32
}

impl KeywordIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the document → keywords map from `postings`.
    pub fn rebuild_reverse(&mut self) {
        self.doc_keywords.clear();
        for (keyword, docs) in &self.postings {
            for doc_id in docs.keys() {
                self.doc_keywords
                    .entry(doc_id.clone())
                    .or_default()
                    .insert(keyword.clone());
            }
        }
    }

    /// Add postings for `doc_id` under each keyword. Existing postings for the
    /// same keyword and document are replaced.
    pub fn add_document<S: AsRef<str>>(&mut self, doc_id: &str, keywords: &[S], content: &str) -> usize {
        let preview = content_preview(content);
        let content_lower = content.to_lowercase();
        let mut added = 0;
        for keyword in keywords.iter().filter_map(|k| normalize_keyword(k.as_ref())) {
            let posting = Posting {
                content_preview: preview.clone(),
                score: keyword_score(&keyword, &content_lower),
            };
            self.postings
                .entry(keyword.clone())
                .or_default()
                .insert(doc_id.to_string(), posting);
            if self
                .doc_keywords
                .entry(doc_id.to_string())
                .or_default()
                .insert(keyword)
            {
                added += 1;
            }
        }
        added
    }

    /// Remove every posting of `doc_id`, dropping keywords left without
    /// postings. Returns `true` if the document was indexed.
    pub fn remove_document(&mut self, doc_id: &str) -> bool {
        let Some(keywords) = self.doc_keywords.remove(doc_id) else {
            return false;
        };
        for keyword in keywords {
            if let Some(docs) = self.postings.get_mut(&keyword) {
                docs.remove(doc_id);
                if docs.is_empty() {
                    self.postings.remove(&keyword);
                }
            }
        }
        true
    }

    /// Additive search: each matched keyword adds its posting score to the
    /// document's total. Returns at most `limit` hits, best first.
    pub fn search<S: AsRef<str>>(&self, keywords: &[S], limit: usize) -> Vec<KeywordHit> {
        let mut totals: HashMap<&str, KeywordHit> = HashMap::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();

        for keyword in keywords.iter().filter_map(|k| normalize_keyword(k.as_ref())) {
            if !seen.insert(keyword.clone()) {
                continue;
            }
            let Some(docs) = self.postings.get(&keyword) else {
                continue;
            };
            for (doc_id, posting) in docs {
                let hit = totals.entry(doc_id.as_str()).or_insert_with(|| KeywordHit {
                    doc_id: doc_id.clone(),
                    content_preview: posting.content_preview.clone(),
                    score: 0.0,
                    matched_keywords: Vec::new(),
                });
                hit.score += posting.score;
                hit.matched_keywords.push(keyword.clone());
            }
        }

        let mut hits: Vec<KeywordHit> = totals.into_values().collect();
        hits.sort_by(|a, b| {
            OrderedFloat(b.score)
                .cmp(&OrderedFloat(a.score))
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        hits.truncate(limit);
        hits
    }

    /// Keywords currently indexed for `doc_id`, sorted.
    pub fn document_keywords(&self, doc_id: &str) -> Vec<String> {
        self.doc_keywords
            .get(doc_id)
            .map(|k| k.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of distinct keywords with at least one posting.
    pub fn keyword_count(&self) -> usize {
        self.postings.len()
    }

    /// Number of indexed documents.
    pub fn document_count(&self) -> usize {
        self.doc_keywords.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_document_updates_index() {
        let mut idx = KeywordIndex::new();
        idx.add_document("d1", &["Rust", " async "], "Rust async runtimes");
        assert!(idx.postings.contains_key("rust"));
        assert!(idx.postings.contains_key("async"));
        assert_eq!(idx.document_count(), 1);
        assert_eq!(idx.document_keywords("d1"), vec!["async", "rust"]);
    }

    #[test]
    fn test_score_counts_occurrences() {
        let mut idx = KeywordIndex::new();
        idx.add_document("d1", &["rust", "go"], "Rust rust RUST");
        assert_eq!(idx.postings["rust"]["d1"].score, 3.0);
        assert_eq!(idx.postings["go"]["d1"].score, 1.0);
    }

    #[test]
    fn test_empty_keywords_ignored() {
        let mut idx = KeywordIndex::new();
        assert_eq!(idx.add_document("d1", &["", "   "], "text"), 0);
        assert_eq!(idx.keyword_count(), 0);
    }

    #[test]
    fn test_preview_is_bounded() {
        let long = "é".repeat(500);
        let mut idx = KeywordIndex::new();
        idx.add_document("d1", &["x"], &long);
        assert_eq!(
            idx.postings["x"]["d1"].content_preview.chars().count(),
            config::CONTENT_PREVIEW_CHARS
        );
    }

    #[test]
    fn test_remove_document_cleans_empty_keywords() {
        let mut idx = KeywordIndex::new();
        idx.add_document("d1", &["hello", "world"], "hello world");
        idx.add_document("d2", &["hello", "rust"], "hello rust");
        assert!(idx.remove_document("d1"));
        // "world" only appeared in d1, should be gone
        assert!(!idx.postings.contains_key("world"));
        assert_eq!(idx.postings["hello"].len(), 1);
        assert!(idx.postings["hello"].contains_key("d2"));

        assert!(idx.remove_document("d2"));
        assert!(idx.postings.is_empty());
    }

    #[test]
    fn test_remove_nonexistent_doc() {
        let mut idx = KeywordIndex::new();
        idx.add_document("d1", &["hello"], "hello");
        assert!(!idx.remove_document("d99"));
        assert_eq!(idx.document_count(), 1);
    }

    #[test]
    fn test_search_additive_ranking() {
        let mut idx = KeywordIndex::new();
        idx.add_document("both", &["rust", "storage"], "rust storage");
        idx.add_document("one", &["rust"], "rust");
        idx.add_document("other", &["python"], "python");

        let hits = idx.search(&["rust", "storage", "missing"], 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id, "both");
        assert_eq!(hits[0].score, 2.0);
        assert_eq!(hits[0].matched_keywords, vec!["rust", "storage"]);
        assert_eq!(hits[1].doc_id, "one");
        assert_eq!(hits[1].matched_keywords, vec!["rust"]);
    }

    #[test]
    fn test_search_limit_and_case() {
        let mut idx = KeywordIndex::new();
        for i in 0..5 {
            idx.add_document(&format!("d{i}"), &["Shared"], "shared");
        }
        let hits = idx.search(&["SHARED"], 3);
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_duplicate_query_keywords_count_once() {
        let mut idx = KeywordIndex::new();
        idx.add_document("d1", &["rust"], "rust");
        let hits = idx.search(&["rust", "Rust"], 10);
        assert_eq!(hits[0].score, 1.0);
    }

    #[test]
    fn test_reverse_map_rebuilt_after_deserialize() {
        let mut idx = KeywordIndex::new();
        idx.add_document("d1", &["a", "b"], "a b");
        let bytes = bincode::serialize(&idx).unwrap();
        let mut back: KeywordIndex = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.document_count(), 0);
        back.rebuild_reverse();
        assert_eq!(back.document_keywords("d1"), vec!["a", "b"]);
        assert!(back.remove_document("d1"));
        assert!(back.postings.is_empty());
    }
}
