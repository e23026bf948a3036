//! In-memory search index
//!
//! Inverted index per entity type: token -> ids. Matching per query token:
//! - exact token: 1.0
//! - prefix of an indexed token: 0.5
//! - one edit away (query tokens of 5+ chars): 0.3
//!
//! A document's score is the sum over query tokens of its best match.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::tokenizer::tokenize;
use super::{check_page, page_offset, SearchFields, SearchIndex, SearchPage};
use crate::error::SearchError;

const EXACT_SCORE: f32 = 1.0;
const PREFIX_SCORE: f32 = 0.5;
const TYPO_SCORE: f32 = 0.3;
const TYPO_MIN_CHARS: usize = 5;

#[derive(Debug, Default)]
struct TypeIndex {
    /// id -> tokens, kept so a document can be unindexed
    documents: HashMap<i64, Vec<String>>,
    /// token -> ids
    postings: HashMap<String, BTreeSet<i64>>,
}

impl TypeIndex {
    fn remove(&mut self, id: i64) -> bool {
        let Some(tokens) = self.documents.remove(&id) else {
            return false;
        };
        for token in tokens {
            if let Some(ids) = self.postings.get_mut(&token) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.postings.remove(&token);
                }
            }
        }
        true
    }

    fn insert(&mut self, id: i64, fields: &SearchFields) {
        self.remove(id);

        let mut tokens: Vec<String> = fields.values().flat_map(|text| tokenize(text)).collect();
        tokens.sort();
        tokens.dedup();

        for token in &tokens {
            self.postings.entry(token.clone()).or_default().insert(id);
        }
        self.documents.insert(id, tokens);
    }

    fn score(&self, query_tokens: &[String]) -> HashMap<i64, f32> {
        let mut scores: HashMap<i64, f32> = HashMap::new();

        for query in query_tokens {
            let mut best: HashMap<i64, f32> = HashMap::new();
            let allow_typo = query.chars().count() >= TYPO_MIN_CHARS;

            for (token, ids) in &self.postings {
                let score = if token == query {
                    EXACT_SCORE
                } else if token.starts_with(query.as_str()) {
                    PREFIX_SCORE
                } else if allow_typo && fuzzy_match(query, token, 1) {
                    TYPO_SCORE
                } else {
                    continue;
                };

                for id in ids {
                    let entry = best.entry(*id).or_default();
                    if score > *entry {
                        *entry = score;
                    }
                }
            }

            for (id, score) in best {
                *scores.entry(id).or_default() += score;
            }
        }

        scores
    }
}

/// In-process index. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryIndex {
    types: RwLock<HashMap<String, TypeIndex>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed documents of one type
    pub fn document_count(&self, entity_type: &str) -> usize {
        self.types
            .read()
            .get(entity_type)
            .map(|t| t.documents.len())
            .unwrap_or(0)
    }

    pub fn contains(&self, entity_type: &str, id: i64) -> bool {
        self.types
            .read()
            .get(entity_type)
            .map(|t| t.documents.contains_key(&id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upsert(&self, entity_type: &str, id: i64, fields: &SearchFields) -> Result<(), SearchError> {
        self.types
            .write()
            .entry(entity_type.to_string())
            .or_default()
            .insert(id, fields);
        Ok(())
    }

    async fn delete(&self, entity_type: &str, id: i64) -> Result<(), SearchError> {
        if let Some(index) = self.types.write().get_mut(entity_type) {
            index.remove(id);
        }
        Ok(())
    }

    async fn query(
        &self,
        entity_type: &str,
        phrase: &str,
        page: u32,
        per_page: u32,
    ) -> Result<SearchPage, SearchError> {
        check_page(page, per_page)?;

        let query_tokens = tokenize(phrase);
        if query_tokens.is_empty() {
            return Ok(SearchPage::empty());
        }

        let scores = match self.types.read().get(entity_type) {
            Some(index) => index.score(&query_tokens),
            None => return Ok(SearchPage::empty()),
        };

        let mut ranked: Vec<(i64, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let total = ranked.len() as u64;
        let ids = ranked
            .into_iter()
            .skip(page_offset(page, per_page) as usize)
            .take(per_page as usize)
            .map(|(id, _)| id)
            .collect();

        Ok(SearchPage { ids, total })
    }
}

/// Edit-distance match within `max_distance`
fn fuzzy_match(s1: &str, s2: &str, max_distance: usize) -> bool {
    if s1 == s2 {
        return true;
    }

    let len1 = s1.chars().count();
    let len2 = s2.chars().count();

    if len1.abs_diff(len2) > max_distance {
        return false;
    }

    levenshtein_distance(s1, s2) <= max_distance
}

fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();

    if s1_chars.is_empty() {
        return s2_chars.len();
    }
    if s2_chars.is_empty() {
        return s1_chars.len();
    }

    // Two-row dynamic programming
    let mut prev: Vec<usize> = (0..=s2_chars.len()).collect();
    let mut curr = vec![0usize; s2_chars.len() + 1];

    for (i, c1) in s1_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, c2) in s2_chars.iter().enumerate() {
            let cost = if c1 == c2 { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[s2_chars.len()]
}
