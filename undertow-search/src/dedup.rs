//! Candidate deduplication across providers.

use std::collections::HashMap;

use undertow_core::{InfoHash, magnet};

use crate::types::StreamCandidate;

/// Lowercase hex info hash of a candidate, from its `info_hash` field or
/// else from the `xt` parameter of its magnet.
pub fn identity_hash(candidate: &StreamCandidate) -> Option<String> {
    candidate
        .info_hash
        .as_deref()
        .and_then(|hash| InfoHash::parse(hash).ok())
        .map(|hash| hash.to_hex())
        .or_else(|| {
            candidate
                .url
                .as_deref()
                .and_then(magnet::info_hash_from_magnet)
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DedupKey {
    Hash(String),
    Magnet(String),
}

fn dedup_key(candidate: &StreamCandidate) -> Option<DedupKey> {
    if let Some(hash) = identity_hash(candidate) {
        return Some(DedupKey::Hash(hash));
    }
    candidate
        .url
        .as_deref()
        .map(magnet::normalize)
        .filter(|key| !key.is_empty())
        .map(DedupKey::Magnet)
}

/// Fills fields the kept candidate lacks from a later duplicate.
fn absorb(kept: &mut StreamCandidate, duplicate: StreamCandidate) {
    kept.seeds = kept.seeds.or(duplicate.seeds);
    kept.leechers = kept.leechers.or(duplicate.leechers);
    kept.size_bytes = kept.size_bytes.or(duplicate.size_bytes);
    kept.url = kept.url.take().or(duplicate.url);
    if kept.languages.is_empty() {
        kept.languages = duplicate.languages;
    }
}

/// Merges duplicate candidates, keeping first-seen order.
///
/// Identity is the info hash (case-insensitive, base32 accepted) when one is
/// known, otherwise the tracker-stripped magnet. The first occurrence wins
/// and absorbs missing counts from later duplicates. Candidates with no
/// identity at all pass through untouched.
pub fn dedupe(candidates: Vec<StreamCandidate>) -> Vec<StreamCandidate> {
    let mut kept: Vec<StreamCandidate> = Vec::with_capacity(candidates.len());
    let mut index: HashMap<DedupKey, usize> = HashMap::new();

    for candidate in candidates {
        match dedup_key(&candidate) {
            Some(key) => match index.get(&key) {
                Some(&position) => absorb(&mut kept[position], candidate),
                None => {
                    index.insert(key, kept.len());
                    kept.push(candidate);
                }
            },
            None => kept.push(candidate),
        }
    }
    kept
}
