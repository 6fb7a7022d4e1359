// src/matcher.rs
//
// Temporal alignment. Raw ANN hits are full of coincidences; a real
// match shows up as many hits agreeing on one offset between query time
// and reference time. Random hits scatter across offsets, true hits pile
// into a single histogram bucket, so a counting test separates them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::index::SearchResult;

/// Match acceptance and scoring parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// ANN neighbors fetched per query vector.
    pub search_neighbors: usize,
    /// Width of one offset histogram bucket, in seconds.
    pub bucket_width_s: f64,
    /// Minimum query anchors in the peak bucket for a track to qualify.
    pub min_matched_vectors: usize,
    /// The peak bucket must hold at least this multiple of the
    /// second-highest bucket.
    pub peak_ratio: f64,
    /// Matches below this confidence are dropped.
    pub min_confidence: f64,
    /// Blend the hit-count confidence with the mean ANN score of the
    /// peak bucket (geometric mean).
    pub blend_scores: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            search_neighbors: 5,
            bucket_width_s: 0.05,
            min_matched_vectors: 5,
            peak_ratio: 2.0,
            min_confidence: 0.1,
            blend_scores: false,
        }
    }
}

/// An accepted track match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub track_id: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Estimated offset of the query within the reference track: the
    /// reference time corresponding to query time zero.
    pub time_offset_s: f64,
    /// Earliest query time contributing to the aligned bucket.
    pub query_time_s: f64,
    /// Query anchors agreeing on the winning offset.
    pub matched_vectors: usize,
}

#[derive(Default)]
struct Bucket {
    count: usize,
    score_sum: f64,
    min_query_time: f64,
}

/// Collapse raw ANN hits into ranked track matches.
///
/// Within each track, every query anchor counts once: its best-scoring
/// hit. Raw ANN output carries `search_neighbors` hits per query
/// vector, which would cap the peak-to-total ratio near the reciprocal
/// of the neighbor count.
///
/// No qualifying track is not an error; the result is simply empty.
pub fn rank_matches(
    hits: &[SearchResult],
    config: &MatcherConfig,
    token: &CancelToken,
) -> Result<Vec<Match>> {
    let mut by_track: HashMap<&str, Vec<&SearchResult>> = HashMap::new();
    for hit in hits {
        by_track.entry(hit.track_id.as_str()).or_default().push(hit);
    }

    let mut matches = Vec::new();
    for (track_id, track_hits) in by_track {
        token.checkpoint()?;

        let track_hits = best_hit_per_anchor(&track_hits);

        let mut histogram: HashMap<i64, Bucket> = HashMap::new();
        for hit in &track_hits {
            let delta = hit.ref_time_s - hit.query_time_s;
            let bucket_idx = (delta / config.bucket_width_s).round() as i64;
            let bucket = histogram.entry(bucket_idx).or_insert(Bucket {
                count: 0,
                score_sum: 0.0,
                min_query_time: hit.query_time_s,
            });
            bucket.count += 1;
            bucket.score_sum += hit.score as f64;
            bucket.min_query_time = bucket.min_query_time.min(hit.query_time_s);
        }

        // Peak bucket; deterministic tie-break on the smaller offset.
        let Some((&peak_idx, peak)) = histogram.iter().max_by(|(ia, a), (ib, b)| {
            a.count
                .cmp(&b.count)
                .then_with(|| ib.abs().cmp(&ia.abs()))
                .then_with(|| ib.cmp(ia))
        }) else {
            continue;
        };
        let second_count = histogram
            .iter()
            .filter(|(&idx, _)| idx != peak_idx)
            .map(|(_, b)| b.count)
            .max()
            .unwrap_or(0);

        if peak.count < config.min_matched_vectors {
            continue;
        }
        if (peak.count as f64) < config.peak_ratio * second_count as f64 {
            continue;
        }

        let total = track_hits.len();
        let mut confidence = (peak.count as f64 / total as f64).clamp(0.0, 1.0);
        if config.blend_scores {
            let mean_score = peak.score_sum / peak.count as f64;
            confidence = (confidence * mean_score).sqrt().clamp(0.0, 1.0);
        }
        if confidence < config.min_confidence {
            continue;
        }

        matches.push(Match {
            track_id: track_id.to_string(),
            confidence,
            time_offset_s: peak_idx as f64 * config.bucket_width_s,
            query_time_s: peak.min_query_time,
            matched_vectors: peak.count,
        });
    }

    matches.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.matched_vectors.cmp(&a.matched_vectors))
            .then_with(|| a.time_offset_s.abs().total_cmp(&b.time_offset_s.abs()))
            .then_with(|| a.track_id.cmp(&b.track_id))
    });
    Ok(matches)
}

/// Reduce a track's hits to one per query anchor, keeping the highest
/// score. Anchors are keyed by their query time; anchors sharing a
/// frame collapse together, which is harmless since their aligned hits
/// share a bucket anyway.
fn best_hit_per_anchor<'a>(track_hits: &[&'a SearchResult]) -> Vec<&'a SearchResult> {
    let mut best: HashMap<u64, &SearchResult> = HashMap::new();
    for &hit in track_hits {
        let key = hit.query_time_s.to_bits();
        match best.get(&key) {
            Some(existing) if existing.score >= hit.score => {}
            _ => {
                best.insert(key, hit);
            }
        }
    }
    let mut deduped: Vec<&SearchResult> = best.into_values().collect();
    deduped.sort_by(|a, b| a.query_time_s.total_cmp(&b.query_time_s));
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(track_id: &str, ref_time_s: f64, query_time_s: f64, score: f32) -> SearchResult {
        SearchResult {
            track_id: track_id.to_string(),
            score,
            ref_time_s,
            query_time_s,
            matched_vector_id: 0,
        }
    }

    /// Hits whose offsets all agree on `offset` seconds, with query
    /// anchors starting at `q_start`.
    fn aligned_hits_from(track_id: &str, offset: f64, n: usize, q_start: f64) -> Vec<SearchResult> {
        (0..n)
            .map(|i| {
                let q = q_start + i as f64 * 0.1;
                hit(track_id, q + offset, q, 0.9)
            })
            .collect()
    }

    fn aligned_hits(track_id: &str, offset: f64, n: usize) -> Vec<SearchResult> {
        aligned_hits_from(track_id, offset, n, 0.0)
    }

    #[test]
    fn test_aligned_hits_match_with_offset() {
        let hits = aligned_hits("t1", 10.0, 12);
        let matches = rank_matches(&hits, &MatcherConfig::default(), &CancelToken::new()).unwrap();
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.track_id, "t1");
        assert!((m.time_offset_s - 10.0).abs() <= 0.05);
        assert_eq!(m.matched_vectors, 12);
        assert!((m.confidence - 1.0).abs() < 1e-9);
        assert!(m.query_time_s.abs() < 1e-9);
    }

    #[test]
    fn test_scattered_hits_rejected() {
        // Twelve hits, every one at a different offset.
        let hits: Vec<SearchResult> = (0..12)
            .map(|i| hit("t1", i as f64 * 7.3, i as f64 * 0.1, 0.9))
            .collect();
        let matches = rank_matches(&hits, &MatcherConfig::default(), &CancelToken::new()).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_min_matched_vectors_gate() {
        let hits = aligned_hits("t1", 5.0, 4); // below the default of 5
        let matches = rank_matches(&hits, &MatcherConfig::default(), &CancelToken::new()).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_peak_ratio_gate() {
        // Six anchors at one offset, five others at another: 6 < 2.0 * 5.
        let mut hits = aligned_hits("t1", 5.0, 6);
        hits.extend(aligned_hits_from("t1", 20.0, 5, 2.0));
        let matches = rank_matches(&hits, &MatcherConfig::default(), &CancelToken::new()).unwrap();
        assert!(matches.is_empty());

        // Ten against four passes the ratio; confidence is 10/14.
        let mut hits = aligned_hits("t1", 5.0, 10);
        hits.extend(aligned_hits_from("t1", 20.0, 4, 2.0));
        let matches = rank_matches(&hits, &MatcherConfig::default(), &CancelToken::new()).unwrap();
        assert_eq!(matches.len(), 1);
        assert!((matches[0].confidence - 10.0 / 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_ranking_prefers_higher_confidence() {
        let mut hits = aligned_hits("strong", 3.0, 20);
        hits.extend(aligned_hits("weak", 8.0, 10));
        // Ten further "weak" anchors whose offsets scatter.
        hits.extend((0..10).map(|i| hit("weak", i as f64 * 7.3, 2.0 + i as f64 * 0.1, 0.5)));

        let matches = rank_matches(&hits, &MatcherConfig::default(), &CancelToken::new()).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].track_id, "strong");
        assert_eq!(matches[1].track_id, "weak");
        assert!((matches[0].confidence - 1.0).abs() < 1e-9);
        assert!((matches[1].confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_neighbor_fan_out_does_not_dilute_confidence() {
        // Every query anchor returns one aligned hit plus three weaker
        // scattered neighbors, as a multi-neighbor search would.
        let mut hits = Vec::new();
        for i in 0..8 {
            let q = i as f64 * 0.1;
            hits.push(hit("t1", q + 3.0, q, 0.95));
            for j in 0..3 {
                hits.push(hit("t1", q + 11.0 + (i * 3 + j) as f64 * 4.7, q, 0.4));
            }
        }

        let matches = rank_matches(&hits, &MatcherConfig::default(), &CancelToken::new()).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].matched_vectors, 8);
        assert!((matches[0].confidence - 1.0).abs() < 1e-9);
        assert!((matches[0].time_offset_s - 3.0).abs() <= 0.05);
    }

    #[test]
    fn test_equal_confidence_tie_breaks_lexicographic() {
        let mut hits = aligned_hits("beta", 2.0, 8);
        hits.extend(aligned_hits("alpha", 2.0, 8));
        let matches = rank_matches(&hits, &MatcherConfig::default(), &CancelToken::new()).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].track_id, "alpha");
        assert_eq!(matches[1].track_id, "beta");
    }

    #[test]
    fn test_blended_confidence_uses_scores() {
        let hits = aligned_hits("t1", 1.0, 10); // scores all 0.9
        let config = MatcherConfig {
            blend_scores: true,
            ..MatcherConfig::default()
        };
        let matches = rank_matches(&hits, &config, &CancelToken::new()).unwrap();
        // Geometric mean of 1.0 ratio and 0.9 mean score.
        assert!((matches[0].confidence - 0.9f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_empty_hits_empty_matches() {
        let matches =
            rank_matches(&[], &MatcherConfig::default(), &CancelToken::new()).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_negative_offset_allowed() {
        // Query starts before the reference content: offset is negative.
        let hits: Vec<SearchResult> = (0..8)
            .map(|i| {
                let q = 2.0 + i as f64 * 0.1;
                hit("t1", q - 2.0, q, 0.9)
            })
            .collect();
        let matches = rank_matches(&hits, &MatcherConfig::default(), &CancelToken::new()).unwrap();
        assert_eq!(matches.len(), 1);
        assert!((matches[0].time_offset_s + 2.0).abs() <= 0.05);
    }
}
