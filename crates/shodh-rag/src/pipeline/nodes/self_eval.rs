//! Self-evaluator node (distilled §4.9 "SelfEvaluator"). No LLM call — a
//! pure score threshold over the top reranked chunk. Grounded on
//! `original_source/l88_backend/graph/nodes/self_evaluator.py`.

use crate::pipeline::state::{PipelineState, Verdict};

/// Assumes `state.chunks` is already sorted descending by `rerank_score`
/// (guaranteed by the Reranker). An empty chunk set is BAD/not confident
/// without consulting the thresholds at all.
pub fn self_evaluate(state: &mut PipelineState, confidence_threshold: f32, unsure_threshold: f32) {
    let verdict = match state.chunks.first() {
        None => Verdict::Bad,
        Some(top) => {
            let top_score = top.rerank_score.unwrap_or(0.0);
            if top_score >= confidence_threshold {
                Verdict::Good
            } else if top_score >= unsure_threshold {
                Verdict::Unsure
            } else {
                Verdict::Bad
            }
        }
    };

    state.confident = verdict == Verdict::Good;
    state.verdict = Some(verdict);
    state.last_verdict = Some(verdict.as_str().to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, Source};

    fn chunk_with_score(score: f32) -> Chunk {
        Chunk {
            text: "x".into(),
            doc_id: "d1".into(),
            filename: "a.pdf".into(),
            page: 1,
            chunk_idx: 0,
            source: Source::Session,
            score: None,
            bm25_score: None,
            rerank_score: Some(score),
        }
    }

    fn state_with(chunks: Vec<Chunk>) -> PipelineState {
        let mut s = PipelineState::new("q".into(), "s1".into(), vec![], false);
        s.chunks = chunks;
        s
    }

    #[test]
    fn empty_chunks_is_bad_and_not_confident() {
        let mut s = state_with(vec![]);
        self_evaluate(&mut s, 0.7, 0.4);
        assert_eq!(s.verdict, Some(Verdict::Bad));
        assert!(!s.confident);
    }

    #[test]
    fn high_top_score_is_good_and_confident() {
        let mut s = state_with(vec![chunk_with_score(0.82)]);
        self_evaluate(&mut s, 0.7, 0.4);
        assert_eq!(s.verdict, Some(Verdict::Good));
        assert!(s.confident);
    }

    #[test]
    fn mid_top_score_is_unsure_and_not_confident() {
        let mut s = state_with(vec![chunk_with_score(0.5)]);
        self_evaluate(&mut s, 0.7, 0.4);
        assert_eq!(s.verdict, Some(Verdict::Unsure));
        assert!(!s.confident);
    }

    #[test]
    fn low_top_score_is_bad() {
        let mut s = state_with(vec![chunk_with_score(0.1)]);
        self_evaluate(&mut s, 0.7, 0.4);
        assert_eq!(s.verdict, Some(Verdict::Bad));
        assert!(!s.confident);
    }
}
