//! Router node (distilled §4.9 "Router") — pure logic, no LLM call.
//! Grounded on `original_source/l88_backend/graph/nodes/router.py`.

use super::state::Route;

/// Summarization keyword set. A superset of the distilled spec's listed set
/// (SPEC_FULL.md §4.9 Router): also includes `tl-dr` alongside `tl;dr`,
/// recovered from the reference implementation.
const SUMMARIZE_KEYWORDS: &[&str] = &[
    "summarize",
    "summary",
    "summarise",
    "overview",
    "tldr",
    "tl;dr",
    "tl-dr",
    "brief",
    "outline",
    "recap",
    "summerize",
    "summerise",
];

/// Computes the route without calling the LLM. `web_mode` overrides
/// everything else and always forces `rag` (library-only) search.
pub fn route(query: &str, has_selected_docs: bool, web_mode: bool) -> Route {
    if web_mode {
        return Route::Rag;
    }

    let query_lower = query.to_lowercase();
    let is_summarize = SUMMARIZE_KEYWORDS.iter().any(|kw| query_lower.contains(kw));

    if has_selected_docs && is_summarize {
        Route::Summarize
    } else if has_selected_docs {
        Route::Rag
    } else {
        Route::Chat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_mode_forces_rag_even_without_selection() {
        assert_eq!(route("anything", false, true), Route::Rag);
    }

    #[test]
    fn no_docs_and_no_web_mode_is_chat() {
        assert_eq!(route("what is the capital of France?", false, false), Route::Chat);
    }

    #[test]
    fn selected_docs_without_summarize_keyword_is_rag() {
        assert_eq!(route("what is the main finding?", true, false), Route::Rag);
    }

    #[test]
    fn summarize_keyword_with_selected_docs_routes_to_summarize() {
        assert_eq!(route("Please summarize this paper", true, false), Route::Summarize);
        assert_eq!(route("give me a tl-dr", true, false), Route::Summarize);
        assert_eq!(route("tl;dr please", true, false), Route::Summarize);
    }

    #[test]
    fn summarize_keyword_without_selected_docs_is_chat() {
        assert_eq!(route("summarize the history of Rome", false, false), Route::Chat);
    }
}
