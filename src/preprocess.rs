//! Multilingual (Korean/English) search-query reduction.
//!
//! [`preprocess`] drops standalone stopwords and particles from a query before it
//! is handed to retrieval. Particles fused onto a word (`메뮤에서`, `Claude에서`)
//! are part of the token and are never stripped. If the reduction leaves two or
//! fewer visible characters, the original query is returned untouched.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Reductions at or below this many non-space characters fall back to the input.
const MIN_VISIBLE_CHARS: usize = 2;

/// Standalone Korean particles, conjunctions, and function words.
const KOREAN_STOPWORDS: &[&str] = &[
    // particles written as separate tokens
    "이", "가", "은", "는", "을", "를", "의", "에", "에서", "에게", "께", "한테",
    "로", "으로", "와", "과", "도", "만", "까지", "부터", "보다", "처럼", "하고",
    "이나", "나", "랑", "이랑", "요",
    // conjunctions and discourse markers
    "그리고", "그러나", "그런데", "하지만", "그래서", "그러면", "그러니까", "또는",
    "및", "또", "즉", "혹은",
    // demonstratives
    "그", "저", "이것", "그것", "저것", "이런", "그런", "저런", "여기", "거기",
    // postpositional phrases
    "때문에", "위해", "위해서", "대해", "대해서", "대한", "관해", "관해서", "통해",
    // interrogatives and fillers
    "뭐", "무엇", "어떤", "어떻게", "왜", "언제", "어디", "누구", "좀", "잘", "더",
    "수", "것", "등", "뭐야", "뭐지",
    // light verbs
    "있는", "있다", "있어", "없는", "없다", "하는", "한", "할", "해", "해줘",
    "알려줘",
];

/// English stopwords, matched case-insensitively.
const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "am",
    "what", "which", "who", "whom", "whose", "when", "where", "why", "how",
    "about", "of", "in", "on", "at", "to", "for", "with", "from", "by", "as",
    "into", "and", "or", "but", "if", "then", "so", "than", "that", "this",
    "these", "those", "it", "its", "i", "me", "my", "we", "our", "you", "your",
    "he", "she", "they", "them", "their", "his", "her", "do", "does", "did",
    "can", "could", "should", "would", "will", "shall", "may", "might", "must",
    "have", "has", "had", "not", "no", "there", "here", "any", "some", "all",
    "please",
];

static KOREAN_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| KOREAN_STOPWORDS.iter().copied().collect());

static ENGLISH_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ENGLISH_STOPWORDS.iter().copied().collect());

/// Reduce a search query to its content-bearing tokens.
///
/// Tokens are whitespace-delimited and kept verbatim in their original order.
/// A token is dropped only when it is, as a whole, an English stopword (any case)
/// or a Korean standalone stopword/particle. The result is joined with single
/// spaces. When that reduction has `<= 2` non-space characters the original
/// `query` is returned as-is, whitespace included.
pub fn preprocess(query: &str) -> String {
    let kept: Vec<&str> = query
        .split_whitespace()
        .filter(|token| !is_stopword(token))
        .collect();

    let reduced = kept.join(" ");
    let visible = reduced.chars().filter(|c| !c.is_whitespace()).count();

    if visible <= MIN_VISIBLE_CHARS {
        return query.to_string();
    }
    reduced
}

/// Whether a single token is a standalone stopword in either language.
pub fn is_stopword(token: &str) -> bool {
    if KOREAN_SET.contains(token) {
        return true;
    }
    ENGLISH_SET.contains(token.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_korean_stopwords() {
        assert_eq!(preprocess("그리고 메뮤 때문에 오류"), "메뮤 오류");
    }

    #[test]
    fn removes_english_stopwords() {
        assert_eq!(preprocess("what is the memory about"), "memory");
    }

    #[test]
    fn english_match_ignores_case() {
        assert_eq!(preprocess("What IS The memory"), "memory");
    }

    #[test]
    fn two_char_remainder_falls_back() {
        // "이" is dropped, leaving "세상" (2 chars), so the input comes back
        assert_eq!(preprocess("이 세상"), "이 세상");
        assert_eq!(preprocess("이 가"), "이 가");
    }

    #[test]
    fn keeps_fused_particles() {
        let result = preprocess("엔트로픽의 Claude에서 사용");
        assert!(result.split(' ').any(|t| t == "엔트로픽의"));
        assert!(result.split(' ').any(|t| t == "Claude에서"));
        assert_eq!(preprocess("엔트로픽의 모델"), "엔트로픽의 모델");
        assert_eq!(preprocess("메뮤에서 검색"), "메뮤에서 검색");
        assert_eq!(preprocess("사용자가 저장"), "사용자가 저장");
    }

    #[test]
    fn collapses_whitespace() {
        let result = preprocess("  메뮤에서   검색을   ");
        assert_eq!(result, "메뮤에서 검색을");
        assert!(!result.contains("  "));
    }

    #[test]
    fn fallback_returns_original_whitespace() {
        let query = "  the   a  ";
        assert_eq!(preprocess(query), query);
    }

    #[test]
    fn empty_and_blank_inputs() {
        assert_eq!(preprocess(""), "");
        assert_eq!(preprocess("   "), "   ");
    }

    #[test]
    fn all_stopwords_fall_back() {
        for query in ["그리고 그런데 때문에", "what is the", "the 이 and 가"] {
            assert_eq!(preprocess(query), query);
        }
    }

    #[test]
    fn order_is_preserved_and_not_deduplicated() {
        assert_eq!(
            preprocess("오류 the 메뮤 and 오류"),
            "오류 메뮤 오류"
        );
    }

    #[test]
    fn never_shrinks_below_three_visible_chars() {
        let queries = [
            "a b c",
            "이 세상 the",
            "ok the",
            "메뮤 the 가",
            "x y",
            "Rust 그리고",
        ];
        for q in queries {
            let out = preprocess(q);
            let out_visible = out.chars().filter(|c| !c.is_whitespace()).count();
            let in_visible = q.chars().filter(|c| !c.is_whitespace()).count();
            assert!(
                out_visible >= 3 || in_visible < 3,
                "{q:?} reduced to {out:?}"
            );
        }
    }

    #[test]
    fn content_only_query_is_normalized_not_changed() {
        assert_eq!(preprocess("memory   search\tranking"), "memory search ranking");
    }

    #[test]
    fn punctuation_attached_tokens_are_kept() {
        assert_eq!(preprocess("what is memory?"), "memory?");
    }
}
