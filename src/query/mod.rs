// Query understanding
// Intent classification, keyword and entity extraction, query expansion


use fancy_regex::Regex;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::text::{is_stop_word, trim_token, words};

/// Keywords kept per query
pub const MAX_KEYWORDS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Factual,
    Comparison,
    Procedural,
    Analytical,
    Numerical,
    Visual,
    Temporal,
    Location,
    Causal,
    List,
    #[default]
    InformationRequest,
}

impl Intent {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Comparison => "comparison",
            Self::Procedural => "procedural",
            Self::Analytical => "analytical",
            Self::Numerical => "numerical",
            Self::Visual => "visual",
            Self::Temporal => "temporal",
            Self::Location => "location",
            Self::Causal => "causal",
            Self::List => "list",
            Self::InformationRequest => "information_request",
        }
    }
}

impl fmt::Display for Intent {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intent cue patterns in priority order. The first matching rule wins, so a
/// query with cues for several intents resolves to the earliest one listed.
pub const INTENT_RULES: &[(Intent, &str)] = &[
    (
        Intent::Factual,
        r"\b(what|who|which)\s+(is|are|was|were)\b|\bdefin(e|ition)\b",
    ),
    (
        Intent::Comparison,
        r"\b(compare[sd]?|comparison|versus|vs|differen(ce|ces|t)\s+(between|from)|contrast)\b",
    ),
    (
        Intent::Procedural,
        r"\bhow\s+(to|do|does|can|should)\b|\b(steps?|process|procedure|instructions?)\b",
    ),
    (
        Intent::Analytical,
        r"\b(analy[sz]e|analysis|evaluate|assess(ment)?|implications?|impact|trends?)\b",
    ),
    (
        Intent::Numerical,
        r"\bhow\s+(many|much)\b|\b(percent(age)?|number\s+of|total|average|amount|ratio)\b",
    ),
    (
        Intent::Visual,
        r"\b(charts?|graphs?|diagrams?|figures?|images?|pictures?|tables?|visuali[sz]ation)\b",
    ),
    (
        Intent::Temporal,
        r"\b(when|timeline|dates?|years?|before|after|during|since)\b",
    ),
    (
        Intent::Location,
        r"\b(where|locations?|located|places?|region|country|city)\b",
    ),
    (
        Intent::Causal,
        r"\b(why|causes?|caused|because|reasons?|led\s+to|result(ed)?\s+in)\b",
    ),
    (
        Intent::List,
        r"\b(list|enumerate|examples?\s+of|types\s+of|kinds\s+of)\b",
    ),
];

static COMPILED_RULES: LazyLock<Vec<(Intent, Regex)>> = LazyLock::new(|| {
    INTENT_RULES
        .iter()
        .map(|(intent, pattern)| {
            (
                *intent,
                Regex::new(&format!("(?i){}", pattern)).expect("valid regex"),
            )
        })
        .collect()
});

/// Classify `query` with the first matching rule from [`INTENT_RULES`]
#[inline]
pub fn classify_intent(query: &str) -> Intent {
    for (intent, regex) in COMPILED_RULES.iter() {
        match regex.is_match(query) {
            Ok(true) => return *intent,
            Ok(false) => {}
            Err(e) => warn!("Intent rule {} failed to evaluate: {}", intent, e),
        }
    }
    Intent::InformationRequest
}

/// Up to [`MAX_KEYWORDS`] lowercase content words, in query order. Tokenised
/// with [`words`] so keywords line up with passage word sets.
#[inline]
pub fn extract_keywords(query: &str) -> Vec<String> {
    words(query)
        .into_iter()
        .filter(|token| token.chars().count() > 2 && !is_stop_word(token))
        .take(MAX_KEYWORDS)
        .collect()
}

/// Capitalized words and acronyms, first occurrence order
#[inline]
pub fn extract_entities(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(trim_token)
        .filter(|token| is_entity(token) && !is_stop_word(&token.to_lowercase()))
        .unique()
        .map(str::to_string)
        .collect()
}

fn is_entity(token: &str) -> bool {
    let mut chars = token.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let rest: Vec<char> = chars.collect();

    let capitalized = first.is_uppercase()
        && !rest.is_empty()
        && rest.iter().all(|c| c.is_alphabetic() && c.is_lowercase());
    let acronym = !rest.is_empty()
        && first.is_uppercase()
        && rest.iter().all(|c| c.is_uppercase() || c.is_ascii_digit());

    capitalized || acronym
}

/// Everything the pipeline learns about a query before retrieval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryContext {
    pub query: String,
    pub intent: Intent,
    pub keywords: Vec<String>,
    pub entities: Vec<String>,
    /// Query followed by its keywords. Never embedded.
    pub expanded_query: String,
}

impl QueryContext {
    #[inline]
    pub fn analyze(query: &str) -> Self {
        let query = query.trim();
        let intent = classify_intent(query);
        let keywords = extract_keywords(query);
        let entities = extract_entities(query);
        let expanded_query = if keywords.is_empty() {
            query.to_string()
        } else {
            format!("{} {}", query, keywords.join(" "))
        };

        debug!(
            "Query analyzed: intent={}, keywords={:?}, entities={:?}",
            intent, keywords, entities
        );

        Self {
            query: query.to_string(),
            intent,
            keywords,
            entities,
            expanded_query,
        }
    }

    #[inline]
    pub fn keyword_set(&self) -> HashSet<String> {
        self.keywords.iter().cloned().collect()
    }
}
