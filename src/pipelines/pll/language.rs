//! Closed-class word tables used to filter proposals.

use std::collections::HashSet;

use serde::Deserialize;

use crate::error::Result;

/// Languages with built-in closed-class word tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    /// English.
    #[default]
    English,
    /// Spanish.
    Spanish,
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Language::English => "en",
            Language::Spanish => "es",
        };
        write!(f, "{name}")
    }
}

/// Function-word lists a candidate can be excluded by.
///
/// Pure configuration: a new language is a new table, not new code. Words are
/// stored lower-cased and matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClosedClassWords {
    #[serde(default, deserialize_with = "lowercase_set")]
    articles: HashSet<String>,
    #[serde(default, deserialize_with = "lowercase_set")]
    prepositions: HashSet<String>,
    #[serde(default, deserialize_with = "lowercase_set")]
    conjunctions: HashSet<String>,
}

const EN_ARTICLES: &[&str] = &["a", "an", "the"];
const EN_PREPOSITIONS: &[&str] = &[
    "above", "across", "against", "along", "among", "around", "at", "before", "behind", "below",
    "beneath", "beside", "between", "by", "down", "from", "in", "into", "near", "of", "off", "on",
    "to", "toward", "under", "upon", "with", "within",
];
const EN_CONJUNCTIONS: &[&str] = &["and", "or", "but", "that", "if", "whether"];

const ES_ARTICLES: &[&str] = &["un", "una", "unos", "unas", "el", "los", "la", "las", "lo"];
const ES_PREPOSITIONS: &[&str] = &[
    "a", "ante", "bajo", "cabe", "con", "contra", "de", "desde", "en", "entre", "hacia", "hasta",
    "para", "por", "según", "sin", "so", "sobre", "tras", "durante", "mediante", "vía", "versus",
];
const ES_CONJUNCTIONS: &[&str] = &["y", "o", "ni", "que", "pero", "si"];

impl ClosedClassWords {
    /// Build from explicit lists.
    pub fn new<A, P, C>(articles: A, prepositions: P, conjunctions: C) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        Self {
            articles: to_set(articles),
            prepositions: to_set(prepositions),
            conjunctions: to_set(conjunctions),
        }
    }

    /// Built-in table for `language`.
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::English => Self::new(EN_ARTICLES, EN_PREPOSITIONS, EN_CONJUNCTIONS),
            Language::Spanish => Self::new(ES_ARTICLES, ES_PREPOSITIONS, ES_CONJUNCTIONS),
        }
    }

    /// Parse a table from JSON: `{"articles": [...], "prepositions": [...], "conjunctions": [...]}`.
    /// Missing lists are empty.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether `word` is an article.
    pub fn is_article(&self, word: &str) -> bool {
        self.articles.contains(&word.to_lowercase())
    }

    /// Whether `word` is a preposition.
    pub fn is_preposition(&self, word: &str) -> bool {
        self.prepositions.contains(&word.to_lowercase())
    }

    /// Whether `word` is a conjunction.
    pub fn is_conjunction(&self, word: &str) -> bool {
        self.conjunctions.contains(&word.to_lowercase())
    }
}

fn to_set<I>(words: I) -> HashSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    words
        .into_iter()
        .map(|w| w.as_ref().trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn lowercase_set<'de, D>(deserializer: D) -> std::result::Result<HashSet<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let words = Vec::<String>::deserialize(deserializer)?;
    Ok(to_set(words))
}
