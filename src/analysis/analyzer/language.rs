//! Languages supported by the Snowball stemmers.

use std::fmt;
use std::str::FromStr;

use rust_stemmers::Algorithm;
use serde::{Deserialize, Serialize};

use crate::analysis::token_filter::stop::DEFAULT_ENGLISH_STOP_WORDS;
use crate::error::{GlaiveError, Result};

/// A language with a Snowball stemmer.
///
/// Parsed from a language tag: an ISO 639-1 code (`"en"`), a region
/// qualified code (`"en-US"`, `"pt_BR"`) or the English name (`"english"`).
///
/// ```
/// use glaive::analysis::analyzer::language::Language;
///
/// let language: Language = "en-GB".parse().unwrap();
/// assert_eq!(language, Language::English);
/// assert!("klingon".parse::<Language>().is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    Arabic,
    Danish,
    Dutch,
    #[default]
    English,
    Finnish,
    French,
    German,
    Greek,
    Hungarian,
    Italian,
    Norwegian,
    Portuguese,
    Romanian,
    Russian,
    Spanish,
    Swedish,
    Tamil,
    Turkish,
}

const LANGUAGES: &[(Language, &str, &str)] = &[
    (Language::Arabic, "ar", "arabic"),
    (Language::Danish, "da", "danish"),
    (Language::Dutch, "nl", "dutch"),
    (Language::English, "en", "english"),
    (Language::Finnish, "fi", "finnish"),
    (Language::French, "fr", "french"),
    (Language::German, "de", "german"),
    (Language::Greek, "el", "greek"),
    (Language::Hungarian, "hu", "hungarian"),
    (Language::Italian, "it", "italian"),
    (Language::Norwegian, "no", "norwegian"),
    (Language::Portuguese, "pt", "portuguese"),
    (Language::Romanian, "ro", "romanian"),
    (Language::Russian, "ru", "russian"),
    (Language::Spanish, "es", "spanish"),
    (Language::Swedish, "sv", "swedish"),
    (Language::Tamil, "ta", "tamil"),
    (Language::Turkish, "tr", "turkish"),
];

impl Language {
    /// Parse a language tag.
    pub fn from_tag(tag: &str) -> Result<Self> {
        let normalized = tag.trim().to_lowercase();
        let primary = normalized
            .split(['-', '_'])
            .next()
            .unwrap_or_default();
        let primary = if primary == "nb" || primary == "nn" {
            "no"
        } else {
            primary
        };

        LANGUAGES
            .iter()
            .find(|(_, code, name)| *code == primary || *name == primary)
            .map(|(language, _, _)| *language)
            .ok_or_else(|| GlaiveError::analysis(format!("Unsupported language: {tag}")))
    }

    /// ISO 639-1 code.
    pub fn code(self) -> &'static str {
        self.entry().1
    }

    /// Lowercase English name.
    pub fn name(self) -> &'static str {
        self.entry().2
    }

    fn entry(self) -> &'static (Language, &'static str, &'static str) {
        LANGUAGES
            .iter()
            .find(|(language, _, _)| *language == self)
            .unwrap_or(&LANGUAGES[3])
    }

    /// Snowball algorithm for this language.
    pub fn algorithm(self) -> Algorithm {
        match self {
            Language::Arabic => Algorithm::Arabic,
            Language::Danish => Algorithm::Danish,
            Language::Dutch => Algorithm::Dutch,
            Language::English => Algorithm::English,
            Language::Finnish => Algorithm::Finnish,
            Language::French => Algorithm::French,
            Language::German => Algorithm::German,
            Language::Greek => Algorithm::Greek,
            Language::Hungarian => Algorithm::Hungarian,
            Language::Italian => Algorithm::Italian,
            Language::Norwegian => Algorithm::Norwegian,
            Language::Portuguese => Algorithm::Portuguese,
            Language::Romanian => Algorithm::Romanian,
            Language::Russian => Algorithm::Russian,
            Language::Spanish => Algorithm::Spanish,
            Language::Swedish => Algorithm::Swedish,
            Language::Tamil => Algorithm::Tamil,
            Language::Turkish => Algorithm::Turkish,
        }
    }

    /// Built-in stop words; only English ships a list.
    pub fn default_stop_words(self) -> &'static [&'static str] {
        match self {
            Language::English => DEFAULT_ENGLISH_STOP_WORDS,
            _ => &[],
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = GlaiveError;

    fn from_str(s: &str) -> Result<Self> {
        Language::from_tag(s)
    }
}

impl TryFrom<String> for Language {
    type Error = GlaiveError;

    fn try_from(value: String) -> Result<Self> {
        Language::from_tag(&value)
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.name().to_string()
    }
}
