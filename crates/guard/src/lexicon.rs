//! Keyword tables and regex pattern sets shared by the guard components.
//!
//! All matching is case-insensitive. Callers pass text as-is; keyword tables
//! lowercase internally for substring checks.

use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;

use crate::error::{GuardError, Result};

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| GuardError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

fn is_unspaced_script(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF   // Hiragana, Katakana
        | 0x3400..=0x4DBF // CJK extension A
        | 0x4E00..=0x9FFF // CJK unified
        | 0xAC00..=0xD7AF // Hangul syllables
    )
}

struct Keyword {
    text: String,
    word: Regex,
}

/// A deduplicated keyword list with word-boundary and substring matching.
pub struct KeywordTable {
    keywords: Vec<Keyword>,
}

impl KeywordTable {
    pub fn new<I, S>(keywords: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = std::collections::HashSet::new();
        let mut table = Vec::new();
        for keyword in keywords {
            let text = keyword.as_ref().trim().to_lowercase();
            if text.is_empty() || !seen.insert(text.clone()) {
                continue;
            }
            let word = compile(&format!(r"\b{}\b", regex::escape(&text)))?;
            table.push(Keyword { text, word });
        }
        Ok(Self { keywords: table })
    }

    /// Flatten a per-language table into one keyword list.
    pub fn from_languages(table: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        Self::new(table.values().flatten())
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Number of keywords found as whole words.
    pub fn word_matches(&self, text: &str) -> usize {
        self.keywords.iter().filter(|k| k.word.is_match(text)).count()
    }

    /// Sum of `exact` per whole-word hit and `partial` per substring-only hit.
    pub fn weighted_score(&self, text: &str, exact: f32, partial: f32) -> f32 {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .map(|k| {
                if k.word.is_match(&lower) {
                    exact
                } else if lower.contains(&k.text) {
                    partial
                } else {
                    0.0
                }
            })
            .sum()
    }
}

/// An ordered list of compiled regexes.
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| compile(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Literal terms matched as whole words, except in scripts written
    /// without spaces (Han, Kana, Hangul) where a substring hit counts.
    pub fn terms<I, S>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .map(|t| {
                let escaped = regex::escape(&t);
                if t.chars().any(is_unspaced_script) {
                    compile(&escaped)
                } else {
                    compile(&format!(r"\b{escaped}\b"))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// How many distinct patterns match somewhere in `text`.
    pub fn count_matches(&self, text: &str) -> usize {
        self.patterns.iter().filter(|p| p.is_match(text)).count()
    }

    pub fn any_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }
}
