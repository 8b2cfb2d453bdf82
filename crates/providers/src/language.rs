//! Script- and stopword-based language detection.
//!
//! Non-Latin scripts are identified by their Unicode blocks. Latin-script
//! text is scored against short stopword lists; ties and misses fall back to
//! the configured default tag.

use turnstile_core::language::{DEFAULT_LANGUAGE, LanguageDetector};

/// Heuristic detector with no model or network dependency.
#[derive(Debug, Clone)]
pub struct ScriptLanguageDetector {
    fallback: String,
}

impl Default for ScriptLanguageDetector {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

const STOPWORDS: &[(&str, &[&str])] = &[
    ("en", &["the", "is", "are", "what", "how", "do", "does", "and", "you", "my", "can", "where", "which", "your", "of"]),
    ("fr", &["le", "la", "les", "est", "vous", "je", "et", "des", "une", "quel", "quelle", "comment", "pour", "avec", "où"]),
    ("de", &["der", "die", "das", "ist", "und", "ich", "sie", "wie", "nicht", "ein", "eine", "mit", "für", "wo", "kann"]),
    ("es", &["el", "los", "las", "es", "qué", "cómo", "y", "mi", "una", "para", "con", "dónde", "puedo", "son", "del"]),
    ("it", &["il", "lo", "gli", "è", "che", "come", "e", "sono", "una", "per", "con", "dove", "posso", "del", "della"]),
    ("pt", &["o", "os", "as", "é", "que", "como", "e", "meu", "uma", "para", "com", "onde", "posso", "são", "você"]),
    ("tr", &["bir", "ve", "bu", "ne", "nasıl", "mi", "mı", "için", "ile", "nerede", "var", "benim", "siz", "mu", "çok"]),
    ("nl", &["de", "het", "een", "is", "wat", "hoe", "en", "ik", "mijn", "kan", "waar", "zijn", "voor", "met", "niet"]),
    ("pl", &["jest", "co", "jak", "i", "nie", "się", "czy", "mój", "gdzie", "dla", "są", "może", "ten", "który", "na"]),
];

impl ScriptLanguageDetector {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
        }
    }

    fn script_language(text: &str) -> Option<&'static str> {
        let mut counts: [usize; 9] = [0; 9];
        for c in text.chars() {
            let slot = match c as u32 {
                0x0600..=0x06FF | 0x0750..=0x077F | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF => 0,
                0x0590..=0x05FF => 1,
                0x0400..=0x04FF => 2,
                0x3040..=0x30FF => 3,
                0xAC00..=0xD7AF | 0x1100..=0x11FF => 4,
                0x4E00..=0x9FFF => 5,
                0x0900..=0x097F => 6,
                0x0E00..=0x0E7F => 7,
                0x0370..=0x03FF => 8,
                _ => continue,
            };
            counts[slot] += 1;
        }

        // Kana anywhere means Japanese even when Han characters dominate.
        if counts[3] > 0 {
            return Some("ja");
        }

        const TAGS: [&str; 9] = ["ar", "he", "ru", "ja", "ko", "zh", "hi", "th", "el"];
        counts
            .iter()
            .enumerate()
            .filter(|(_, n)| **n > 0)
            .max_by_key(|(_, n)| **n)
            .map(|(i, _)| TAGS[i])
    }

    fn stopword_language(text: &str) -> Option<&'static str> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .collect();

        let mut best: Option<(&'static str, usize)> = None;
        let mut tied = false;
        for (lang, stops) in STOPWORDS {
            let hits = words.iter().filter(|w| stops.contains(w)).count();
            if hits == 0 {
                continue;
            }
            match best {
                Some((_, top)) if hits == top => tied = true,
                Some((_, top)) if hits < top => {}
                _ => {
                    best = Some((lang, hits));
                    tied = false;
                }
            }
        }

        if tied { None } else { best.map(|(lang, _)| lang) }
    }
}

impl LanguageDetector for ScriptLanguageDetector {
    fn detect(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return self.fallback.clone();
        }

        Self::script_language(text)
            .or_else(|| Self::stopword_language(text))
            .map(str::to_string)
            .unwrap_or_else(|| self.fallback.clone())
    }
}
