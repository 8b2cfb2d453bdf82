//! Numeric grounding heuristic.
//!
//! Best-effort only: a number is "grounded" if the same digit string appears
//! somewhere in the context. Paraphrased quantities, unit conversions and
//! spelled-out numbers are not recognised.

use std::collections::BTreeSet;

use regex::Regex;

use crate::error::{GuardError, Result};

const NUMBER_PATTERN: &str = r"\b\d+(?:[.,]\d+)?\b";

pub struct NumericGrounding {
    number: Regex,
}

impl NumericGrounding {
    pub fn new() -> Result<Self> {
        let number = Regex::new(NUMBER_PATTERN).map_err(|e| GuardError::InvalidPattern {
            pattern: NUMBER_PATTERN.into(),
            reason: e.to_string(),
        })?;
        Ok(Self { number })
    }

    fn numbers<'a>(&self, text: &'a str) -> BTreeSet<&'a str> {
        self.number.find_iter(text).map(|m| m.as_str()).collect()
    }

    /// Fraction of distinct numbers in `response` absent from `context`.
    /// 0.0 when the response has no numbers.
    pub fn ungrounded_ratio(&self, response: &str, context: &str) -> f32 {
        let in_response = self.numbers(response);
        if in_response.is_empty() {
            return 0.0;
        }
        let in_context = self.numbers(context);
        let novel = in_response.difference(&in_context).count();
        novel as f32 / in_response.len() as f32
    }
}
