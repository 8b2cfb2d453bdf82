//! `turnstile validate`: run the response checks offline.

use std::path::PathBuf;

use turnstile_guard::ResponseValidator;

use super::{CliResult, load_config, print_json, read_optional};

pub fn run(query: String, response: String, context: Option<PathBuf>) -> CliResult {
    let config = load_config()?;
    let context = read_optional(context.as_deref())?;
    let validator = ResponseValidator::new(config.validator.clone(), &config.profile)?;
    print_json(&validator.validate(&query, &response, &context))
}
