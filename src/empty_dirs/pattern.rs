// src/empty_dirs/pattern.rs

use regex::Regex;

use super::error::PatternError;

pub const DEFAULT_DELIMITER: char = '\n';

/// One rule of an ignore string. The exact-name comparison is tried first for
/// every rule, then the glob or regex form if the rule has one.
#[derive(Debug, Clone)]
struct IgnoreRule {
    lowered: String,
    pattern: Option<Regex>,
}

impl IgnoreRule {
    fn compile(raw: &str) -> Result<Self, PatternError> {
        let pattern = if raw.contains('*') {
            let escaped = regex::escape(raw).replace("\\*", ".*");
            Some(build_regex(raw, &format!("^{}$", escaped))?)
        } else if raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/') {
            Some(build_regex(raw, &raw[1..raw.len() - 1])?)
        } else {
            None
        };

        Ok(IgnoreRule {
            lowered: raw.to_lowercase(),
            pattern,
        })
    }

    fn matches(&self, name: &str, name_lowered: &str) -> bool {
        if self.lowered == name_lowered {
            return true;
        }
        self.pattern
            .as_ref()
            .map(|re| re.is_match(name))
            .unwrap_or(false)
    }
}

fn build_regex(rule: &str, source: &str) -> Result<Regex, PatternError> {
    Regex::new(source).map_err(|e| PatternError {
        rule: rule.to_string(),
        source: e,
    })
}

/// Compiled list of name rules: exact names (case-insensitive), `*` globs and
/// `/regex/` expressions.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSpec {
    rules: Vec<IgnoreRule>,
}

impl IgnoreSpec {
    /// Compile a newline-delimited ignore string.
    pub fn compile(raw: &str) -> Result<Self, PatternError> {
        Self::compile_with_delimiter(raw, DEFAULT_DELIMITER)
    }

    /// Compile an ignore string split on `delimiter`. Entries are trimmed and
    /// blanks skipped; one bad regex fails the whole spec.
    pub fn compile_with_delimiter(raw: &str, delimiter: char) -> Result<Self, PatternError> {
        let rules = raw
            .split(delimiter)
            .map(str::trim)
            .filter(|rule| !rule.is_empty())
            .map(IgnoreRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IgnoreSpec { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether a file is ignorable. Zero-byte files short-circuit to a match when
    /// `ignore_zero_byte_files` is set, regardless of the rules.
    pub fn matches(&self, file_name: &str, size_is_zero: bool, ignore_zero_byte_files: bool) -> bool {
        if ignore_zero_byte_files && size_is_zero {
            return true;
        }
        self.matches_name(file_name)
    }

    pub fn matches_name(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.rules.iter().any(|rule| rule.matches(name, &lowered))
    }
}
