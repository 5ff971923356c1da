//! Replacement text computed from the matched text.
//!
//! A [`Substitution`] runs a regex over each match's own text and expands a
//! template with capture groups (`$1`, `${name}`), so one search can drive
//! per-match replacements.

use regex::{Regex, RegexBuilder};

use crate::search::FileMatches;

use super::errors::ReplaceError;

#[derive(Debug, Clone)]
pub struct Substitution {
    regex: Regex,
    template: String,
}

impl Substitution {
    /// Substitute every hit of `pattern` inside a match with `template`.
    pub fn new(pattern: &str, template: impl Into<String>, case_sensitive: bool) -> Result<Self, ReplaceError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()?;
        Ok(Self {
            regex,
            template: template.into(),
        })
    }

    /// Like [`Substitution::new`] with `query` taken literally.
    pub fn literal(query: &str, template: impl Into<String>, case_sensitive: bool) -> Result<Self, ReplaceError> {
        Self::new(&regex::escape(query), template, case_sensitive)
    }

    /// Replacement for one matched text.
    pub fn expand(&self, matched: &str) -> String {
        self.regex
            .replace_all(matched, self.template.as_str())
            .into_owned()
    }

    /// Fill in the replacement of every match that has none.
    ///
    /// Returns how many matches were filled.
    pub fn fill(&self, files: &mut [FileMatches]) -> usize {
        let mut filled = 0;
        for m in files.iter_mut().flat_map(|f| f.matches.iter_mut()) {
            if m.replacement.is_none() {
                m.replacement = Some(self.expand(&m.matched));
                filled += 1;
            }
        }
        filled
    }
}
