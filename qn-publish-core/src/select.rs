//! Selection of the candidate files that should be uploaded.

use std::fmt;

use globset::GlobMatcher;
use regex::Regex;

use crate::contract::CandidateFile;

/// Decides whether a relative output name matches a filter.
pub trait AssetMatcher: Send + Sync {
    fn matches(&self, name: &str) -> bool;
}

impl AssetMatcher for Regex {
    fn matches(&self, name: &str) -> bool {
        self.is_match(name)
    }
}

impl AssetMatcher for GlobMatcher {
    fn matches(&self, name: &str) -> bool {
        self.is_match(name)
    }
}

/// Adapts any `Fn(&str) -> bool` into an [`AssetMatcher`].
pub struct Predicate<F>(pub F);

impl<F> AssetMatcher for Predicate<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn matches(&self, name: &str) -> bool {
        (self.0)(name)
    }
}

/// Optional exclude and include matchers. Exclusion always wins.
#[derive(Default)]
pub struct SelectionFilter {
    exclude: Option<Box<dyn AssetMatcher>>,
    include: Option<Box<dyn AssetMatcher>>,
}

impl fmt::Debug for SelectionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionFilter")
            .field("exclude", &self.exclude.is_some())
            .field("include", &self.include.is_some())
            .finish()
    }
}

impl SelectionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude(mut self, matcher: impl AssetMatcher + 'static) -> Self {
        self.exclude = Some(Box::new(matcher));
        self
    }

    pub fn include(mut self, matcher: impl AssetMatcher + 'static) -> Self {
        self.include = Some(Box::new(matcher));
        self
    }

    pub(crate) fn with_boxed(
        exclude: Option<Box<dyn AssetMatcher>>,
        include: Option<Box<dyn AssetMatcher>>,
    ) -> Self {
        Self { exclude, include }
    }

    /// Whether `file` survives the filter.
    pub fn accepts(&self, file: &CandidateFile) -> bool {
        if !file.emitted {
            return false;
        }
        if let Some(exclude) = &self.exclude {
            if exclude.matches(&file.name) {
                return false;
            }
        }
        match &self.include {
            Some(include) => include.matches(&file.name),
            None => true,
        }
    }
}

/// Keep the emitted, non-excluded (and, if configured, included) candidates in
/// their original order.
pub fn select_assets(candidates: &[CandidateFile], filter: &SelectionFilter) -> Vec<CandidateFile> {
    let selected: Vec<CandidateFile> = candidates
        .iter()
        .filter(|file| filter.accepts(file))
        .cloned()
        .collect();
    tracing::debug!(
        candidates = candidates.len(),
        selected = selected.len(),
        "Selected assets for upload"
    );
    selected
}
