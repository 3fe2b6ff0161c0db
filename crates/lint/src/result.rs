//! Lint results and their text rendering

use crate::error::LintError;
use std::fmt::Write as _;
use std::ops::Deref;

/// Findings of one linter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintResult {
    /// Display name of the linter
    pub linter: String,
    /// Documentation for what the linter checks
    pub docs_url: String,
    /// Findings that block rendering
    pub errors: Vec<LintError>,
    /// Advisory findings
    pub warnings: Vec<LintError>,
}

impl LintResult {
    /// Empty result for `linter`
    #[must_use]
    pub fn new(linter: impl Into<String>, docs_url: impl Into<String>) -> Self {
        Self {
            linter: linter.into(),
            docs_url: docs_url.into(),
            ..Self::default()
        }
    }

    /// Record an error
    pub fn add_error(&mut self, error: LintError) {
        self.errors.push(error);
    }

    /// Record several errors
    pub fn add_errors(&mut self, errors: impl IntoIterator<Item = LintError>) {
        self.errors.extend(errors);
    }

    /// Record a warning
    pub fn add_warning(&mut self, warning: LintError) {
        self.warnings.push(warning);
    }

    /// Record several warnings
    pub fn add_warnings(&mut self, warnings: impl IntoIterator<Item = LintError>) {
        self.warnings.extend(warnings);
    }

    /// Record a linter's `(errors, warnings)` pair
    pub fn add(&mut self, (errors, warnings): (Vec<LintError>, Vec<LintError>)) {
        self.add_errors(errors);
        self.add_warnings(warnings);
    }

    /// Whether any error was recorded
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether any warning was recorded
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Human readable report; identical findings are printed once
    #[must_use]
    pub fn render(&self, doc_host: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.linter);

        if !self.has_errors() && !self.has_warnings() {
            let _ = writeln!(out, "\tNo errors \\o/");
            return out;
        }

        for (heading, findings) in [("Errors", &self.errors), ("Warnings", &self.warnings)] {
            if findings.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\t{heading}:");
            for finding in deduplicate(findings) {
                let _ = writeln!(out, "\t\t* {finding}");
                if let Some(doc_id) = finding.doc_id() {
                    let _ = writeln!(out, "\t\t  [see: {}]", doc_link(doc_host, doc_id));
                }
            }
        }
        if !self.docs_url.is_empty() {
            let _ = writeln!(out, "\tDocs: {}", self.docs_url);
        }
        out
    }
}

/// Results of every linter, in run order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintResults(pub Vec<LintResult>);

impl LintResults {
    /// Whether any linter reported an error
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(LintResult::has_errors)
    }

    /// Whether any linter reported a warning
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.0.iter().any(LintResult::has_warnings)
    }

    /// All errors across linters
    pub fn errors(&self) -> impl Iterator<Item = &LintError> {
        self.0.iter().flat_map(|r| r.errors.iter())
    }

    /// All warnings across linters
    pub fn warnings(&self) -> impl Iterator<Item = &LintError> {
        self.0.iter().flat_map(|r| r.warnings.iter())
    }

    /// Report of every linter that found something
    #[must_use]
    pub fn render(&self, doc_host: &str) -> String {
        self.0
            .iter()
            .filter(|r| r.has_errors() || r.has_warnings())
            .map(|r| r.render(doc_host))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Deref for LintResults {
    type Target = [LintResult];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<LintResult> for LintResults {
    fn from_iter<I: IntoIterator<Item = LintResult>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a LintResults {
    type Item = &'a LintResult;
    type IntoIter = std::slice::Iter<'a, LintResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn deduplicate(findings: &[LintError]) -> Vec<&LintError> {
    let mut unique: Vec<&LintError> = Vec::with_capacity(findings.len());
    for finding in findings {
        if !unique.contains(&finding) {
            unique.push(finding);
        }
    }
    unique
}

/// Link to the documentation section for `doc_id`
#[must_use]
pub fn doc_link(doc_host: &str, doc_id: &str) -> String {
    format!(
        "{}/docs/linter-errors#{}",
        doc_host.trim_end_matches('/'),
        doc_anchor(doc_id)
    )
}

fn doc_anchor(doc_id: &str) -> String {
    doc_id.to_lowercase().replace(' ', "-").replace('.', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_without_findings() {
        let result = LintResult::new("Manifest", "");
        assert_eq!(result.render("docs.halfpipe.io"), "Manifest\n\tNo errors \\o/\n");
    }

    #[test]
    fn test_render_deduplicates_by_value() {
        let mut result = LintResult::new("Tasks", "");
        result.add_error(LintError::missing("script"));
        result.add_error(LintError::missing("script"));
        result.add_error(LintError::missing("docker.image"));

        let text = result.render("docs.halfpipe.io");
        assert_eq!(text.matches("missing field 'script'").count(), 1);
        assert_eq!(text.matches("missing field 'docker.image'").count(), 1);
        assert!(text.contains("[see: docs.halfpipe.io/docs/linter-errors#missing-field]"));
    }

    #[test]
    fn test_textually_equal_findings_from_different_variants_are_kept() {
        let mut result = LintResult::new("Tasks", "");
        result.add_error(LintError::collaborator("missing field 'script'"));
        result.add_error(LintError::missing("script"));

        let text = result.render("docs.halfpipe.io");
        assert_eq!(text.matches("missing field 'script'").count(), 2);
    }

    #[test]
    fn test_doc_anchor_normalisation() {
        assert_eq!(doc_anchor("CF Manifest"), "cf-manifest");
        assert_eq!(doc_anchor("Invalid field.v2"), "invalid-fieldv2");
        assert_eq!(
            doc_link("docs.halfpipe.io/", "File error"),
            "docs.halfpipe.io/docs/linter-errors#file-error"
        );
    }

    #[test]
    fn test_results_predicates() {
        let mut warned = LintResult::new("Triggers", "");
        warned.add_warning(LintError::invalid("uri", "consider ssh"));
        let results = LintResults(vec![LintResult::new("Manifest", ""), warned]);

        assert!(!results.has_errors());
        assert!(results.has_warnings());
        assert_eq!(results.warnings().count(), 1);
        assert!(!results.render("h").contains("Manifest"));
    }
}
