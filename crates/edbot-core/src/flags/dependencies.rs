//! Semantic checks between flags
//!
//! These rules look only at resolved values; they never touch storage and
//! never fail. Each violated rule yields one human-readable warning.

use crate::settings::Environment;
use std::collections::BTreeMap;

fn enabled(values: &BTreeMap<String, bool>, name: &str) -> bool {
    values.get(name).copied().unwrap_or(false)
}

/// Warnings for flag combinations that are inconsistent or ineffective
///
/// `safety_critical` is the registry's safety set; in production each of
/// those flags that is off yields a warning.
pub fn dependency_warnings(
    values: &BTreeMap<String, bool>,
    safety_critical: &[&str],
    search_backend: &str,
    environment: Environment,
) -> Vec<String> {
    let mut warnings = Vec::new();

    let hybrid = enabled(values, "enable_hybrid_search");

    if hybrid && !enabled(values, "enable_elasticsearch") {
        warnings.push(
            "enable_hybrid_search requires enable_elasticsearch: hybrid search has no keyword engine"
                .to_string(),
        );
    }

    if hybrid && search_backend != "hybrid" {
        warnings.push(format!(
            "enable_hybrid_search is on but search_backend is '{}': retrieval stays vector-only",
            search_backend
        ));
    }

    if enabled(values, "enable_source_highlighting") && !enabled(values, "enable_pdf_viewer") {
        warnings.push(
            "enable_source_highlighting without enable_pdf_viewer: highlights are computed but never shown"
                .to_string(),
        );
    }

    if enabled(values, "enable_table_extraction") && !hybrid {
        warnings.push(
            "enable_table_extraction is more effective with enable_hybrid_search".to_string(),
        );
    }

    if environment.is_production() {
        for flag in safety_critical {
            if !enabled(values, flag) {
                warnings.push(format!("{} is off in production", flag));
            }
        }
        if enabled(values, "enable_semantic_cache") && !enabled(values, "enable_response_validation")
        {
            warnings.push(
                "enable_semantic_cache replays answers that were never validated".to_string(),
            );
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAFETY: &[&str] = &["enable_phi_scrubbing", "enable_response_validation"];

    fn values(pairs: &[(&str, bool)]) -> BTreeMap<String, bool> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_consistent_flags_no_warnings() {
        let v = values(&[
            ("enable_hybrid_search", true),
            ("enable_elasticsearch", true),
            ("enable_source_highlighting", true),
            ("enable_pdf_viewer", true),
            ("enable_table_extraction", true),
            ("enable_phi_scrubbing", true),
            ("enable_response_validation", true),
        ]);
        assert!(dependency_warnings(&v, SAFETY, "hybrid", Environment::Production).is_empty());
    }

    #[test]
    fn test_hybrid_without_elasticsearch() {
        let v = values(&[("enable_hybrid_search", true)]);
        let warnings = dependency_warnings(&v, SAFETY, "hybrid", Environment::Development);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("enable_elasticsearch"));
    }

    #[test]
    fn test_hybrid_with_vector_backend() {
        let v = values(&[("enable_hybrid_search", true), ("enable_elasticsearch", true)]);
        let warnings = dependency_warnings(&v, SAFETY, "pgvector", Environment::Development);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("pgvector"));
    }

    #[test]
    fn test_highlighting_without_viewer() {
        let v = values(&[("enable_source_highlighting", true)]);
        let warnings = dependency_warnings(&v, SAFETY, "pgvector", Environment::Development);
        assert!(warnings.iter().any(|w| w.contains("never shown")));
    }

    #[test]
    fn test_table_extraction_without_hybrid() {
        let v = values(&[("enable_table_extraction", true)]);
        let warnings = dependency_warnings(&v, SAFETY, "pgvector", Environment::Staging);
        assert_eq!(
            warnings,
            vec!["enable_table_extraction is more effective with enable_hybrid_search".to_string()]
        );
    }

    #[test]
    fn test_production_safety_warnings() {
        let v = values(&[("enable_semantic_cache", true)]);
        let warnings = dependency_warnings(&v, SAFETY, "pgvector", Environment::Production);
        assert_eq!(warnings.len(), 3);

        // Same values outside production are fine
        assert!(dependency_warnings(&v, SAFETY, "pgvector", Environment::Development).is_empty());
    }

    #[test]
    fn test_production_warnings_follow_safety_set() {
        let v = values(&[("enable_audit_log", false), ("enable_phi_scrubbing", false)]);

        let warnings =
            dependency_warnings(&v, &["enable_audit_log"], "pgvector", Environment::Production);
        assert_eq!(warnings, vec!["enable_audit_log is off in production".to_string()]);

        assert!(dependency_warnings(&v, &[], "pgvector", Environment::Production).is_empty());
    }
}
