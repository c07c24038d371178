// 🔎 Category Validator - does a file's content match its declared category?
// Runs once per staged entry at commit time, never earlier

use crate::category::Category;
use crate::reader::read_table;
use anyhow::{Context as AnyhowContext, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::warn;

// ============================================================================
// VALIDATOR CAPABILITY
// ============================================================================

/// CategoryValidator - optional capability of a record store
///
/// Must be pure (no registry mutation) and total: every path/category pair
/// gets an answer, unreadable files included.
pub trait CategoryValidator {
    fn validate(&self, path: &Path, category: Category) -> bool;
}

// ============================================================================
// COLUMN SIGNATURES
// ============================================================================

/// Required header names per category
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySignatures {
    required: BTreeMap<Category, Vec<String>>,
}

impl Default for CategorySignatures {
    fn default() -> Self {
        let mut required = BTreeMap::new();
        required.insert(Category::Tsun, vec!["Company".to_string(), "Website".to_string()]);
        required.insert(
            Category::Cb,
            vec!["Organization Name".to_string(), "Organization Name URL".to_string()],
        );
        required.insert(Category::Pb, vec!["Companies".to_string(), "Company ID".to_string()]);
        required.insert(Category::Other, Vec::new());
        CategorySignatures { required }
    }
}

impl CategorySignatures {
    /// Load overrides from a JSON object such as `{"cb": ["Organization Name"]}`
    ///
    /// Categories missing from the file keep their built-in columns.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read signatures file: {:?}", path.as_ref()))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, Vec<String>> =
            serde_json::from_str(json).context("Failed to parse signatures JSON")?;

        let mut signatures = CategorySignatures::default();
        for (key, columns) in raw {
            let category: Category = key.parse()?;
            signatures.required.insert(category, columns);
        }
        Ok(signatures)
    }

    pub fn required_columns(&self, category: Category) -> &[String] {
        self.required
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

// ============================================================================
// SIGNATURE VALIDATOR
// ============================================================================

/// Accepts a file when its header row carries every column the category requires
#[derive(Debug, Clone, Default)]
pub struct SignatureValidator {
    signatures: CategorySignatures,
}

impl SignatureValidator {
    pub fn new(signatures: CategorySignatures) -> Self {
        SignatureValidator { signatures }
    }
}

impl CategoryValidator for SignatureValidator {
    fn validate(&self, path: &Path, category: Category) -> bool {
        let table = match read_table(path) {
            Ok(table) => table,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Unreadable at commit time");
                return false;
            }
        };

        let missing: Vec<&str> = self
            .signatures
            .required_columns(category)
            .iter()
            .filter(|column| !table.has_column(column))
            .map(String::as_str)
            .collect();

        if !missing.is_empty() {
            warn!(
                file = %path.display(),
                category = %category,
                missing = ?missing,
                "Header does not match category"
            );
        }

        missing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_default_signatures() {
        let signatures = CategorySignatures::default();
        assert!(signatures.required_columns(Category::Other).is_empty());
        assert!(signatures
            .required_columns(Category::Cb)
            .contains(&"Organization Name".to_string()));
    }

    #[test]
    fn test_crunchbase_export_matches_cb_only() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "cb.csv",
            "Organization Name,Organization Name URL,Founded Date\nAcme,https://cb.example/acme,2019\n",
        );
        let validator = SignatureValidator::default();

        assert!(validator.validate(&path, Category::Cb));
        assert!(!validator.validate(&path, Category::Pb));
        assert!(!validator.validate(&path, Category::Tsun));
        assert!(validator.validate(&path, Category::Other));
    }

    #[test]
    fn test_header_match_ignores_case_and_padding() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "t.csv", " company ,WEBSITE\nAcme,acme.io\n");

        assert!(SignatureValidator::default().validate(&path, Category::Tsun));
    }

    #[test]
    fn test_unreadable_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "gone.csv", "Company,Website\n");
        fs::remove_file(&path).unwrap();

        assert!(!SignatureValidator::default().validate(&path, Category::Other));
    }

    #[test]
    fn test_overrides_from_json() {
        let signatures = CategorySignatures::from_json(r#"{"PB": ["Deal ID"], "other": ["Name"]}"#).unwrap();

        assert_eq!(signatures.required_columns(Category::Pb), ["Deal ID".to_string()]);
        assert_eq!(signatures.required_columns(Category::Other), ["Name".to_string()]);
        // untouched categories keep their defaults
        assert_eq!(
            signatures.required_columns(Category::Tsun),
            CategorySignatures::default().required_columns(Category::Tsun)
        );
    }

    #[test]
    fn test_unknown_category_in_json_fails() {
        assert!(CategorySignatures::from_json(r#"{"linkedin": ["Name"]}"#).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("signatures.json");
        fs::write(&path, r#"{"cb": ["Name"]}"#).unwrap();

        let signatures = CategorySignatures::from_file(&path).unwrap();
        assert_eq!(signatures.required_columns(Category::Cb), ["Name".to_string()]);
    }
}
