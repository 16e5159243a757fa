//! Safety checks before the history store is overwritten.
//!
//! The store is rewritten in place at the end of every run. These checks
//! make sure a mistyped flag cannot point it at one of the input files.

use std::path::Path;

use crate::error::{Error, Result};

/// Validates that `store` is safe to overwrite.
///
/// Checks:
/// - The store must be a `.json` file
/// - The store cannot be the same path as any of the provided source files
///   (play log, catalog, outbox)
pub fn validate_store_path(store: &Path, source_paths: &[&Path]) -> Result<()> {
    let is_json = store
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !is_json {
        return Err(Error::UnsafePath(format!(
            "store '{}': it must be a .json file",
            store.display()
        )));
    }

    for source in source_paths {
        if same_file(store, source) {
            return Err(Error::UnsafePath(format!(
                "store '{}': it is the same file as input '{}'",
                store.display(),
                source.display()
            )));
        }
    }

    Ok(())
}

/// Path equality, resolving both sides when they exist on disk.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_store() {
        let store = PathBuf::from("/tmp/scrobble_history.json");
        let history = PathBuf::from("/data/plays.json");
        let outbox = PathBuf::from("/data/outbox.jsonl");
        assert!(validate_store_path(&store, &[&history, &outbox]).is_ok());
    }

    #[test]
    fn test_uppercase_extension_accepted() {
        let store = PathBuf::from("/tmp/HISTORY.JSON");
        assert!(validate_store_path(&store, &[]).is_ok());
    }

    #[test]
    fn test_non_json_store_rejected() {
        let store = PathBuf::from("/tmp/outbox.jsonl");
        let result = validate_store_path(&store, &[]);
        assert!(matches!(result, Err(Error::UnsafePath(_))));
        assert!(result.unwrap_err().to_string().contains("must be a .json file"));
    }

    #[test]
    fn test_store_equals_source() {
        let path = PathBuf::from("/data/plays.json");
        let result = validate_store_path(&path, &[&path]);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("same file as input"));
    }

    #[test]
    fn test_store_equals_source_via_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let plays = dir.path().join("plays.json");
        std::fs::write(&plays, "[]").unwrap();
        let roundabout = dir.path().join(".").join("plays.json");
        assert!(validate_store_path(&roundabout, &[&plays]).is_err());
    }
}
