//! Guard against a stage overwriting its own inputs.
//!
//! Every stage fully rewrites its output artifact, so an output path that
//! points at an input would destroy the data the stage is reading.

use std::path::Path;

use crate::error::{Error, Result};

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output must be a `.csv` file
/// - Output cannot be the same as any of the stage's input paths
pub fn validate_output_path(output: &Path, sources: &[&Path]) -> Result<()> {
    let is_csv = output
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(Error::Config(format!(
            "output '{}' must be a .csv file",
            output.display()
        )));
    }

    for source in sources {
        if same_file(output, source) {
            return Err(Error::Config(format!(
                "output '{}' cannot be the same as input '{}'",
                output.display(),
                source.display()
            )));
        }
    }

    Ok(())
}

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
    fn test_valid_output() {
        let output = PathBuf::from("/tmp/spotify_kworb_kaggle1.csv");
        let source = PathBuf::from("/data/spotify_from_kworb_400.csv");
        assert!(validate_output_path(&output, &[&source]).is_ok());
    }

    #[test]
    fn test_not_csv() {
        let output = PathBuf::from("/tmp/output.sqlite3");
        let result = validate_output_path(&output, &[]);
        assert!(result.unwrap_err().to_string().contains("must be a .csv file"));
    }

    #[test]
    fn test_output_equals_source() {
        let path = PathBuf::from("/data/spotify_from_kworb_400.csv");
        let result = validate_output_path(&path, &[&path]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as input"));
    }

    #[test]
    fn test_output_equals_source_via_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.csv");
        std::fs::write(&source, "a\n").unwrap();
        let output = dir.path().join(".").join("in.csv");
        assert!(validate_output_path(&output, &[&source]).is_err());
    }
}
