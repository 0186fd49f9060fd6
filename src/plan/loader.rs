//! OpenAPI document loading for plan compilation.
//!
//! Accepts JSON or YAML, from a string or a file. JSON is tried first so
//! large JSON documents skip the YAML parser.

use crate::error::Error;
use openapiv3::OpenAPI;
use std::path::Path;

/// Parses an OpenAPI document from JSON or YAML text.
///
/// # Errors
///
/// Returns the YAML parse error when the text is neither valid JSON nor
/// valid YAML for an OpenAPI document.
pub fn parse_document(content: &str) -> Result<OpenAPI, Error> {
    if let Ok(spec) = serde_json::from_str::<OpenAPI>(content) {
        return Ok(spec);
    }
    let spec = serde_yaml::from_str::<OpenAPI>(content)
        .map_err(|e| Error::from(e).with_context("Failed to parse OpenAPI document"))?;
    Ok(spec)
}

/// Reads and parses an OpenAPI document file.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed.
pub async fn load_document(path: &Path) -> Result<OpenAPI, Error> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_document(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const YAML_DOC: &str = r#"
openapi: "3.0.0"
info:
  title: Minimal
  version: "1.0.0"
paths: {}
"#;

    #[test]
    fn parses_yaml_document() {
        let spec = parse_document(YAML_DOC).unwrap();
        assert_eq!(spec.info.title, "Minimal");
    }

    #[test]
    fn parses_json_document() {
        let json = r#"{"openapi":"3.0.0","info":{"title":"J","version":"1"},"paths":{}}"#;
        let spec = parse_document(json).unwrap();
        assert_eq!(spec.info.title, "J");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_document(": not: [valid").is_err());
    }

    #[tokio::test]
    async fn loads_document_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(YAML_DOC.as_bytes()).unwrap();
        file.flush().unwrap();

        let spec = load_document(file.path()).await.unwrap();
        assert_eq!(spec.info.title, "Minimal");
    }
}
