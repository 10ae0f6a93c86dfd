use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use mims_core::{MimsError, NamespaceId};
use tracing::{debug, info};

use crate::client::graphql_error_message;
use crate::guard::Validation;
use crate::transport::{DgraphRequest, DgraphTransport};

/// Schema text and where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDocument {
    pub path: PathBuf,
    pub text: String,
}

/// Read the first readable schema file among `paths`.
pub async fn load_schema_from_file<P: AsRef<Path>>(paths: &[P]) -> Result<SchemaDocument> {
    for path in paths {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                if text.trim().is_empty() {
                    return Err(MimsError::unprocessable(format!(
                        "Schema file {} is empty",
                        path.display()
                    ))
                    .with_code("SCHEMA_EMPTY")
                    .into_anyhow());
                }
                debug!(path = %path.display(), "found schema file");
                return Ok(SchemaDocument {
                    path: path.to_path_buf(),
                    text,
                });
            }
            Err(err) => debug!(path = %path.display(), error = %err, "schema file not readable"),
        }
    }

    let tried: Vec<String> = paths.iter().map(|p| p.as_ref().display().to_string()).collect();
    Err(MimsError::not_found(format!(
        "Failed to find a schema file in any of the expected locations: {tried:?}"
    ))
    .with_code("SCHEMA_NOT_FOUND")
    .into_anyhow())
}

/// Push raw schema text to `/admin/schema` for `namespace`.
pub async fn push_schema(
    transport: &dyn DgraphTransport,
    validation: Validation<'_>,
    namespace: Option<NamespaceId>,
    schema: &str,
    timeout: Duration,
) -> Result<()> {
    let request = validation.scope(
        "push schema",
        DgraphRequest::post_schema(schema, timeout),
        namespace.clone(),
    )?;

    let response = transport
        .send(request)
        .await
        .context("schema push did not reach Dgraph")?;

    if !response.is_success() {
        return Err(MimsError::bad_gateway(format!(
            "Schema push rejected with HTTP status {}",
            response.status
        ))
        .with_code("SCHEMA_PUSH_FAILED")
        .into_anyhow());
    }
    if let Some(message) = graphql_error_message(&response.body) {
        return Err(MimsError::bad_gateway(format!("Schema push failed: {message}"))
            .with_code("SCHEMA_PUSH_FAILED")
            .into_anyhow());
    }

    info!(namespace = ?namespace, "schema pushed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn first_existing_path_wins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "type Node {{ id: ID! }}").unwrap();

        let doc = load_schema_from_file(&[Path::new("/nonexistent/schema.graphql"), file.path()])
            .await
            .unwrap();
        assert_eq!(doc.path, file.path());
        assert!(doc.text.contains("type Node"));
    }

    #[tokio::test]
    async fn missing_and_empty_schemas_are_rejected() {
        let err = load_schema_from_file(&["/nonexistent/a.graphql"]).await.unwrap_err();
        assert_eq!(MimsError::normalize(err).code, "SCHEMA_NOT_FOUND");

        let file = tempfile::NamedTempFile::new().unwrap();
        let err = load_schema_from_file(&[file.path()]).await.unwrap_err();
        assert_eq!(MimsError::normalize(err).code, "SCHEMA_EMPTY");
    }
}
