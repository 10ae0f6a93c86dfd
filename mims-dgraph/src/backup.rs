//! Backup files: one JSON document per tenant snapshot.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mims_core::{MimsError, TenancyMode, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const BACKUP_FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub tenant_id: TenantId,
    pub namespace: String,
    pub created_at: DateTime<Utc>,
    pub mode: TenancyMode,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupData {
    #[serde(default)]
    pub nodes: Vec<Value>,
    #[serde(default)]
    pub hierarchies: Vec<Value>,
    #[serde(default)]
    pub edges: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupFile {
    pub metadata: BackupMetadata,
    pub data: BackupData,
}

impl BackupFile {
    /// `<tenantId>-<YYYYmmddTHHMMSSZ>.json`
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.json",
            self.metadata.tenant_id,
            self.metadata.created_at.format("%Y%m%dT%H%M%SZ")
        )
    }
}

/// Write `backup` into `dir`, creating the directory if needed.
pub async fn write_backup(dir: &Path, backup: &BackupFile) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create backup directory {}", dir.display()))?;

    let path = dir.join(backup.file_name());
    let bytes = serde_json::to_vec_pretty(backup)?;
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("failed to write backup {}", path.display()))?;
    Ok(path)
}

/// Resolve a backup file name inside `dir`.
///
/// Only a bare file name is accepted: absolute paths, directory separators and
/// `..` are refused with `INVALID_BACKUP_PATH`.
pub fn resolve_backup_path(dir: &Path, file_name: &str) -> Result<PathBuf> {
    let mut components = Path::new(file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => Ok(dir.join(name)),
        _ => Err(MimsError::bad_request(format!(
            "Backup '{file_name}' must be a file name inside the backup directory"
        ))
        .with_code("INVALID_BACKUP_PATH")
        .into_anyhow()),
    }
}

pub async fn read_backup(path: &Path) -> Result<BackupFile> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(MimsError::not_found(format!("Backup file {} not found", path.display()))
                .with_code("BACKUP_NOT_FOUND")
                .into_anyhow());
        }
        Err(err) => {
            return Err(anyhow::Error::new(err).context(format!("failed to read backup {}", path.display())))
        }
    };

    serde_json::from_slice(&bytes).map_err(|err| {
        MimsError::unprocessable(format!("Backup file {} is malformed: {err}", path.display()))
            .with_code("BACKUP_INVALID")
            .into_anyhow()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample() -> BackupFile {
        BackupFile {
            metadata: BackupMetadata {
                tenant_id: TenantId("acme".into()),
                namespace: "0x2a".into(),
                created_at: Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap(),
                mode: TenancyMode::EnterpriseMultiTenant,
                version: BACKUP_FORMAT_VERSION.into(),
            },
            data: BackupData {
                nodes: vec![json!({ "id": "n1", "label": "Root" })],
                ..BackupData::default()
            },
        }
    }

    #[test]
    fn file_name_is_tenant_and_utc_stamp() {
        assert_eq!(sample().file_name(), "acme-20260304T050607Z.json");
    }

    #[test]
    fn metadata_uses_camel_case() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["metadata"]["tenantId"], "acme");
        assert_eq!(value["metadata"]["mode"], "enterprise-multi-tenant");
        assert!(value["data"]["edges"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn written_backup_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_backup(&dir.path().join("nested"), &sample()).await.unwrap();
        assert!(path.ends_with("acme-20260304T050607Z.json"));
        assert_eq!(read_backup(&path).await.unwrap(), sample());
    }

    #[test]
    fn backup_names_stay_inside_the_directory() {
        let dir = Path::new("/srv/backups");
        assert_eq!(
            resolve_backup_path(dir, "acme-20260304T050607Z.json").unwrap(),
            dir.join("acme-20260304T050607Z.json")
        );

        for name in ["../x.json", "/etc/passwd", "nested/x.json", "..", ".", ""] {
            let err = resolve_backup_path(dir, name).unwrap_err();
            assert_eq!(MimsError::normalize(err).code, "INVALID_BACKUP_PATH", "{name}");
        }
    }

    #[tokio::test]
    async fn unreadable_backups_are_typed() {
        let dir = tempfile::tempdir().unwrap();
        let missing = read_backup(&dir.path().join("nope.json")).await.unwrap_err();
        assert_eq!(MimsError::normalize(missing).code, "BACKUP_NOT_FOUND");

        let bad = dir.path().join("bad.json");
        tokio::fs::write(&bad, b"{ not json").await.unwrap();
        let err = read_backup(&bad).await.unwrap_err();
        assert_eq!(MimsError::normalize(err).code, "BACKUP_INVALID");
    }
}
