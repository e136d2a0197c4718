use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufReader};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EvidenceStorageError {
    #[error("file not found")]
    NotFound,
    #[error("file type '.{0}' is not allowed")]
    UnsupportedType(String),
    #[error("file content does not match its '.{0}' extension")]
    ContentMismatch(String),
    #[error("invalid stored path")]
    InvalidPath,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvidenceStorageError {
    fn from_io(e: std::io::Error) -> Self {
        if e.kind() == ErrorKind::NotFound {
            Self::NotFound
        } else {
            Self::Io(e)
        }
    }
}

/// Where an uploaded file ended up, relative to the evidence root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub stored_path: String,
    pub checksum: String,
    pub size: i64,
}

pub struct EvidenceStorage {
    base_path: PathBuf,
}

impl EvidenceStorage {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            base_path: data_dir.join("evidence"),
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, EvidenceStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(EvidenceStorageError::InvalidPath);
        }
        Ok(self.base_path.join(relative))
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path.join("tmp").join(Uuid::new_v4().to_string())
    }

    /// Writes `data` under the owning performance-data record's directory.
    pub async fn put(
        &self,
        performance_data_id: &str,
        data: &[u8],
    ) -> Result<StoredFile, EvidenceStorageError> {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let checksum = hex::encode(hasher.finalize());

        let stored_path = format!("{performance_data_id}/{}", Uuid::new_v4());
        let final_path = self.resolve(&stored_path)?;

        let temp_path = self.temp_path();
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut temp_file = File::create(&temp_path).await?;
        temp_file.write_all(data).await?;
        temp_file.sync_all().await?;

        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::rename(&temp_path, &final_path).await?;

        Ok(StoredFile {
            stored_path,
            checksum,
            size: data.len() as i64,
        })
    }

    pub async fn get(
        &self,
        stored_path: &str,
    ) -> Result<(BufReader<File>, i64), EvidenceStorageError> {
        let path = self.resolve(stored_path)?;
        let file = File::open(&path)
            .await
            .map_err(EvidenceStorageError::from_io)?;

        let metadata = file.metadata().await?;
        let size = metadata.len() as i64;

        Ok((BufReader::new(file), size))
    }

    pub async fn delete(&self, stored_path: &str) -> Result<bool, EvidenceStorageError> {
        let path = self.resolve(stored_path)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(EvidenceStorageError::Io(e)),
        }
    }

    /// Removes every file stored for one performance-data record.
    pub async fn delete_all(&self, performance_data_id: &str) -> Result<bool, EvidenceStorageError> {
        let path = self.resolve(performance_data_id)?;

        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(EvidenceStorageError::Io(e)),
        }
    }
}

const PDF: &[u8] = b"%PDF";
const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];
const ZIP: &[u8] = b"PK\x03\x04";
const OLE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

fn signature(extension: &str) -> Option<(&'static [u8], &'static str)> {
    let entry = match extension {
        "pdf" => (PDF, "application/pdf"),
        "png" => (PNG, "image/png"),
        "jpg" | "jpeg" => (JPEG, "image/jpeg"),
        "doc" => (OLE, "application/msword"),
        "xls" => (OLE, "application/vnd.ms-excel"),
        "docx" => (
            ZIP,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        "xlsx" => (
            ZIP,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ),
        _ => return None,
    };
    Some(entry)
}

/// Checks the file's extension against `allowed` and its leading bytes against
/// the extension, returning the content type to store.
pub fn detect_content_type(
    file_name: &str,
    data: &[u8],
    allowed: &[String],
) -> Result<&'static str, EvidenceStorageError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&extension)) {
        return Err(EvidenceStorageError::UnsupportedType(extension));
    }

    let (magic, content_type) =
        signature(&extension).ok_or_else(|| EvidenceStorageError::UnsupportedType(extension.clone()))?;

    if !data.starts_with(magic) {
        return Err(EvidenceStorageError::ContentMismatch(extension));
    }

    Ok(content_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn allowed() -> Vec<String> {
        ["pdf", "png", "jpg", "docx"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let storage = EvidenceStorage::new(temp_dir.path());

        let data = b"%PDF-1.7 laporan".to_vec();
        let stored = storage.put("pd-1", &data).await.unwrap();

        assert!(stored.stored_path.starts_with("pd-1/"));
        assert_eq!(stored.size, data.len() as i64);
        assert_eq!(stored.checksum.len(), 64);

        let (mut reader, size) = storage.get(&stored.stored_path).await.unwrap();
        assert_eq!(size, data.len() as i64);

        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, data);
    }

    #[tokio::test]
    async fn test_checksum_is_sha256() {
        let temp_dir = TempDir::new().unwrap();
        let storage = EvidenceStorage::new(temp_dir.path());

        let stored = storage.put("pd-1", b"123").await.unwrap();
        assert_eq!(
            stored.checksum,
            "a665a45920422f9d417e4867efdc4fb8a04a1f3fff1fa07e998e86f7f7a27ae3"
        );
    }

    #[tokio::test]
    async fn test_not_found_and_invalid_path() {
        let temp_dir = TempDir::new().unwrap();
        let storage = EvidenceStorage::new(temp_dir.path());

        assert!(matches!(
            storage.get("pd-1/missing").await,
            Err(EvidenceStorageError::NotFound)
        ));
        assert!(matches!(
            storage.get("../sakip.db").await,
            Err(EvidenceStorageError::InvalidPath)
        ));
        assert!(matches!(
            storage.get("/etc/passwd").await,
            Err(EvidenceStorageError::InvalidPath)
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        let storage = EvidenceStorage::new(temp_dir.path());

        let stored = storage.put("pd-1", b"\x89PNG\r\n\x1a\n").await.unwrap();
        assert!(storage.delete(&stored.stored_path).await.unwrap());
        assert!(!storage.delete(&stored.stored_path).await.unwrap());

        storage.put("pd-2", b"%PDF").await.unwrap();
        assert!(storage.delete_all("pd-2").await.unwrap());
        assert!(!storage.delete_all("pd-2").await.unwrap());
    }

    #[test]
    fn test_detect_content_type() {
        assert_eq!(
            detect_content_type("laporan.PDF", b"%PDF-1.4", &allowed()).unwrap(),
            "application/pdf"
        );
        assert_eq!(
            detect_content_type("foto.jpg", &[0xFF, 0xD8, 0xFF, 0xE0], &allowed()).unwrap(),
            "image/jpeg"
        );
        assert!(matches!(
            detect_content_type("script.exe", b"MZ", &allowed()),
            Err(EvidenceStorageError::UnsupportedType(_))
        ));
        assert!(matches!(
            detect_content_type("fake.pdf", b"<html>", &allowed()),
            Err(EvidenceStorageError::ContentMismatch(_))
        ));
        assert!(matches!(
            detect_content_type("noext", b"%PDF", &allowed()),
            Err(EvidenceStorageError::UnsupportedType(_))
        ));
    }
}
