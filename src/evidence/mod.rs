mod storage;

pub use storage::{EvidenceStorage, EvidenceStorageError, StoredFile, detect_content_type};
