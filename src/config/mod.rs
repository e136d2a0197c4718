mod server;

pub use server::{DEFAULT_MAX_EVIDENCE_BYTES, DEFAULT_MAX_IMPORT_BYTES, FileConfig, ServerConfig};
