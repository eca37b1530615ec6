use std::env;
use std::path::PathBuf;

/// Default ceiling for a whole upload request: 10 GiB
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024 * 1024;

/// Default per-copy buffer: 8 KiB
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 8 * 1024;

/// Configuration for the upload pipeline and the HTTP listener
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum accepted upload size in bytes, summed over all parts (default: 10 GiB)
    pub max_upload_size: u64,

    /// Directory every uploaded file is written under (default: "uploads")
    pub upload_root: PathBuf,

    /// Size of the intermediate buffer used when copying a part (default: 8 KiB)
    pub copy_buffer_size: usize,

    /// Address the server binds to (default: "0.0.0.0:5000")
    pub listen_addr: String,

    /// Upper bound on part writers touching the disk at the same time (default: 16)
    pub max_concurrent_writes: usize,

    /// Delete the files of a request once any of its parts failed (default: false)
    pub rollback_on_failure: bool,

    /// Where parts are spooled while the body is parsed (default: system temp dir)
    pub staging_dir: Option<PathBuf>,

    /// Mode applied to every written file (default: 0o644)
    pub file_mode: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            upload_root: PathBuf::from("uploads"),
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            listen_addr: "0.0.0.0:5000".to_string(),
            max_concurrent_writes: 16,
            rollback_on_failure: false,
            staging_dir: None,
            file_mode: 0o644,
        }
    }
}

impl UploadConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            upload_root: env::var("UPLOAD_ROOT")
                .map(PathBuf::from)
                .unwrap_or(default.upload_root),

            copy_buffer_size: env::var("COPY_BUFFER_SIZE")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|size| *size > 0)
                .unwrap_or(default.copy_buffer_size),

            listen_addr: env::var("LISTEN_ADDR").unwrap_or(default.listen_addr),

            max_concurrent_writes: env::var("MAX_CONCURRENT_WRITES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|limit| *limit > 0)
                .unwrap_or(default.max_concurrent_writes),

            rollback_on_failure: env::var("ROLLBACK_ON_FAILURE")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.rollback_on_failure),

            staging_dir: env::var("STAGING_DIR").ok().map(PathBuf::from),

            file_mode: env::var("FILE_MODE")
                .ok()
                .and_then(|v| u32::from_str_radix(v.trim_start_matches("0o"), 8).ok())
                .unwrap_or(default.file_mode),
        }
    }

    /// Create config for local development (small limits, loopback listener)
    pub fn development() -> Self {
        Self {
            max_upload_size: 256 * 1024 * 1024,
            listen_addr: "127.0.0.1:5000".to_string(),
            max_concurrent_writes: 8,
            ..Self::default()
        }
    }

    /// Body limit handed to axum; saturates on targets where usize is narrower than u64
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.max_upload_size).unwrap_or(usize::MAX)
    }
}
