use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");
const DATA_DIR_ENV: &str = "FOLIO_DATA_DIR";

/// Root directory for all persisted state: document store, uploaded
/// image blobs and the generated site files live underneath it.
pub fn data_dir() -> std::path::PathBuf {
    if let Ok(override_dir) = std::env::var(DATA_DIR_ENV) {
        let override_dir = override_dir.trim();
        if !override_dir.is_empty() {
            let path = std::path::PathBuf::from(override_dir);
            if !path.exists() {
                std::fs::create_dir_all(&path).expect("Failed to create data directory");
            }
            return path;
        }
    }

    let path = if cfg!(debug_assertions) {
        std::path::PathBuf::from(PROJECT_ROOT).join("../../dev_assets")
    } else {
        ProjectDirs::from("dev", "folio", "folio")
            .expect("OS didn't give us a home directory")
            .data_dir()
            .to_path_buf()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).expect("Failed to create data directory");
    }

    path
}

/// Directory holding the JSON documents (history, profile, site).
pub fn documents_dir() -> std::path::PathBuf {
    data_dir().join("documents")
}

/// Directory holding uploaded image blobs.
pub fn uploads_dir() -> std::path::PathBuf {
    data_dir().join("uploads")
}

/// Directory the three generated site files are materialized into for
/// live preview.
pub fn site_dir() -> std::path::PathBuf {
    data_dir().join("portfolio")
}
