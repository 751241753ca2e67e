use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Triascan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the application data directory
/// ~/Triascan/ on all platforms (user-visible)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Triascan")
}

/// Get the models directory (exported ONNX classifier artifacts)
pub fn models_dir() -> PathBuf {
    app_data_dir().join("models")
}

/// Get the local artifact store root (source images + overlays)
pub fn artifacts_dir() -> PathBuf {
    app_data_dir().join("artifacts")
}

/// Get the diagnosis database path
pub fn database_path() -> PathBuf {
    app_data_dir().join("triascan.db")
}

/// Default tracing filter when RUST_LOG is unset
pub fn default_log_filter() -> String {
    "info,triascan=debug".to_string()
}
