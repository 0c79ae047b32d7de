pub mod chat;
pub mod db;
pub mod directory;
mod error;
pub mod imaging;
pub mod inference;
pub mod metrics;
pub mod settings;
pub mod triage;

pub use db::Database;
pub use error::{StoreError, StoreResult};

/// Initialize logging (reads RUST_LOG env var). Call once at startup;
/// the application keeps working without it, just silently.
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
