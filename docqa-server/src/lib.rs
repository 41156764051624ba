//! `docqa-server` serves question answering over an index built by `docqa build`.
//! It exposes a single-page UI, a JSON/form `/ask` endpoint and the indexed images.

pub mod server;

pub use server::{AppState, ServerConfig, app_router, run_server};
