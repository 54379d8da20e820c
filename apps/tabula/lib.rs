pub mod api;
pub mod assistant;
pub mod config;
pub mod format;
pub mod governance;
pub mod involvement;
pub mod llm;
pub mod retry;
pub mod updates;
