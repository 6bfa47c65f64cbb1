pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod session;

pub use config::ClientConfig;
pub use error::{ApiError, ApiResult};
pub use gateway::ApiClient;
pub use session::SessionStore;
