//! Authenticated request gateway over the REST backend.

mod client;
mod refresh;
mod request;
mod response;

pub use client::ApiClient;
pub use refresh::{CoordinatorState, RefreshCoordinator};
pub use request::{ApiRequest, FormPart, RequestBody, CONTENT_TYPE_FORM, CONTENT_TYPE_JSON};
pub use response::Payload;
