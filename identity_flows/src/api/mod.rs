mod client;
mod errors;
mod reqwest_transport;
mod transport;
mod types;

pub use client::ApiClient;
pub use errors::{ApiError, TransportError, ValidationError};
pub use reqwest_transport::ReqwestTransport;
pub use transport::HttpTransport;
pub use types::{ApiRequest, ApiResponse, ApiResult, RequestBody, ServerError};

pub(crate) use types::endpoints;
