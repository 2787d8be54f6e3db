//! HTTP client types for record API communication.
//!
//! This module provides the transport layer the record binding engine sits
//! on: request/response types, the reqwest-backed client, and HTTP error
//! types.
//!
//! # Overview
//!
//! The main types in this module are:
//!
//! - [`HttpClient`]: The async HTTP client for API communication
//! - [`HttpRequest`]: A request to be sent to the API
//! - [`HttpResponse`]: A parsed response from the API
//! - [`HttpMethod`]: Supported HTTP methods (GET, POST, PUT, DELETE)
//! - [`DataType`]: Content types for request bodies
//!
//! # Retry Behavior
//!
//! The client implements opt-in retry logic for transient failures:
//!
//! - **429 (Rate Limited)**: Retries using the `Retry-After` header value,
//!   or 1 second if not present
//! - **500 (Server Error)**: Retries with a fixed 1-second delay
//! - **Other errors (4xx)**: Returns immediately without retry
//!
//! The default `tries` is 1, meaning no automatic retries; the record
//! binding core never retries on its own. Configure via
//! [`HttpRequest::builder`] with `.tries(n)` to enable retries.

mod errors;
mod http_client;
mod http_request;
mod http_response;

pub use errors::{
    HttpError, HttpResponseError, InvalidHttpRequestError, MaxHttpRetriesExceededError,
};
pub use http_client::{HttpClient, CLIENT_VERSION, RETRY_WAIT_TIME};
pub use http_request::{DataType, HttpMethod, HttpRequest, HttpRequestBuilder};
pub use http_response::HttpResponse;
