//! Client core for a facility-management HTTP/OData API.
//!
//! # Overview
//! A session starts with [`FmService::login`], which posts the user's
//! credentials to the service's authentication endpoint and keeps the
//! returned cookies in a transport owned by the session. Every later call
//! goes through one request core: the URL is built from the session's base
//! URL, the path and an encoded [`Query`]; JSON headers are attached; and
//! the response is either decoded or normalized into an [`FmRequestError`].
//!
//! # Design
//! - `FmService` is immutable and cheap to clone. Cookie state lives in
//!   its [`Transport`], one per login, so concurrent sessions stay apart.
//! - Request building and response parsing are pure functions over
//!   [`HttpRequest`] / [`HttpResponse`]; only the transport does I/O.
//! - Missing inputs fail with [`FmError::Validation`] before any request
//!   is sent.
//!
//! ```no_run
//! use fm_core::{ClientConfig, CollectionQuery, Credentials, FmService};
//!
//! let service = FmService::login(
//!     &ClientConfig::default(),
//!     "https://fm.example.com/api/",
//!     &Credentials::new("admin", "secret"),
//! )?;
//! let open = service.get_odata_collection(
//!     "OData/ServiceDesk/Ticket",
//!     &CollectionQuery::new().filter("Status eq 'Open'").top(20),
//! )?;
//! println!("{} open tickets", open.value.len());
//! # Ok::<(), fm_core::FmError>(())
//! ```

pub mod activities;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod odata;
pub mod query;
pub mod transport;

pub use client::{
    build_login_request, check_response, parse_login_response, parse_response, Credentials,
    FmService, RequestDescriptor, LOGIN_PATH,
};
pub use config::{ClientConfig, EmptyBody};
pub use error::{FmError, FmRequestError, TransportError, DEFAULT_REQUEST_ERROR_MESSAGE};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use odata::{entity_path, CollectionQuery, EntityKey, ODataCollection, ODataEntity};
pub use query::{encode_query, Query, QueryValue};
pub use transport::{Transport, UreqTransport};
