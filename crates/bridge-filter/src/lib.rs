//! Host-facing filter for the gRPC ⇄ HTTP/1.1 reverse bridge.
//!
//! The host's HTTP pipeline drives the [`Filter`] through four callback
//! points (request headers, request data, response headers, response
//! data) and applies the returned actions. Per-stream state lives in the
//! [`SessionStore`] between callbacks; the descriptor registry is built
//! once at construction and shared read-only afterwards.

pub mod config;
pub mod filter;
pub mod session;

pub use config::{FilterConfig, RouteConfig};
pub use filter::{
    content_types, tokens, DataAction, Filter, HeadersAction, LocalReply, RequestHeaders,
    ResponseHeaders, TranscodedPayload, ORIGINAL_PATH_HEADER,
};
pub use session::{
    Session, SessionError, SessionGuard, SessionId, SessionStore, DEFAULT_STALE_SESSION_TIMEOUT,
};
