//! Core types for the gRPC ⇄ HTTP/1.1 reverse bridge.
//!
//! This crate provides the foundation types used across the bridge:
//! - gRPC wire framing (5-byte frame header encode/decode)
//! - HTTP method and path model for transcoded calls
//! - gRPC status codes and the HTTP status mapping
//! - the shared error taxonomy

pub mod error;
pub mod framing;
pub mod http_method;
pub mod status;

pub use error::{BridgeError, BridgeResult};
pub use framing::{decode_frame, encode_frame, FrameError, GRPC_FH_DEFAULT, GRPC_FRAME_HEADER_SIZE};
pub use http_method::{HttpMethod, HttpMethodAndPath};
pub use status::{grpc_to_http_status, http_to_grpc_status, GrpcStatus};
