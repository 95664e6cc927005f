//! Dynamic transcoding engine for the gRPC reverse bridge.
//!
//! Types are resolved at runtime from a compiled `FileDescriptorSet`
//! rather than generated at build time, so one filter binary can bridge
//! any service it is handed a descriptor for:
//! - descriptor registry with a per-method transcoding table
//! - method resolution from an HTTP path to an [`ActiveMethod`]
//! - binary protobuf ⇄ JSON conversion through the descriptor pool
//! - raw wire-format handling for `google.api.HttpBody` payloads

pub mod descriptor;
pub mod http_body;
pub mod json;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testutil;

pub use descriptor::{MethodEntry, PathRewrite, ServiceIndex, TranscodingType, HTTP_BODY_TYPE};
pub use http_body::{grpc_to_http_body, http_body_to_grpc, HttpBody};
pub use json::{grpc_to_json, json_to_grpc};
pub use resolver::ActiveMethod;
