//! Method resolution.
//!
//! Resolution returns an owned [`ActiveMethod`] value that callers thread
//! through every subsequent transcoding call for that direction. Nothing
//! is stored filter-wide, so concurrent calls on one filter instance can
//! never observe each other's selection.

use bridge_core::{BridgeError, BridgeResult, HttpMethodAndPath};
use prost_reflect::MessageDescriptor;

use crate::descriptor::{MethodEntry, ServiceIndex, TranscodingType};

/// The resolved method for one call, plus the verb and path it arrived
/// with.
#[derive(Debug, Clone)]
pub struct ActiveMethod {
    entry: MethodEntry,
    method_and_path: HttpMethodAndPath,
}

impl ServiceIndex {
    /// Resolve the RPC method addressed by `method_and_path`.
    ///
    /// The method name is the final path segment after the last `/`,
    /// matched exactly against the method table.
    pub fn prepare_transcoding(
        &self,
        method_and_path: &HttpMethodAndPath,
    ) -> BridgeResult<ActiveMethod> {
        let name = method_and_path.method_name();
        let entry = self.get(name).ok_or_else(|| {
            BridgeError::Routing(format!(
                "no method named '{}' in service '{}'",
                name,
                self.service_name()
            ))
        })?;
        Ok(ActiveMethod {
            entry: entry.clone(),
            method_and_path: method_and_path.clone(),
        })
    }
}

impl ActiveMethod {
    pub fn name(&self) -> &str {
        self.entry.name()
    }

    /// The path the outgoing HTTP request should carry: the rewrite
    /// template for the observed verb if the method defines one, else
    /// the original path unchanged.
    pub fn http_request_path(&self) -> String {
        self.entry
            .rewrite()
            .template_for(self.method_and_path.method)
            .map(str::to_string)
            .unwrap_or_else(|| self.method_and_path.path.clone())
    }

    pub fn request_type(&self) -> TranscodingType {
        self.entry.request_type()
    }

    pub fn response_type(&self) -> TranscodingType {
        self.entry.response_type()
    }

    pub fn request_descriptor(&self) -> &MessageDescriptor {
        self.entry.input()
    }

    pub fn response_descriptor(&self) -> &MessageDescriptor {
        self.entry.output()
    }

    /// Field-number path to the request-side HttpBody, empty when the
    /// whole message is the body.
    pub fn request_body_path(&self) -> &[u32] {
        &self.entry.request_body_path
    }

    pub fn response_body_path(&self) -> &[u32] {
        &self.entry.response_body_path
    }
}
