//! HTTP method and path model for transcoded calls.

use crate::error::BridgeError;

/// HTTP verbs a bridged call may arrive with. Anything else is rejected
/// at header-decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Parse an HTTP verb, case-insensitively.
    pub fn from_str(s: &str) -> Result<Self, BridgeError> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(BridgeError::Routing(format!(
                "unsupported HTTP method: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// The verb and path a request arrived with, captured once per call from
/// the request headers and carried in the session afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMethodAndPath {
    pub method: HttpMethod,
    pub path: String,
}

impl HttpMethodAndPath {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    /// The final path segment after the last `/`. gRPC request paths take
    /// the form `/package.Service/Method`, so this is the method name.
    pub fn method_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("")
    }
}
