//! Descriptor registry.
//!
//! Loads a serialized `FileDescriptorSet`, resolves exactly one service,
//! and caches everything later transcoding steps need per RPC method:
//! message descriptors, optional per-verb HTTP path rewrites read from
//! the `google.api.http` method option, and the transcoding type of each
//! direction. The registry is built once at filter construction and is
//! immutable afterwards, so it can be shared read-only across streams.

use std::collections::HashMap;

use bridge_core::{BridgeError, BridgeResult, HttpMethod};
use bytes::Bytes;
use prost_reflect::{
    DescriptorPool, DynamicMessage, ExtensionDescriptor, Kind, MessageDescriptor,
};
use tracing::{debug, warn};

/// Fully qualified name of the well-known raw body wrapper type.
pub const HTTP_BODY_TYPE: &str = "google.api.HttpBody";

/// Fully qualified name of the HTTP rule method option.
const HTTP_RULE_EXTENSION: &str = "google.api.http";

/// Which conversion path applies to one direction of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodingType {
    /// Structured message, converted to and from JSON text.
    HttpJson,
    /// Raw passthrough: a designated field carries opaque body bytes plus
    /// a content type, mapped directly to the HTTP message body.
    HttpBody,
}

/// Per-verb HTTP path templates read from a `google.api.http` rule.
#[derive(Debug, Clone, Default)]
pub struct PathRewrite {
    templates: HashMap<HttpMethod, String>,
}

impl PathRewrite {
    pub fn insert(&mut self, method: HttpMethod, template: impl Into<String>) {
        self.templates.insert(method, template.into());
    }

    /// The rewrite template for `method`, if the rule defines one.
    pub fn template_for(&self, method: HttpMethod) -> Option<&str> {
        self.templates.get(&method).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Everything the bridge knows about one RPC method, computed once at
/// init and immutable afterwards.
#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub(crate) name: String,
    pub(crate) input: MessageDescriptor,
    pub(crate) output: MessageDescriptor,
    pub(crate) rewrite: PathRewrite,
    pub(crate) request_type: TranscodingType,
    pub(crate) response_type: TranscodingType,
    pub(crate) request_body_path: Vec<u32>,
    pub(crate) response_body_path: Vec<u32>,
}

impl MethodEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self) -> &MessageDescriptor {
        &self.input
    }

    pub fn output(&self) -> &MessageDescriptor {
        &self.output
    }

    pub fn rewrite(&self) -> &PathRewrite {
        &self.rewrite
    }

    pub fn request_type(&self) -> TranscodingType {
        self.request_type
    }

    pub fn response_type(&self) -> TranscodingType {
        self.response_type
    }
}

/// The method table for one bridged service.
#[derive(Debug)]
pub struct ServiceIndex {
    service_name: String,
    methods: HashMap<String, MethodEntry>,
}

impl ServiceIndex {
    /// Build the index from a serialized `FileDescriptorSet`.
    ///
    /// Any failure aborts construction entirely; a half-initialized
    /// registry must never serve transcoding calls.
    pub fn from_bytes(bytes: &[u8], service_name: &str) -> BridgeResult<Self> {
        let pool = DescriptorPool::decode(Bytes::copy_from_slice(bytes)).map_err(|e| {
            BridgeError::Config(format!("failed to parse descriptor set: {}", e))
        })?;

        let service = pool.get_service_by_name(service_name).ok_or_else(|| {
            BridgeError::Config(format!(
                "service '{}' not found in descriptor set",
                service_name
            ))
        })?;

        let http_rule_ext = pool.get_extension_by_name(HTTP_RULE_EXTENSION);

        let mut methods = HashMap::new();
        for method in service.methods() {
            if method.is_client_streaming() || method.is_server_streaming() {
                warn!(
                    method = method.full_name(),
                    "skipping streaming method; only unary methods are bridged"
                );
                continue;
            }

            let rule = http_rule_ext
                .as_ref()
                .and_then(|ext| read_http_rule(&method.options(), ext));
            let (rewrite, body_spec, response_body_spec) = rule.unwrap_or_default();

            let (request_type, request_body_path) =
                classify_body(&method.input(), body_spec.as_deref());
            let (response_type, response_body_path) =
                classify_body(&method.output(), response_body_spec.as_deref());

            debug!(
                method = method.name(),
                request_type = ?request_type,
                response_type = ?response_type,
                "indexed method"
            );

            methods.insert(
                method.name().to_string(),
                MethodEntry {
                    name: method.name().to_string(),
                    input: method.input(),
                    output: method.output(),
                    rewrite,
                    request_type,
                    response_type,
                    request_body_path,
                    response_body_path,
                },
            );
        }

        if methods.is_empty() {
            return Err(BridgeError::Config(format!(
                "service '{}' has no unary methods to bridge",
                service_name
            )));
        }

        Ok(Self {
            service_name: service_name.to_string(),
            methods,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Exact-match lookup by method name. No prefix matching, no case
    /// folding.
    pub fn get(&self, method_name: &str) -> Option<&MethodEntry> {
        self.methods.get(method_name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Read the per-verb rewrite templates plus the `body`/`response_body`
/// field specs out of a `google.api.http` method option, if set.
fn read_http_rule(
    options: &DynamicMessage,
    ext: &ExtensionDescriptor,
) -> Option<(PathRewrite, Option<String>, Option<String>)> {
    if !options.has_extension(ext) {
        return None;
    }
    let value = options.get_extension(ext);
    let rule = value.as_message()?;

    let mut rewrite = PathRewrite::default();
    add_binding(rule, &mut rewrite);
    if let Some(bindings) = rule.get_field_by_name("additional_bindings") {
        if let Some(list) = bindings.as_list() {
            for binding in list {
                if let Some(msg) = binding.as_message() {
                    add_binding(msg, &mut rewrite);
                }
            }
        }
    }

    let body = rule_field_str(rule, "body");
    let response_body = rule_field_str(rule, "response_body");
    Some((rewrite, body, response_body))
}

/// Collect one rule's verb/template pair into `rewrite`. Only the four
/// verbs the bridge recognizes are considered.
fn add_binding(rule: &DynamicMessage, rewrite: &mut PathRewrite) {
    for (field, method) in [
        ("get", HttpMethod::Get),
        ("post", HttpMethod::Post),
        ("put", HttpMethod::Put),
        ("delete", HttpMethod::Delete),
    ] {
        if let Some(template) = rule_field_str(rule, field) {
            rewrite.insert(method, template);
        }
    }
}

fn rule_field_str(rule: &DynamicMessage, name: &str) -> Option<String> {
    let value = rule.get_field_by_name(name)?;
    let s = value.as_str()?;
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Decide whether one direction of a method is a raw body passthrough.
///
/// `body_spec` is the HttpRule `body`/`response_body` value: `None`, `""`
/// or `"*"` designate the whole message, otherwise a dotted field path.
/// The message itself (zero fields) must be `google.api.HttpBody`, or the
/// path must walk singular message fields ending at it. Any other shape
/// is structured JSON.
pub(crate) fn classify_body(
    message: &MessageDescriptor,
    body_spec: Option<&str>,
) -> (TranscodingType, Vec<u32>) {
    let spec = match body_spec {
        None | Some("") | Some("*") => {
            if message.full_name() == HTTP_BODY_TYPE {
                return (TranscodingType::HttpBody, Vec::new());
            }
            return (TranscodingType::HttpJson, Vec::new());
        }
        Some(spec) => spec,
    };

    let mut current = message.clone();
    let mut path = Vec::new();
    for segment in spec.split('.') {
        let field = match current.get_field_by_name(segment) {
            Some(field) => field,
            None => return (TranscodingType::HttpJson, Vec::new()),
        };
        if field.is_list() || field.is_map() {
            return (TranscodingType::HttpJson, Vec::new());
        }
        let inner = match field.kind() {
            Kind::Message(inner) => inner,
            _ => return (TranscodingType::HttpJson, Vec::new()),
        };
        path.push(field.number());
        current = inner;
    }

    if current.full_name() == HTTP_BODY_TYPE {
        (TranscodingType::HttpBody, path)
    } else {
        (TranscodingType::HttpJson, Vec::new())
    }
}
