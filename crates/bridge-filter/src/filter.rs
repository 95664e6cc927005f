//! The request/response state machine driving the bridge.
//!
//! The host hands this filter the four callback events of one HTTP
//! exchange; the filter buffers each direction fully (transcoding needs
//! the complete payload), converts it, and tells the host what to forward.
//! Every per-call failure becomes a synthesized reply carrying a gRPC
//! status; only construction failures are fatal.

use bridge_core::{
    decode_frame, encode_frame, http_to_grpc_status, BridgeError, GrpcStatus, HttpMethod,
    HttpMethodAndPath,
};
use bridge_transcoder::{
    grpc_to_http_body, grpc_to_json, http_body_to_grpc, json_to_grpc, HttpBody, ServiceIndex,
    TranscodingType,
};
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, TE};
use tracing::{debug, error};

use crate::config::{FilterConfig, RouteConfig};
use crate::session::{Session, SessionId, SessionStore};

/// Marker header preserving the inbound gRPC path across the rewrite.
pub const ORIGINAL_PATH_HEADER: &str = "x-bridge-original-path";

/// Content types the bridge cares about.
pub mod content_types {
    pub const GRPC: &str = "application/grpc";
    pub const JSON: &str = "application/json";
}

/// Error tokens carried in synthesized replies. Tokens stay
/// whitespace-free so they survive hosts that reject header values with
/// spaces.
pub mod tokens {
    pub const UNEXPECTED_METHOD_TYPE: &str = "HTTP_method_type_is_unexpected";
    pub const UNEXPECTED_CONTENT_TYPE: &str = "HTTP_header_contains_unexpected_content_type";
    pub const GRPC_UNEXPECTED_REQUEST_PATH: &str = "gRPC_request_path_is_unexpected";
    pub const GRPC_FRAME_TOO_SMALL: &str = "gRPC_frame_content_is_too_small";
    pub const GRPC_TO_JSON_FAILED: &str = "Failed_to_transcode_gRPC_to_JSON";
    pub const JSON_TO_GRPC_FAILED: &str = "Failed_to_transcode_JSON_to_gRPC";
    pub const GRPC_TO_BODY_FAILED: &str = "Failed_to_transcode_gRPC_to_HTTP_body";
    pub const BODY_TO_GRPC_FAILED: &str = "Failed_to_transcode_HTTP_body_to_gRPC";
    pub const RESPONSE_NOT_OKAY: &str = "HTTP_response_status_code_is_not_okay";
    pub const RESPONSE_HEADER_ONLY: &str = "HTTP_response_is_header_only";
    pub const BUFFER_EXCEEDS_LIMIT: &str = "Buffered_data_exceeds_configured_limit";
    pub const INTERNAL_ERROR: &str = "Internal_bridge_error_occurred";
}

/// Decoder-side header view handed in by the host for one callback. The
/// filter mutates it in place; the host owns the map and its lifetime,
/// so no reference to it outlives the callback.
#[derive(Debug, Clone)]
pub struct RequestHeaders {
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
}

/// Encoder-side header view.
#[derive(Debug, Clone)]
pub struct ResponseHeaders {
    pub status: u16,
    pub headers: HeaderMap,
}

/// Synthesized downstream reply for a failed call.
///
/// The HTTP status is always 200: the transport is downgraded HTTP/1.1,
/// so only the gRPC status in the trailer communicates failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalReply {
    pub grpc_status: GrpcStatus,
    pub message: &'static str,
}

impl LocalReply {
    pub const HTTP_STATUS: u16 = 200;

    fn new(grpc_status: GrpcStatus, message: &'static str) -> Self {
        Self {
            grpc_status,
            message,
        }
    }

    fn unknown(message: &'static str) -> Self {
        Self::new(GrpcStatus::Unknown, message)
    }
}

/// What the host should do after a headers callback.
#[derive(Debug)]
pub enum HeadersAction {
    /// Forward the (possibly rewritten) headers downstream.
    Continue,
    /// Stop the stream and send the synthesized reply.
    Reply(LocalReply),
}

/// What the host should do after a body-chunk callback.
#[derive(Debug)]
pub enum DataAction {
    /// Forward the chunk unmodified; this stream is not being bridged.
    Forward,
    /// The message is still buffering; forward nothing yet.
    Buffer,
    /// Replace the buffered body with the transcoded payload.
    Transcoded(TranscodedPayload),
    /// Stop the stream and send the synthesized reply.
    Reply(LocalReply),
}

/// A finished transcoding step plus the header fixups the host must
/// apply. Header maps are host-owned and never retained across
/// callbacks, so fixups discovered at data time travel here instead.
#[derive(Debug)]
pub struct TranscodedPayload {
    pub body: Bytes,
    pub content_length: usize,
    /// Body mode only: content type extracted from the HttpBody message.
    pub content_type: Option<String>,
    /// Response side only: the `grpc-status` trailer value to attach.
    pub grpc_status: Option<GrpcStatus>,
}

/// One filter instance: an immutable descriptor registry plus the
/// session store for the streams of one worker.
pub struct Filter {
    index: ServiceIndex,
    sessions: SessionStore,
    buffer_limit: usize,
}

impl Filter {
    /// Build a filter instance from configuration.
    ///
    /// Reads the descriptor set fully into memory and builds the method
    /// table. Any failure here is fatal: the surrounding filter chain
    /// must refuse to activate rather than silently pass traffic.
    pub fn new(config: &FilterConfig) -> Result<Self, BridgeError> {
        let bytes = std::fs::read(&config.descriptor_path).map_err(|e| {
            BridgeError::Config(format!(
                "failed to read descriptor set '{}': {}",
                config.descriptor_path.display(),
                e
            ))
        })?;
        let index = ServiceIndex::from_bytes(&bytes, &config.service_name)?;
        Ok(Self::from_service_index(
            index,
            config.buffer_limit,
            config.stale_session_timeout(),
        ))
    }

    /// Build a filter around an already-constructed registry, for hosts
    /// that load descriptors themselves.
    pub fn from_service_index(
        index: ServiceIndex,
        buffer_limit: usize,
        stale_session_timeout: std::time::Duration,
    ) -> Self {
        Self {
            index,
            sessions: SessionStore::with_stale_timeout(stale_session_timeout),
            buffer_limit,
        }
    }

    pub fn service_index(&self) -> &ServiceIndex {
        &self.index
    }

    /// Request headers arrived. Decides pass-through vs transcoding,
    /// creates the session, and rewrites method/path/content-type
    /// headers. Content length is removed here because it is unknowable
    /// before body transcoding; the data callback reports the new value.
    pub fn on_request_headers(
        &mut self,
        stream_id: SessionId,
        headers: &mut RequestHeaders,
        end_stream: bool,
        route: Option<&RouteConfig>,
    ) -> HeadersAction {
        // A header-only request can never be a gRPC call.
        if end_stream {
            debug!(stream_id, "header-only request; pass through");
            return HeadersAction::Continue;
        }

        if route.map(|r| r.disabled).unwrap_or(false) {
            debug!(stream_id, "transcoding disabled for this route; pass through");
            return HeadersAction::Continue;
        }

        if !request_is_grpc(&headers.headers) {
            debug!(stream_id, "content type is not gRPC; pass through");
            return HeadersAction::Continue;
        }

        let mut guard = self.sessions.guard();
        let session = match guard.create_session(stream_id) {
            Ok(session) => session,
            Err(e) => {
                error!(stream_id, error = %e, "unable to create session");
                return HeadersAction::Reply(LocalReply::unknown(tokens::INTERNAL_ERROR));
            }
        };

        let method = match HttpMethod::from_str(&headers.method) {
            Ok(method) => method,
            Err(e) => {
                error!(stream_id, error = %e, "unrecognized HTTP method");
                return HeadersAction::Reply(LocalReply::unknown(tokens::UNEXPECTED_METHOD_TYPE));
            }
        };
        let method_and_path = HttpMethodAndPath::new(method, headers.path.clone());

        let active = match self.index.prepare_transcoding(&method_and_path) {
            Ok(active) => active,
            Err(e) => {
                error!(stream_id, error = %e, "request path matches no bridged method");
                return HeadersAction::Reply(LocalReply::unknown(
                    tokens::GRPC_UNEXPECTED_REQUEST_PATH,
                ));
            }
        };
        session.method_and_path = Some(method_and_path);

        let original_path = match HeaderValue::from_str(&headers.path) {
            Ok(value) => value,
            Err(e) => {
                error!(stream_id, error = %e, "request path is not a valid header value");
                return HeadersAction::Reply(LocalReply::unknown(tokens::INTERNAL_ERROR));
            }
        };
        headers
            .headers
            .insert(HeaderName::from_static(ORIGINAL_PATH_HEADER), original_path);
        headers.path = active.http_request_path();
        headers.headers.remove(TE);
        headers.headers.remove(CONTENT_LENGTH);

        match active.request_type() {
            TranscodingType::HttpJson => {
                debug!(stream_id, method = active.name(), "bridging request to HTTP/JSON");
                headers
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static(content_types::JSON));
                headers
                    .headers
                    .insert(ACCEPT, HeaderValue::from_static(content_types::JSON));
            }
            TranscodingType::HttpBody => {
                // The real content type lives inside the HttpBody message
                // and is only known once the body is transcoded.
                debug!(stream_id, method = active.name(), "bridging request to HTTP body");
                headers.headers.remove(CONTENT_TYPE);
            }
        }

        guard.keep_accessed_sessions_alive();
        HeadersAction::Continue
    }

    /// A request body chunk arrived. Accumulates until end-of-stream,
    /// then strips the gRPC frame and transcodes the complete message.
    pub fn on_request_data(
        &mut self,
        stream_id: SessionId,
        chunk: &[u8],
        end_stream: bool,
    ) -> DataAction {
        let mut guard = self.sessions.guard();
        let session = match guard.lookup_session(stream_id) {
            Ok(session) => session,
            Err(_) => {
                debug!(stream_id, "no session for stream; forward request data unmodified");
                return DataAction::Forward;
            }
        };

        if !chunk.is_empty() {
            debug!(stream_id, bytes = chunk.len(), "buffering request data");
            session.decoder_data.extend_from_slice(chunk);
        }

        if session.decoder_data.len() > self.buffer_limit {
            error!(stream_id, limit = self.buffer_limit, "request exceeds buffer limit");
            return DataAction::Reply(reject(
                BridgeError::BufferLimit(self.buffer_limit),
                tokens::BUFFER_EXCEEDS_LIMIT,
            ));
        }

        if !end_stream {
            guard.keep_accessed_sessions_alive();
            return DataAction::Buffer;
        }

        match transcode_request(&self.index, session) {
            Ok(payload) => {
                debug!(stream_id, bytes = payload.body.len(), "request transcoded");
                session.decoder_data.clear();
                guard.keep_accessed_sessions_alive();
                DataAction::Transcoded(payload)
            }
            Err(reply) => {
                error!(stream_id, token = reply.message, "request transcoding failed");
                DataAction::Reply(reply)
            }
        }
    }

    /// Response headers arrived from upstream. A non-OK status is folded
    /// into a gRPC error immediately; the body is never transcoded.
    pub fn on_response_headers(
        &mut self,
        stream_id: SessionId,
        headers: &mut ResponseHeaders,
        end_stream: bool,
    ) -> HeadersAction {
        let mut guard = self.sessions.guard();
        let session = match guard.lookup_session(stream_id) {
            Ok(session) => session,
            Err(_) => {
                debug!(stream_id, "no session for stream; forward response headers unmodified");
                return HeadersAction::Continue;
            }
        };

        let grpc_status = http_to_grpc_status(headers.status);
        if grpc_status != GrpcStatus::Ok {
            error!(stream_id, status = headers.status, "upstream returned non-OK status");
            return HeadersAction::Reply(LocalReply::new(grpc_status, tokens::RESPONSE_NOT_OKAY));
        }

        if end_stream {
            error!(stream_id, "header-only response; a bridged call always carries a payload");
            return HeadersAction::Reply(LocalReply::unknown(tokens::RESPONSE_HEADER_ONLY));
        }

        let Some(method_and_path) = session.method_and_path.clone() else {
            error!(stream_id, "session has no resolved method");
            return HeadersAction::Reply(reject(
                BridgeError::Precondition("session has no resolved method".to_string()),
                tokens::INTERNAL_ERROR,
            ));
        };
        let active = match self.index.prepare_transcoding(&method_and_path) {
            Ok(active) => active,
            Err(e) => {
                error!(stream_id, error = %e, "failed to re-resolve method for response");
                return HeadersAction::Reply(LocalReply::unknown(tokens::INTERNAL_ERROR));
            }
        };

        let content_type = headers
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match active.response_type() {
            TranscodingType::HttpJson => {
                if content_type.as_deref() != Some(content_types::JSON) {
                    error!(stream_id, ?content_type, "upstream response is not JSON");
                    return HeadersAction::Reply(reject(
                        BridgeError::ContentType(content_type.unwrap_or_default()),
                        tokens::UNEXPECTED_CONTENT_TYPE,
                    ));
                }
            }
            TranscodingType::HttpBody => {
                // The gRPC definition says nothing about what the content
                // type should be; accept whatever upstream sent and carry
                // it into the HttpBody message.
            }
        }

        session.response_status = Some(headers.status);
        session.response_content_type = content_type;

        headers
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_types::GRPC));
        headers.headers.remove(CONTENT_LENGTH);

        guard.keep_accessed_sessions_alive();
        HeadersAction::Continue
    }

    /// A response body chunk arrived. Mirrors the request side; on
    /// end-of-stream the payload is re-framed as gRPC and a
    /// `grpc-status` trailer is reported. The session completes here.
    pub fn on_response_data(
        &mut self,
        stream_id: SessionId,
        chunk: &[u8],
        end_stream: bool,
    ) -> DataAction {
        let mut guard = self.sessions.guard();
        let session = match guard.lookup_session(stream_id) {
            Ok(session) => session,
            Err(_) => {
                debug!(stream_id, "no session for stream; forward response data unmodified");
                return DataAction::Forward;
            }
        };

        if !chunk.is_empty() {
            debug!(stream_id, bytes = chunk.len(), "buffering response data");
            session.encoder_data.extend_from_slice(chunk);
        }

        if session.encoder_data.len() > self.buffer_limit {
            error!(stream_id, limit = self.buffer_limit, "response exceeds buffer limit");
            return DataAction::Reply(reject(
                BridgeError::BufferLimit(self.buffer_limit),
                tokens::BUFFER_EXCEEDS_LIMIT,
            ));
        }

        if !end_stream {
            guard.keep_accessed_sessions_alive();
            return DataAction::Buffer;
        }

        match transcode_response(&self.index, session) {
            Ok(payload) => {
                debug!(stream_id, "response transcoded; session complete");
                // Guard drops without keep-alive: the exchange is done
                // and the session is destroyed.
                DataAction::Transcoded(payload)
            }
            Err(reply) => {
                error!(stream_id, token = reply.message, "response transcoding failed");
                DataAction::Reply(reply)
            }
        }
    }
}

/// Recognize a gRPC request by content type: `application/grpc` exactly,
/// or with a codec suffix (`application/grpc+proto`) or parameters.
fn request_is_grpc(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    match value.strip_prefix(content_types::GRPC) {
        Some("") => true,
        Some(rest) => rest.starts_with('+') || rest.starts_with(';'),
        None => false,
    }
}

/// Fold a call-scoped error into the synthesized reply, recording the
/// underlying cause before it is collapsed to a token.
fn reject(err: BridgeError, token: &'static str) -> LocalReply {
    debug!(error = %err, token, "call rejected");
    LocalReply::unknown(token)
}

fn transcode_request(index: &ServiceIndex, session: &mut Session) -> Result<TranscodedPayload, LocalReply> {
    let Some(method_and_path) = session.method_and_path.clone() else {
        return Err(reject(
            BridgeError::Precondition("session has no resolved method".to_string()),
            tokens::INTERNAL_ERROR,
        ));
    };

    let payload = decode_frame(&session.decoder_data)
        .map_err(|e| reject(e.into(), tokens::GRPC_FRAME_TOO_SMALL))?;

    let active = index
        .prepare_transcoding(&method_and_path)
        .map_err(|e| reject(e, tokens::INTERNAL_ERROR))?;

    match active.request_type() {
        TranscodingType::HttpJson => {
            let json = grpc_to_json(active.request_descriptor(), &payload)
                .map_err(|e| reject(e, tokens::GRPC_TO_JSON_FAILED))?;
            let body = Bytes::from(json);
            Ok(TranscodedPayload {
                content_length: body.len(),
                body,
                content_type: None,
                grpc_status: None,
            })
        }
        TranscodingType::HttpBody => {
            let body = grpc_to_http_body(&payload, active.request_body_path())
                .map_err(|e| reject(e, tokens::GRPC_TO_BODY_FAILED))?;
            let content_type = (!body.content_type.is_empty()).then_some(body.content_type);
            Ok(TranscodedPayload {
                content_length: body.data.len(),
                body: body.data,
                content_type,
                grpc_status: None,
            })
        }
    }
}

fn transcode_response(index: &ServiceIndex, session: &mut Session) -> Result<TranscodedPayload, LocalReply> {
    let Some(method_and_path) = session.method_and_path.clone() else {
        return Err(reject(
            BridgeError::Precondition("session has no resolved method".to_string()),
            tokens::INTERNAL_ERROR,
        ));
    };
    let active = index
        .prepare_transcoding(&method_and_path)
        .map_err(|e| reject(e, tokens::INTERNAL_ERROR))?;

    let message = match active.response_type() {
        TranscodingType::HttpJson => {
            let json = std::str::from_utf8(&session.encoder_data).map_err(|e| {
                reject(
                    BridgeError::Transcode(format!("response JSON is not UTF-8: {}", e)),
                    tokens::JSON_TO_GRPC_FAILED,
                )
            })?;
            json_to_grpc(active.response_descriptor(), json)
                .map_err(|e| reject(e, tokens::JSON_TO_GRPC_FAILED))?
        }
        TranscodingType::HttpBody => {
            let body = HttpBody {
                content_type: session.response_content_type.clone().unwrap_or_default(),
                data: Bytes::copy_from_slice(&session.encoder_data),
            };
            let encoded = http_body_to_grpc(&body, active.response_body_path())
                .map_err(|e| reject(e, tokens::BODY_TO_GRPC_FAILED))?;
            encoded.to_vec()
        }
    };
    session.encoder_data.clear();

    let framed = encode_frame(&message);
    // The gRPC status is elided from the HTTP status that passed the
    // headers check, and always attached as a trailer.
    let grpc_status = http_to_grpc_status(session.response_status.unwrap_or(200));
    Ok(TranscodedPayload {
        content_length: framed.len(),
        body: framed,
        content_type: None,
        grpc_status: Some(grpc_status),
    })
}
