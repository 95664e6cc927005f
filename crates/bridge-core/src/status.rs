//! gRPC status codes and the HTTP ⇄ gRPC status mapping.
//!
//! When an upstream HTTP response cannot be transcoded, the bridge still
//! answers the gRPC caller with a well-formed reply; the HTTP status is
//! folded into the gRPC status carried in the trailer.

/// The canonical gRPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrpcStatus {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl GrpcStatus {
    /// The numeric wire value carried in the `grpc-status` trailer.
    pub fn code(&self) -> u32 {
        *self as u32
    }
}

/// Map an upstream HTTP status to a gRPC status.
///
/// The OK case is checked first against the inverse mapping; the rest
/// follows the standard HTTP-to-gRPC table, defaulting to `Unknown`.
pub fn http_to_grpc_status(http_status: u16) -> GrpcStatus {
    if http_status == grpc_to_http_status(GrpcStatus::Ok) {
        return GrpcStatus::Ok;
    }
    match http_status {
        400 => GrpcStatus::Internal,
        401 => GrpcStatus::Unauthenticated,
        403 => GrpcStatus::PermissionDenied,
        404 => GrpcStatus::Unimplemented,
        429 | 502 | 503 | 504 => GrpcStatus::Unavailable,
        _ => GrpcStatus::Unknown,
    }
}

/// Map a gRPC status to the HTTP status a plain-HTTP caller would see.
pub fn grpc_to_http_status(status: GrpcStatus) -> u16 {
    match status {
        GrpcStatus::Ok => 200,
        GrpcStatus::Cancelled => 499,
        GrpcStatus::Unknown => 500,
        GrpcStatus::InvalidArgument => 400,
        GrpcStatus::DeadlineExceeded => 504,
        GrpcStatus::NotFound => 404,
        GrpcStatus::AlreadyExists => 409,
        GrpcStatus::PermissionDenied => 403,
        GrpcStatus::ResourceExhausted => 429,
        GrpcStatus::FailedPrecondition => 400,
        GrpcStatus::Aborted => 409,
        GrpcStatus::OutOfRange => 400,
        GrpcStatus::Unimplemented => 501,
        GrpcStatus::Internal => 500,
        GrpcStatus::Unavailable => 503,
        GrpcStatus::DataLoss => 500,
        GrpcStatus::Unauthenticated => 401,
    }
}
