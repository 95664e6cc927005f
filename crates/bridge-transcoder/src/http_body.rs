//! Raw wire-format handling for `google.api.HttpBody` payloads.
//!
//! Body mode never routes the (potentially large) payload through a
//! generic serializer. Parsing walks the cached field-number path through
//! length-delimited wire format directly; serialization hand-builds the
//! envelope around the raw bytes with every ancestor length prefix
//! precomputed bottom-up.

use bridge_core::{BridgeError, BridgeResult};
use bytes::{BufMut, Bytes, BytesMut};
use prost::encoding::{decode_varint, encode_varint, encoded_len_varint};

/// `google.api.HttpBody.content_type`
const CONTENT_TYPE_FIELD: u32 = 1;
/// `google.api.HttpBody.data`
const DATA_FIELD: u32 = 2;

/// Length-delimited wire type.
const WIRE_TYPE_LEN: u64 = 2;

/// A `google.api.HttpBody` payload: an opaque byte blob plus its content
/// type, mapped directly to and from an HTTP message body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpBody {
    pub content_type: String,
    pub data: Bytes,
}

fn tag_for(field_number: u32) -> u64 {
    (u64::from(field_number) << 3) | WIRE_TYPE_LEN
}

/// Extract the HttpBody at `field_path` inside a binary-encoded message.
///
/// An empty path means the message itself is the HttpBody. Recursion is
/// bounded by the path depth, which the descriptor registry fixed at
/// init time.
pub fn grpc_to_http_body(payload: &[u8], field_path: &[u32]) -> BridgeResult<HttpBody> {
    let mut body = HttpBody::default();
    parse_by_field_path(payload, field_path, &mut body)?;
    Ok(body)
}

fn parse_by_field_path(buf: &[u8], field_path: &[u32], body: &mut HttpBody) -> BridgeResult<()> {
    let Some((&first, rest)) = field_path.split_first() else {
        return merge_http_body(buf, body);
    };

    let expected = tag_for(first);
    let mut buf = buf;
    while !buf.is_empty() {
        let tag = read_varint(&mut buf)?;
        if tag == expected {
            let inner = read_len_delimited(&mut buf)?;
            parse_by_field_path(inner, rest, body)?;
        } else {
            skip_field(&mut buf, tag)?;
        }
    }
    Ok(())
}

/// Parse the leaf HttpBody message itself.
fn merge_http_body(buf: &[u8], body: &mut HttpBody) -> BridgeResult<()> {
    let mut buf = buf;
    while !buf.is_empty() {
        let tag = read_varint(&mut buf)?;
        let field_number = (tag >> 3) as u32;
        let wire_type = tag & 7;
        match (field_number, wire_type) {
            (CONTENT_TYPE_FIELD, WIRE_TYPE_LEN) => {
                let raw = read_len_delimited(&mut buf)?;
                body.content_type = String::from_utf8(raw.to_vec()).map_err(|e| {
                    BridgeError::Transcode(format!("HttpBody content_type is not UTF-8: {}", e))
                })?;
            }
            (DATA_FIELD, WIRE_TYPE_LEN) => {
                body.data = Bytes::copy_from_slice(read_len_delimited(&mut buf)?);
            }
            _ => skip_field(&mut buf, tag)?,
        }
    }
    Ok(())
}

/// Serialize an HttpBody back into the binary encoding of the message
/// that nests it at `field_path`.
///
/// The result is byte-identical to a generic serializer's output for the
/// same nested structure, without copying `data` through one.
pub fn http_body_to_grpc(body: &HttpBody, field_path: &[u32]) -> BridgeResult<Bytes> {
    let content_type = body.content_type.as_bytes();
    let data_len = body.data.len() as u64;

    let content_type_len = if content_type.is_empty() {
        0
    } else {
        encoded_len_varint(tag_for(CONTENT_TYPE_FIELD))
            + encoded_len_varint(content_type.len() as u64)
            + content_type.len()
    };
    let data_header_len =
        encoded_len_varint(tag_for(DATA_FIELD)) + encoded_len_varint(data_len);

    // Ancestor sizes, innermost first: each ancestor's length prefix
    // covers everything nested inside it.
    let mut message_size = (content_type_len + data_header_len) as u64 + data_len;
    let mut sizes = Vec::with_capacity(field_path.len());
    for field in field_path.iter().rev() {
        sizes.push(message_size);
        message_size +=
            (encoded_len_varint(tag_for(*field)) + encoded_len_varint(message_size)) as u64;
    }
    sizes.reverse();

    let mut out = BytesMut::with_capacity(message_size as usize);
    for (field, size) in field_path.iter().zip(&sizes) {
        encode_varint(tag_for(*field), &mut out);
        encode_varint(*size, &mut out);
    }
    if !content_type.is_empty() {
        encode_varint(tag_for(CONTENT_TYPE_FIELD), &mut out);
        encode_varint(content_type.len() as u64, &mut out);
        out.put_slice(content_type);
    }
    encode_varint(tag_for(DATA_FIELD), &mut out);
    encode_varint(data_len, &mut out);
    out.extend_from_slice(&body.data);

    Ok(out.freeze())
}

fn read_varint(buf: &mut &[u8]) -> BridgeResult<u64> {
    decode_varint(buf).map_err(|e| BridgeError::Transcode(format!("invalid varint: {}", e)))
}

fn read_len_delimited<'a>(buf: &mut &'a [u8]) -> BridgeResult<&'a [u8]> {
    let len = read_varint(buf)? as usize;
    if len > buf.len() {
        return Err(BridgeError::Transcode(format!(
            "length-delimited field of {} bytes overruns remaining {} bytes",
            len,
            buf.len()
        )));
    }
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Ok(head)
}

fn skip_field(buf: &mut &[u8], tag: u64) -> BridgeResult<()> {
    let advance = |buf: &mut &[u8], n: usize| -> BridgeResult<()> {
        if n > buf.len() {
            return Err(BridgeError::Transcode(
                "fixed-width field overruns buffer".to_string(),
            ));
        }
        *buf = &buf[n..];
        Ok(())
    };

    match tag & 7 {
        0 => {
            read_varint(buf)?;
            Ok(())
        }
        1 => advance(buf, 8),
        2 => {
            read_len_delimited(buf)?;
            Ok(())
        }
        5 => advance(buf, 4),
        other => Err(BridgeError::Transcode(format!(
            "unsupported wire type {} while skipping field",
            other
        ))),
    }
}
