//! Binary protobuf ⇄ JSON conversion through the descriptor pool.
//!
//! Printing policy is fixed: primitive-default fields are always emitted
//! and original proto field names are preserved (no camelCase). Parsing
//! rejects unknown fields strictly.

use bridge_core::{BridgeError, BridgeResult};
use prost::Message;
use prost_reflect::{DeserializeOptions, DynamicMessage, MessageDescriptor, SerializeOptions};

/// Convert a binary-encoded message of `descriptor`'s type to JSON text.
pub fn grpc_to_json(descriptor: &MessageDescriptor, payload: &[u8]) -> BridgeResult<String> {
    let message = DynamicMessage::decode(descriptor.clone(), payload).map_err(|e| {
        BridgeError::Transcode(format!(
            "failed to decode {}: {}",
            descriptor.full_name(),
            e
        ))
    })?;

    let options = SerializeOptions::new()
        .skip_default_fields(false)
        .use_proto_field_name(true);

    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::new(&mut buf);
    message
        .serialize_with_options(&mut serializer, &options)
        .map_err(|e| {
            BridgeError::Transcode(format!(
                "failed to print {} as JSON: {}",
                descriptor.full_name(),
                e
            ))
        })?;

    String::from_utf8(buf)
        .map_err(|e| BridgeError::Transcode(format!("JSON output is not UTF-8: {}", e)))
}

/// Parse JSON text into a binary-encoded message of `descriptor`'s type.
pub fn json_to_grpc(descriptor: &MessageDescriptor, json: &str) -> BridgeResult<Vec<u8>> {
    let mut deserializer = serde_json::Deserializer::from_str(json);
    let message = DynamicMessage::deserialize_with_options(
        descriptor.clone(),
        &mut deserializer,
        &DeserializeOptions::new(),
    )
    .map_err(|e| {
        BridgeError::Transcode(format!(
            "failed to parse JSON as {}: {}",
            descriptor.full_name(),
            e
        ))
    })?;
    deserializer
        .end()
        .map_err(|e| BridgeError::Transcode(format!("trailing JSON input: {}", e)))?;

    Ok(message.encode_to_vec())
}
