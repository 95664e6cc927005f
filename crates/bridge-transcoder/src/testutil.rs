//! Test descriptor sets built programmatically, so tests never shell out
//! to protoc.

use prost::encoding::encode_varint;
use prost::Message;
use prost_types::{
    descriptor_proto::ExtensionRange,
    field_descriptor_proto::{Label, Type},
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    MethodDescriptorProto, ServiceDescriptorProto,
};

/// Field number of the `google.api.http` extension on
/// `google.protobuf.MethodOptions`.
const HTTP_RULE_FIELD: u32 = 72_295_728;

fn string_field(name: &str, number: i32) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(Type::String as i32),
        json_name: Some(name.to_string()),
        ..Default::default()
    }
}

fn bytes_field(name: &str, number: i32) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(Type::Bytes as i32),
        json_name: Some(name.to_string()),
        ..Default::default()
    }
}

fn message_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(Type::Message as i32),
        type_name: Some(type_name.to_string()),
        json_name: Some(name.to_string()),
        ..Default::default()
    }
}

fn unary_method(name: &str, input: &str, output: &str) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(input.to_string()),
        output_type: Some(output.to_string()),
        ..Default::default()
    }
}

/// A serialized `FileDescriptorSet` covering both transcoding modes:
///
/// - `pkg.Greeter/SayHello(HelloRequest) -> HelloReply` (JSON both ways)
/// - `pkg.Files/Download(HelloRequest) -> google.api.HttpBody`
/// - `pkg.Files/Upload(UploadRequest) -> HelloReply` with a nested
///   `payload.body` path to an HttpBody
pub(crate) fn test_descriptor_set() -> Vec<u8> {
    let httpbody_file = FileDescriptorProto {
        name: Some("google/api/httpbody.proto".to_string()),
        package: Some("google.api".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![DescriptorProto {
            name: Some("HttpBody".to_string()),
            field: vec![
                string_field("content_type", 1),
                bytes_field("data", 2),
            ],
            ..Default::default()
        }],
        ..Default::default()
    };

    let hello_file = FileDescriptorProto {
        name: Some("pkg/hello.proto".to_string()),
        package: Some("pkg".to_string()),
        syntax: Some("proto3".to_string()),
        dependency: vec!["google/api/httpbody.proto".to_string()],
        message_type: vec![
            DescriptorProto {
                name: Some("HelloRequest".to_string()),
                field: vec![string_field("name", 1)],
                ..Default::default()
            },
            DescriptorProto {
                name: Some("HelloReply".to_string()),
                field: vec![string_field("message", 1)],
                ..Default::default()
            },
            DescriptorProto {
                name: Some("Attachment".to_string()),
                field: vec![message_field("body", 1, ".google.api.HttpBody")],
                ..Default::default()
            },
            DescriptorProto {
                name: Some("UploadRequest".to_string()),
                field: vec![
                    string_field("label", 1),
                    message_field("payload", 3, ".pkg.Attachment"),
                ],
                ..Default::default()
            },
        ],
        service: vec![
            ServiceDescriptorProto {
                name: Some("Greeter".to_string()),
                method: vec![unary_method(
                    "SayHello",
                    ".pkg.HelloRequest",
                    ".pkg.HelloReply",
                )],
                ..Default::default()
            },
            ServiceDescriptorProto {
                name: Some("Files".to_string()),
                method: vec![
                    unary_method("Download", ".pkg.HelloRequest", ".google.api.HttpBody"),
                    unary_method("Upload", ".pkg.UploadRequest", ".pkg.HelloReply"),
                ],
                ..Default::default()
            },
        ],
        ..Default::default()
    };

    FileDescriptorSet {
        file: vec![httpbody_file, hello_file],
    }
    .encode_to_vec()
}

fn append_len_delimited(buf: &mut Vec<u8>, field_number: u32, bytes: &[u8]) {
    encode_varint((u64::from(field_number) << 3) | 2, buf);
    encode_varint(bytes.len() as u64, buf);
    buf.extend_from_slice(bytes);
}

fn append_str(buf: &mut Vec<u8>, field_number: u32, s: &str) {
    append_len_delimited(buf, field_number, s.as_bytes());
}

/// A serialized `FileDescriptorSet` whose `pkg.Greeter/SayHello` method
/// carries a `google.api.http` option:
///
/// ```text
/// option (google.api.http) = {
///     get: "/v1/hello/get"
///     post: "/v1/hello"
///     body: "*"
///     additional_bindings { delete: "/v1/hello/delete" }
/// };
/// ```
///
/// `prost_types::MethodOptions` cannot represent extension fields, so the
/// option value is hand-encoded and spliced into the surrounding
/// descriptors at the wire level (fields may appear in any order, so
/// appending after the generated encoding is valid).
pub(crate) fn test_descriptor_set_with_http_rules() -> Vec<u8> {
    // Just enough of descriptor.proto for the extendee to resolve.
    let descriptor_file = FileDescriptorProto {
        name: Some("google/protobuf/descriptor.proto".to_string()),
        package: Some("google.protobuf".to_string()),
        message_type: vec![DescriptorProto {
            name: Some("MethodOptions".to_string()),
            extension_range: vec![ExtensionRange {
                start: Some(1000),
                end: Some(536_870_912),
                ..Default::default()
            }],
            ..Default::default()
        }],
        ..Default::default()
    };

    // google.api.HttpRule plus the MethodOptions extension named
    // `google.api.http`.
    let annotations_file = FileDescriptorProto {
        name: Some("google/api/annotations.proto".to_string()),
        package: Some("google.api".to_string()),
        syntax: Some("proto3".to_string()),
        dependency: vec!["google/protobuf/descriptor.proto".to_string()],
        message_type: vec![DescriptorProto {
            name: Some("HttpRule".to_string()),
            field: vec![
                string_field("selector", 1),
                string_field("get", 2),
                string_field("put", 3),
                string_field("post", 4),
                string_field("delete", 5),
                string_field("body", 7),
                FieldDescriptorProto {
                    name: Some("additional_bindings".to_string()),
                    number: Some(11),
                    label: Some(Label::Repeated as i32),
                    r#type: Some(Type::Message as i32),
                    type_name: Some(".google.api.HttpRule".to_string()),
                    json_name: Some("additionalBindings".to_string()),
                    ..Default::default()
                },
                string_field("response_body", 12),
            ],
            ..Default::default()
        }],
        extension: vec![FieldDescriptorProto {
            name: Some("http".to_string()),
            number: Some(HTTP_RULE_FIELD as i32),
            label: Some(Label::Optional as i32),
            r#type: Some(Type::Message as i32),
            type_name: Some(".google.api.HttpRule".to_string()),
            extendee: Some(".google.protobuf.MethodOptions".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    };

    // The HttpRule value: verb templates in the primary binding plus one
    // additional binding. Field numbers follow http.proto.
    let mut rule = Vec::new();
    append_str(&mut rule, 2, "/v1/hello/get");
    append_str(&mut rule, 4, "/v1/hello");
    append_str(&mut rule, 7, "*");
    let mut binding = Vec::new();
    append_str(&mut binding, 5, "/v1/hello/delete");
    append_len_delimited(&mut rule, 11, &binding);

    let mut options = Vec::new();
    append_len_delimited(&mut options, HTTP_RULE_FIELD, &rule);

    // MethodDescriptorProto.options is field 4.
    let mut method = unary_method("SayHello", ".pkg.HelloRequest", ".pkg.HelloReply")
        .encode_to_vec();
    append_len_delimited(&mut method, 4, &options);

    // ServiceDescriptorProto.method is field 2.
    let mut service = ServiceDescriptorProto {
        name: Some("Greeter".to_string()),
        ..Default::default()
    }
    .encode_to_vec();
    append_len_delimited(&mut service, 2, &method);

    // FileDescriptorProto.service is field 6.
    let mut hello_file = FileDescriptorProto {
        name: Some("pkg/hello.proto".to_string()),
        package: Some("pkg".to_string()),
        syntax: Some("proto3".to_string()),
        dependency: vec!["google/api/annotations.proto".to_string()],
        message_type: vec![
            DescriptorProto {
                name: Some("HelloRequest".to_string()),
                field: vec![string_field("name", 1)],
                ..Default::default()
            },
            DescriptorProto {
                name: Some("HelloReply".to_string()),
                field: vec![string_field("message", 1)],
                ..Default::default()
            },
        ],
        ..Default::default()
    }
    .encode_to_vec();
    append_len_delimited(&mut hello_file, 6, &service);

    // FileDescriptorSet.file is field 1.
    let mut set = Vec::new();
    append_len_delimited(&mut set, 1, &descriptor_file.encode_to_vec());
    append_len_delimited(&mut set, 1, &annotations_file.encode_to_vec());
    append_len_delimited(&mut set, 1, &hello_file);
    set
}
