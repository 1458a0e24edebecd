//! Protobuf messages spoken on the consumer IPC socket.
//!
//! Field numbers match the daemon's `wire_protocol.proto` and
//! `consumer_port.proto`. Only the fields this client reads or writes are
//! declared; anything else on the wire is skipped by the decoder.

use bytes::Bytes;

/// One message on the wire, after the length header.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpcFrame {
    #[prost(uint64, tag = "2")]
    pub request_id: u64,
    #[prost(oneof = "FrameBody", tags = "3, 4, 5, 6")]
    pub body: ::core::option::Option<FrameBody>,
}

#[derive(Clone, PartialEq, ::prost::Oneof)]
pub enum FrameBody {
    #[prost(message, tag = "3")]
    BindService(BindService),
    #[prost(message, tag = "4")]
    BindServiceReply(BindServiceReply),
    #[prost(message, tag = "5")]
    InvokeMethod(InvokeMethod),
    #[prost(message, tag = "6")]
    InvokeMethodReply(InvokeMethodReply),
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BindService {
    #[prost(string, tag = "1")]
    pub service_name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BindServiceReply {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(uint32, tag = "2")]
    pub service_id: u32,
    #[prost(message, repeated, tag = "3")]
    pub methods: ::prost::alloc::vec::Vec<MethodInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MethodInfo {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InvokeMethod {
    #[prost(uint32, tag = "1")]
    pub service_id: u32,
    #[prost(uint32, tag = "2")]
    pub method_id: u32,
    #[prost(bytes = "bytes", tag = "3")]
    pub args_proto: Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InvokeMethodReply {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(bool, tag = "2")]
    pub has_more: bool,
    #[prost(bytes = "bytes", tag = "3")]
    pub reply_proto: Bytes,
}

impl IpcFrame {
    /// A `BindService` request.
    pub fn bind_service(request_id: u64, service_name: impl Into<String>) -> Self {
        Self {
            request_id,
            body: Some(FrameBody::BindService(BindService {
                service_name: service_name.into(),
            })),
        }
    }

    /// An `InvokeMethod` request carrying already-encoded arguments.
    pub fn invoke_method(
        request_id: u64,
        service_id: u32,
        method_id: u32,
        args_proto: impl Into<Bytes>,
    ) -> Self {
        Self {
            request_id,
            body: Some(FrameBody::InvokeMethod(InvokeMethod {
                service_id,
                method_id,
                args_proto: args_proto.into(),
            })),
        }
    }

    /// An `InvokeMethodReply` carrying an already-encoded reply.
    pub fn invoke_reply(
        request_id: u64,
        success: bool,
        has_more: bool,
        reply_proto: impl Into<Bytes>,
    ) -> Self {
        Self {
            request_id,
            body: Some(FrameBody::InvokeMethodReply(InvokeMethodReply {
                success,
                has_more,
                reply_proto: reply_proto.into(),
            })),
        }
    }

    /// Short name of the populated body, for logs and errors.
    pub fn body_name(&self) -> &'static str {
        match &self.body {
            Some(FrameBody::BindService(_)) => "bind_service",
            Some(FrameBody::BindServiceReply(_)) => "bind_service_reply",
            Some(FrameBody::InvokeMethod(_)) => "invoke_method",
            Some(FrameBody::InvokeMethodReply(_)) => "invoke_method_reply",
            None => "none",
        }
    }
}

// Consumer port arguments and replies.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EnableTracingRequest {
    #[prost(message, optional, tag = "1")]
    pub trace_config: ::core::option::Option<TraceConfig>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EnableTracingResponse {
    #[prost(bool, tag = "1")]
    pub disabled: bool,
    #[prost(string, optional, tag = "3")]
    pub error: ::core::option::Option<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DisableTracingRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DisableTracingResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FreeBuffersRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FreeBuffersResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadBuffersRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadBuffersResponse {
    #[prost(message, repeated, tag = "2")]
    pub slices: ::prost::alloc::vec::Vec<Slice>,
}

/// A fragment of one trace packet.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Slice {
    #[prost(bytes = "bytes", tag = "1")]
    pub data: Bytes,
    #[prost(bool, tag = "2")]
    pub last_slice_for_packet: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetTraceStatsRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetTraceStatsResponse {
    #[prost(message, optional, tag = "1")]
    pub trace_stats: ::core::option::Option<TraceStats>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TraceStats {
    #[prost(message, repeated, tag = "1")]
    pub buffer_stats: ::prost::alloc::vec::Vec<BufferStats>,
}

/// Occupancy of one daemon-side trace buffer. Either size may be absent.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BufferStats {
    #[prost(uint64, optional, tag = "1")]
    pub bytes_written: ::core::option::Option<u64>,
    #[prost(uint64, optional, tag = "12")]
    pub buffer_size: ::core::option::Option<u64>,
}

// Trace configuration, reduced to what a recording request needs.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TraceConfig {
    #[prost(message, repeated, tag = "1")]
    pub buffers: ::prost::alloc::vec::Vec<BufferConfig>,
    #[prost(message, repeated, tag = "2")]
    pub data_sources: ::prost::alloc::vec::Vec<DataSource>,
    #[prost(uint32, tag = "3")]
    pub duration_ms: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BufferConfig {
    #[prost(uint32, tag = "1")]
    pub size_kb: u32,
    #[prost(enumeration = "FillPolicy", tag = "4")]
    pub fill_policy: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FillPolicy {
    Unspecified = 0,
    RingBuffer = 1,
    Discard = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataSource {
    #[prost(message, optional, tag = "1")]
    pub config: ::core::option::Option<DataSourceConfig>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataSourceConfig {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(uint32, tag = "2")]
    pub target_buffer: u32,
}

impl TraceConfig {
    /// A single-buffer recording of the named data sources.
    pub fn single_buffer(size_kb: u32, duration_ms: u32, data_sources: &[String]) -> Self {
        Self {
            buffers: vec![BufferConfig {
                size_kb,
                fill_policy: FillPolicy::RingBuffer as i32,
            }],
            data_sources: data_sources
                .iter()
                .map(|name| DataSource {
                    config: Some(DataSourceConfig {
                        name: name.clone(),
                        target_buffer: 0,
                    }),
                })
                .collect(),
            duration_ms,
        }
    }
}
