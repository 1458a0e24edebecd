use bytes::Bytes;
use prost::Message;
use tracewire_frame::proto::{
    DisableTracingResponse, EnableTracingResponse, FreeBuffersResponse, GetTraceStatsResponse,
    ReadBuffersResponse, TraceStats,
};

use crate::method::ConsumerMethod;

/// A decoded reply payload, one variant per consumer method.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerReply {
    EnableTracing(EnableTracingResponse),
    DisableTracing,
    FreeBuffers,
    ReadBuffers(ReadBuffersResponse),
    /// Stats from the reply, or empty stats if the remote sent none.
    GetTraceStats(TraceStats),
}

/// Decode `payload` as the reply message of `method`.
pub fn decode_reply(
    method: ConsumerMethod,
    payload: Bytes,
) -> Result<ConsumerReply, prost::DecodeError> {
    let reply = match method {
        ConsumerMethod::EnableTracing => {
            ConsumerReply::EnableTracing(EnableTracingResponse::decode(payload)?)
        }
        ConsumerMethod::DisableTracing => {
            DisableTracingResponse::decode(payload)?;
            ConsumerReply::DisableTracing
        }
        ConsumerMethod::FreeBuffers => {
            FreeBuffersResponse::decode(payload)?;
            ConsumerReply::FreeBuffers
        }
        ConsumerMethod::ReadBuffers => {
            ConsumerReply::ReadBuffers(ReadBuffersResponse::decode(payload)?)
        }
        ConsumerMethod::GetTraceStats => {
            let response = GetTraceStatsResponse::decode(payload)?;
            ConsumerReply::GetTraceStats(response.trace_stats.unwrap_or_default())
        }
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use tracewire_frame::proto::{BufferStats, Slice};

    use super::*;

    #[test]
    fn empty_payloads_decode_for_every_method() {
        for method in ConsumerMethod::ALL {
            assert!(decode_reply(method, Bytes::new()).is_ok(), "{method}");
        }
    }

    #[test]
    fn read_buffers_slices_survive() {
        let response = ReadBuffersResponse {
            slices: vec![Slice {
                data: Bytes::from_static(b"packet"),
                last_slice_for_packet: true,
            }],
        };
        let payload = Bytes::from(response.encode_to_vec());

        let reply = decode_reply(ConsumerMethod::ReadBuffers, payload).unwrap();
        assert_eq!(reply, ConsumerReply::ReadBuffers(response));
    }

    #[test]
    fn stats_reply_without_stats_is_empty() {
        let payload = Bytes::from(GetTraceStatsResponse { trace_stats: None }.encode_to_vec());
        let reply = decode_reply(ConsumerMethod::GetTraceStats, payload).unwrap();
        assert_eq!(reply, ConsumerReply::GetTraceStats(TraceStats::default()));
    }

    #[test]
    fn stats_reply_carries_buffers() {
        let stats = TraceStats {
            buffer_stats: vec![BufferStats {
                bytes_written: Some(5),
                buffer_size: Some(10),
            }],
        };
        let payload = Bytes::from(
            GetTraceStatsResponse {
                trace_stats: Some(stats.clone()),
            }
            .encode_to_vec(),
        );

        let reply = decode_reply(ConsumerMethod::GetTraceStats, payload).unwrap();
        assert_eq!(reply, ConsumerReply::GetTraceStats(stats));
    }

    #[test]
    fn garbage_payload_is_an_error() {
        let payload = Bytes::from_static(&[0x0A, 0xFF]);
        assert!(decode_reply(ConsumerMethod::ReadBuffers, payload).is_err());
    }
}
