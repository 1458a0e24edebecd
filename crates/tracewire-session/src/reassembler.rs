use bytes::{BufMut, Bytes, BytesMut};
use prost::encoding::{encode_key, encode_varint, WireType};
use tracewire_frame::proto::Slice;

/// Field number of `Trace.packet`.
pub const TRACE_PACKET_FIELD: u32 = 1;

/// Rebuilds trace packets from `ReadBuffers` slices and writes them out as a
/// trace file.
///
/// The output is a serialized `Trace` message: one length-delimited
/// `packet` field (tag byte `0x0A`) per completed packet.
#[derive(Debug, Default)]
pub struct PacketReassembler {
    partial: Vec<Bytes>,
    trace: BytesMut,
    packets: usize,
}

impl PacketReassembler {
    /// Add one slice. Returns `true` if it completed a packet.
    pub fn push(&mut self, slice: Slice) -> bool {
        self.partial.push(slice.data);
        if !slice.last_slice_for_packet {
            return false;
        }

        let len: usize = self.partial.iter().map(Bytes::len).sum();
        encode_key(TRACE_PACKET_FIELD, WireType::LengthDelimited, &mut self.trace);
        encode_varint(len as u64, &mut self.trace);
        self.trace.reserve(len);
        for data in self.partial.drain(..) {
            self.trace.put_slice(&data);
        }
        self.packets += 1;
        true
    }

    /// Add slices in arrival order. Returns the number of packets completed.
    pub fn push_slices(&mut self, slices: impl IntoIterator<Item = Slice>) -> usize {
        let mut completed = 0;
        for slice in slices {
            if self.push(slice) {
                completed += 1;
            }
        }
        completed
    }

    /// Packets written so far.
    pub fn packets(&self) -> usize {
        self.packets
    }

    /// Slices waiting for their packet's last slice.
    pub fn pending_slices(&self) -> usize {
        self.partial.len()
    }

    /// Take the finished trace and start over.
    ///
    /// Slices of an unfinished packet are discarded.
    pub fn finish(&mut self) -> Bytes {
        self.partial.clear();
        self.packets = 0;
        self.trace.split().freeze()
    }
}
