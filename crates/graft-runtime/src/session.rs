use graft_core::{EntityId, Packet, PacketSink};

/// A packet delivered to an observer.
#[derive(Debug, Clone, PartialEq)]
pub struct SentPacket {
    /// Tick the packet was sent on.
    pub tick: u64,
    /// Receiving observer.
    pub observer: EntityId,
    /// The packet.
    pub packet: Packet,
}

/// In-memory session layer that records every outbound packet.
#[derive(Debug, Default)]
pub struct PacketLog {
    sent: Vec<SentPacket>,
    tick: u64,
}

impl PacketLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp subsequent packets with `tick`.
    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// All sent packets, oldest first.
    pub fn sent(&self) -> &[SentPacket] {
        &self.sent
    }

    /// Packets sent to `observer`, oldest first.
    pub fn sent_to(&self, observer: EntityId) -> Vec<&SentPacket> {
        self.sent.iter().filter(|p| p.observer == observer).collect()
    }

    /// Packets sent on `tick`.
    pub fn sent_at_tick(&self, tick: u64) -> Vec<&SentPacket> {
        self.sent.iter().filter(|p| p.tick == tick).collect()
    }

    /// Number of sent packets.
    pub fn len(&self) -> usize {
        self.sent.len()
    }

    /// Whether nothing has been sent.
    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }

    /// Forget every recorded packet.
    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl PacketSink for PacketLog {
    fn send_packet(&mut self, observer: EntityId, packet: Packet) {
        self.sent.push(SentPacket {
            tick: self.tick,
            observer,
            packet,
        });
    }
}
