//! Network-facing API used by protocol stacks.

use crate::sim::Simulator;

use super::{NodeId, Packet};

/// Minimal network API for protocol stacks.
pub trait NetApi {
    /// Allocate a fresh packet uid.
    fn next_packet_uid(&mut self) -> u64;
    /// Hand a locally generated packet to the IP layer of `from`.
    fn originate(&mut self, from: NodeId, pkt: Packet, sim: &mut Simulator);
}

impl NetApi for super::Network {
    fn next_packet_uid(&mut self) -> u64 {
        super::Network::next_packet_uid(self)
    }

    fn originate(&mut self, from: NodeId, pkt: Packet, sim: &mut Simulator) {
        super::Network::originate(self, from, pkt, sim)
    }
}
