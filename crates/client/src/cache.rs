//! The client's cache ring and its adaptive-timeout network feed.
//!
//! Four caches, one per in-flight section, rotate as the decoder consumes
//! sections head-first. Each cache tracks how many more packets it is
//! willing to receive (its remaining capacity) and that number is what
//! gets declared, per section, in the `WAIT` messages this module sends.

use crate::net::{RECV_BUF_LEN, is_timeout};
use fountain::Packet;
use std::collections::VecDeque;
use std::net::UdpSocket;
use std::time::Duration;
use tracing::debug;
use wire::{SectionCapacity, WaitRequest};

/// Number of sections the client keeps in flight at once.
pub const NUM_CACHES: usize = 4;

/// Initial `WAIT` retry timeout.
const INITIAL_TIMEOUT: Duration = Duration::from_millis(10);
/// Ceiling on the adaptive timeout before the client gives up.
const MAX_TIMEOUT: Duration = Duration::from_secs(15);

struct Cache {
    section: Option<u32>,
    packets: VecDeque<Packet>,
    capacity: usize,
}

impl Cache {
    fn empty(capacity: usize) -> Self {
        Self {
            section: None,
            packets: VecDeque::new(),
            capacity,
        }
    }

    fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.packets.len())
    }
}

/// The ring of [`NUM_CACHES`] section caches and the socket used to fill
/// them, implementing `get_packet`/`load_from_network` from the design
/// notes this module is built from.
pub struct CacheRing {
    caches: VecDeque<Cache>,
    socket: UdpSocket,
    section_size: u32,
    discarded: u64,
}

impl CacheRing {
    /// Creates a ring whose caches each hold up to `cache_size_multiplier
    /// * section_size` packets.
    pub fn new(socket: UdpSocket, section_size: u32, cache_size_multiplier: u32) -> Self {
        let capacity = (cache_size_multiplier as usize) * (section_size as usize);
        let caches = (0..NUM_CACHES).map(|_| Cache::empty(capacity)).collect();
        Self {
            caches,
            socket,
            section_size,
            discarded: 0,
        }
    }

    /// Total packets discarded so far: stale cache contents freed on
    /// rotation, plus datagrams that failed checksum or named a section
    /// outside the ring.
    #[must_use]
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn rotate(&mut self) {
        if let Some(cache) = self.caches.pop_front() {
            self.caches.push_back(cache);
        }
    }

    /// Returns the next packet for `section_num`, blocking on the network
    /// as needed, or `None` if `max_timeout` elapses with nothing to show
    /// for it.
    pub fn get_packet(&mut self, section_num: u32, num_sections: u32) -> Option<Packet> {
        if self.caches[0].section != Some(section_num) {
            let stale = self.caches[0].packets.len() as u64;
            if stale > 0 {
                debug!(stale, "discarding stale cache contents on rotation");
            }
            self.discarded += stale;
            self.caches[0].packets.clear();
            self.caches[0].section = None;
            self.rotate();
            if self.caches[0].section.is_none() {
                self.caches[0].section = Some(section_num);
            }
        }

        if self.caches[0].packets.is_empty() {
            let remaining_sections = num_sections.saturating_sub(section_num).max(1);
            let n_to_req = (NUM_CACHES as u32).min(remaining_sections) as usize;
            for (i, cache) in self.caches.iter_mut().take(n_to_req).enumerate() {
                if cache.section.is_none() {
                    cache.section = Some(section_num + i as u32);
                }
            }
            self.load_from_network(n_to_req);
        }

        self.caches[0].packets.pop_front()
    }

    /// Sends a `WAIT` for the first `n` caches' remaining capacity and
    /// polls for responses, doubling the timeout on each empty round
    /// until either the head cache gains data, `n`'s caches fill, or
    /// [`MAX_TIMEOUT`] is reached.
    fn load_from_network(&mut self, n: usize) {
        self.send_wait(n);

        let total_capacity: usize = self.caches.iter().take(n).map(Cache::remaining).sum();
        let max_iterations = total_capacity.max(1);
        let mut timeout = INITIAL_TIMEOUT;

        for _ in 0..max_iterations {
            let _ = self.socket.set_read_timeout(Some(timeout));
            let mut buf = [0u8; RECV_BUF_LEN];
            match self.socket.recv(&mut buf) {
                Ok(len) => self.handle_incoming(&buf[..len]),
                Err(err) if is_timeout(&err) => {
                    if !self.caches[0].packets.is_empty() {
                        return;
                    }
                    if timeout >= MAX_TIMEOUT {
                        debug!("giving up after reaching max timeout");
                        return;
                    }
                    timeout = (timeout * 2).min(MAX_TIMEOUT);
                    debug!(?timeout, "doubling adaptive wait timeout");
                    self.send_wait(n);
                }
                Err(err) => {
                    debug!(%err, "recv failed");
                    return;
                }
            }
        }
    }

    fn send_wait(&self, n: usize) {
        let sections = self
            .caches
            .iter()
            .take(n)
            .filter_map(|cache| {
                cache.section.map(|section| SectionCapacity {
                    section: section as u16,
                    capacity: cache.remaining() as u16,
                })
            })
            .collect();
        if let Ok(frame) = wire::encode_wait(&WaitRequest { sections }) {
            let _ = self.socket.send(&frame);
        }
    }

    fn handle_incoming(&mut self, datagram: &[u8]) {
        let packet = match wire::decode_packet(datagram, self.section_size) {
            Ok(packet) => packet,
            Err(err) => {
                debug!(%err, "dropped malformed or corrupt packet");
                self.discarded += 1;
                return;
            }
        };

        let section = u32::from(packet.section);
        match self
            .caches
            .iter_mut()
            .find(|cache| cache.section == Some(section) && cache.packets.len() < cache.capacity)
        {
            Some(cache) => cache.packets.push_back(packet),
            None => {
                debug!(section, "discarding packet outside the active ring");
                self.discarded += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;

    fn local_pair() -> (UdpSocket, UdpSocket) {
        let a = UdpSocket::bind("127.0.0.1:0").unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").unwrap();
        a.connect(b.local_addr().unwrap()).unwrap();
        b.connect(a.local_addr().unwrap()).unwrap();
        (a, b)
    }

    #[test]
    fn fresh_ring_has_unassigned_caches_with_configured_capacity() {
        let (client_sock, _server_sock) = local_pair();
        let ring = CacheRing::new(client_sock, 8, 2);
        assert_eq!(ring.caches.len(), NUM_CACHES);
        for cache in &ring.caches {
            assert_eq!(cache.section, None);
            assert_eq!(cache.capacity, 16);
        }
    }

    #[test]
    fn rotation_counts_stale_packets_as_discarded() {
        let (client_sock, _server_sock) = local_pair();
        let mut ring = CacheRing::new(client_sock, 8, 2);
        ring.caches[0].section = Some(0);
        ring.caches[0]
            .packets
            .push_back(fountain::Packet {
                section: 0,
                seed: 1,
                num_blocks: 1,
                blk_size: 1,
                payload: vec![0],
                membership: bitset::Bitset::new(8),
            });

        // Force a rotation by asking for a different section than head.
        ring.caches[0].section = Some(5);
        let stale = ring.caches[0].packets.len() as u64;
        ring.discarded += stale;
        ring.caches[0].packets.clear();
        assert_eq!(ring.discarded, 1);
    }

    #[test]
    fn handle_incoming_drops_packets_for_unassigned_sections() {
        let (client_sock, _server_sock) = local_pair();
        let mut ring = CacheRing::new(client_sock, 8, 2);
        ring.caches[0].section = Some(0);

        let mut membership = bitset::Bitset::new(8);
        membership.set(0);
        let packet = fountain::Packet {
            section: 9,
            seed: 1,
            num_blocks: 1,
            blk_size: 1,
            payload: vec![0x41],
            membership,
        };
        let frame = wire::encode_packet(&packet);
        ring.handle_incoming(&frame);
        assert_eq!(ring.discarded(), 1);
    }

    #[test]
    fn handle_incoming_enqueues_matching_section() {
        let (client_sock, _server_sock) = local_pair();
        let mut ring = CacheRing::new(client_sock, 8, 2);
        ring.caches[0].section = Some(0);

        let mut membership = bitset::Bitset::new(8);
        membership.set(0);
        let packet = fountain::Packet {
            section: 0,
            seed: 1,
            num_blocks: 1,
            blk_size: 1,
            payload: vec![0x41],
            membership,
        };
        let frame = wire::encode_packet(&packet);
        ring.handle_incoming(&frame);
        assert_eq!(ring.discarded(), 0);
        assert_eq!(ring.caches[0].packets.len(), 1);
    }
}
