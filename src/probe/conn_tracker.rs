//! Connection identity tracking.
//!
//! The HTTP client does not number its connections, so they are numbered
//! here from the socket pair each response arrived on.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub local_addr: SocketAddr,
    pub remote_addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct TrackedConnection {
    pub id: u64,
    pub first_seen: Instant,
    pub last_seen: Instant,
    pub response_count: u64,
}

/// Result of resolving a socket pair to a connection id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSighting {
    pub id: u64,
    pub reused: bool,
}

/// Assigns sequential ids to connections.
///
/// A socket pair idle for longer than `idle_window` cannot still be the same
/// pooled connection, so it is given a new id.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionKey, TrackedConnection>,
    idle_window: Duration,
    next_id: u64,
}

impl ConnectionRegistry {
    pub fn new(idle_window: Duration) -> Self {
        Self {
            connections: HashMap::new(),
            idle_window,
            next_id: 0,
        }
    }

    /// Resolve the connection a response was received on.
    pub fn observe(&mut self, local_addr: SocketAddr, remote_addr: SocketAddr) -> ConnectionSighting {
        self.observe_at(local_addr, remote_addr, Instant::now())
    }

    fn observe_at(
        &mut self,
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
        now: Instant,
    ) -> ConnectionSighting {
        let key = ConnectionKey {
            local_addr,
            remote_addr,
        };

        if let Some(conn) = self.connections.get_mut(&key) {
            if now.saturating_duration_since(conn.last_seen) <= self.idle_window {
                conn.last_seen = now;
                conn.response_count += 1;
                return ConnectionSighting {
                    id: conn.id,
                    reused: true,
                };
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.connections.insert(
            key,
            TrackedConnection {
                id,
                first_seen: now,
                last_seen: now,
                response_count: 1,
            },
        );

        ConnectionSighting { id, reused: false }
    }

    pub fn connections(&self) -> impl Iterator<Item = (&ConnectionKey, &TrackedConnection)> {
        self.connections.iter()
    }

    /// Number of distinct connections seen so far.
    pub fn opened(&self) -> u64 {
        self.next_id
    }
}
