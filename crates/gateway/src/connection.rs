//! Connection manager: an arena of per-service connection slots.
//!
//! One slot per registered service, fixed at build time, each guarded by its
//! own async lock so unrelated services never serialize against each other.
//! Connections are established lazily, reused while ready, and re-dialed
//! after a failure; a failed channel is never handed out again.
//!
//! Sharing discipline: one multiplexed channel per service. The native MCP
//! transport correlates concurrent requests by id, so the slot lock guards
//! state transitions only, never request traffic.

use crate::adapter::{BackendChannel, InlineBackend};
use crate::error::{GatewayError, Result};
use crate::registry::RegisteredService;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Ready,
    Failed,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Idle => "idle",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Ready => "ready",
            ConnectionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live channel to one backend service.
pub struct Connection {
    pub service: String,
    pub channel: BackendChannel,
}

impl Connection {
    pub fn mcp(&self) -> Result<&crate::adapter::mcp::McpChannel> {
        match &self.channel {
            BackendChannel::Mcp(chan) => Ok(chan),
            _ => Err(GatewayError::protocol(
                &self.service,
                "connection does not carry an MCP channel",
            )),
        }
    }

    pub fn rest(&self) -> Result<&crate::adapter::rest::RestChannel> {
        match &self.channel {
            BackendChannel::Rest(chan) => Ok(chan),
            _ => Err(GatewayError::protocol(
                &self.service,
                "connection does not carry a REST channel",
            )),
        }
    }

    pub fn inline(&self) -> Result<&Arc<dyn InlineBackend>> {
        match &self.channel {
            BackendChannel::Inline(backend) => Ok(backend),
            _ => Err(GatewayError::protocol(
                &self.service,
                "connection does not carry an inline backend",
            )),
        }
    }
}

enum SlotState {
    Idle,
    Ready(Arc<Connection>),
    Failed { reason: String },
}

struct Slot {
    state: Mutex<SlotState>,
    // Snapshot of the slot state, readable without the async lock; written
    // only while the state lock is held.
    status: RwLock<ConnectionStatus>,
    attempts: AtomicU64,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Idle),
            status: RwLock::new(ConnectionStatus::Idle),
            attempts: AtomicU64::new(0),
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        *self.status.write().expect("status lock poisoned") = status;
    }
}

pub struct ConnectionManager {
    slots: HashMap<String, Slot>,
}

impl ConnectionManager {
    /// Builds one (empty) slot per registered service.
    pub fn new(services: impl IntoIterator<Item = String>) -> Self {
        Self {
            slots: services.into_iter().map(|name| (name, Slot::new())).collect(),
        }
    }

    /// Returns the live connection for `service`, dialing it if the slot is
    /// idle or failed. Concurrent acquires of the same service wait on the
    /// slot lock and then reuse the single established channel.
    pub async fn acquire(&self, service: &RegisteredService) -> Result<Arc<Connection>> {
        let slot = self.slot(service.name())?;
        let mut state = slot.state.lock().await;

        if let SlotState::Ready(conn) = &*state {
            return Ok(conn.clone());
        }

        // Idle or failed: dial fresh. A failed channel is never reused.
        slot.set_status(ConnectionStatus::Connecting);
        slot.attempts.fetch_add(1, Ordering::Relaxed);
        log::debug!("connecting to service '{}'", service.name());

        match service.adapter.connect(&service.descriptor).await {
            Ok(channel) => {
                let conn = Arc::new(Connection {
                    service: service.name().to_string(),
                    channel,
                });
                *state = SlotState::Ready(conn.clone());
                slot.set_status(ConnectionStatus::Ready);
                log::info!("service '{}' connected", service.name());
                Ok(conn)
            }
            Err(err) => {
                *state = SlotState::Failed {
                    reason: err.to_string(),
                };
                slot.set_status(ConnectionStatus::Failed);
                log::warn!("service '{}' failed to connect: {err}", service.name());
                Err(err)
            }
        }
    }

    /// Marks `conn` failed after a transport error during use. No-op if the
    /// slot has already moved on to a newer connection.
    pub async fn mark_failed(&self, conn: &Arc<Connection>, reason: &str) {
        let Some(slot) = self.slots.get(&conn.service) else {
            return;
        };
        let mut state = slot.state.lock().await;
        if let SlotState::Ready(current) = &*state {
            if Arc::ptr_eq(current, conn) {
                *state = SlotState::Failed {
                    reason: reason.to_string(),
                };
                slot.set_status(ConnectionStatus::Failed);
                log::warn!("service '{}' marked failed: {reason}", conn.service);
            }
        }
    }

    /// Current status of one service's slot.
    pub fn status(&self, service: &str) -> ConnectionStatus {
        self.slots
            .get(service)
            .map(|slot| *slot.status.read().expect("status lock poisoned"))
            .unwrap_or(ConnectionStatus::Idle)
    }

    /// Number of connection attempts made for `service` so far.
    pub fn attempts(&self, service: &str) -> u64 {
        self.slots
            .get(service)
            .map(|slot| slot.attempts.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Drops every established channel. In-flight requests keep their own
    /// `Arc<Connection>` and finish; the next acquire dials fresh.
    pub async fn shutdown(&self) {
        for (name, slot) in &self.slots {
            let mut state = slot.state.lock().await;
            if matches!(*state, SlotState::Ready(_)) {
                log::debug!("closing connection to service '{name}'");
            }
            *state = SlotState::Idle;
            slot.set_status(ConnectionStatus::Idle);
        }
    }

    fn slot(&self, service: &str) -> Result<&Slot> {
        // Slots are built from the registry, so a miss means the caller
        // skipped the registry lookup.
        self.slots.get(service).ok_or_else(|| {
            GatewayError::UnknownService {
                service: service.to_string(),
                known: self.slots.keys().cloned().collect(),
            }
        })
    }
}
