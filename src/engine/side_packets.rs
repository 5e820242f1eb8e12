// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::OnceLock;

use crate::errors::NodeError;
use crate::packet::Packet;

/// Write-once storage for one side packet during one run.
///
/// A slot resolves exactly once: to a packet when its producer (node or host)
/// sets it, or to `None` when the producer finishes without setting it.
/// Readers never lock after resolution.
#[derive(Debug)]
pub(crate) struct SidePacketSlot {
    pub name: String,
    value: OnceLock<Option<Packet>>,
}

impl SidePacketSlot {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: OnceLock::new(),
        }
    }

    pub fn set(&self, packet: Packet) -> Result<(), NodeError> {
        self.value
            .set(Some(packet))
            .map_err(|_| NodeError::SidePacketAlreadySet {
                name: self.name.clone(),
            })
    }

    /// Resolves the slot as absent. Returns false if it was already resolved.
    pub fn mark_absent(&self) -> bool {
        self.value.set(None).is_ok()
    }

    pub fn is_resolved(&self) -> bool {
        self.value.get().is_some()
    }

    pub fn get(&self) -> Option<&Packet> {
        self.value.get().and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_once() {
        let slot = SidePacketSlot::new("model");
        assert!(!slot.is_resolved());

        slot.set(Packet::new("v1")).unwrap();
        assert!(slot.is_resolved());
        assert!(matches!(
            slot.set(Packet::new("v2")),
            Err(NodeError::SidePacketAlreadySet { .. })
        ));
        assert_eq!(slot.get().unwrap().get::<String>().unwrap(), "v1");
        assert!(!slot.mark_absent());
    }

    #[test]
    fn test_absent_resolution() {
        let slot = SidePacketSlot::new("hint");
        assert!(slot.mark_absent());
        assert!(slot.is_resolved());
        assert!(slot.get().is_none());
        assert!(slot.set(Packet::new(1i64)).is_err());
    }
}
