//! Abort sequence
//!
//! Best-effort safety shutdown after a fatal failure. Each command of the
//! block is attempted exactly once; no acknowledgment is awaited because
//! the link is presumed broken.

use crate::communication::Transport;
use crate::firmware::marlin::SAFETY_SHUTDOWN;

/// Send the safety block, returning how many commands were written
pub fn send_safety_shutdown<T: Transport + ?Sized>(transport: &mut T) -> usize {
    tracing::warn!("Sending safety shutdown to {}", transport.name());

    let mut delivered = 0;
    for command in SAFETY_SHUTDOWN {
        match transport.send_line(command) {
            Ok(()) => delivered += 1,
            Err(e) => tracing::error!("Safety command '{}' not delivered: {}", command, e),
        }
    }

    if delivered < SAFETY_SHUTDOWN.len() {
        tracing::error!(
            "Safety shutdown incomplete: {}/{} commands delivered",
            delivered,
            SAFETY_SHUTDOWN.len()
        );
    }
    delivered
}
