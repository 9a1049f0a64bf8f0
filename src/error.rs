use std::net::Ipv4Addr;

use thiserror::Error;

/// Failures surfaced by the spoofing engine.
///
/// An unknown target IP is not an error: `Controller::action` reports it
/// through [`crate::engine::ActionStatus`] so the HTTP layer can map it to a
/// 404 without unwinding anything.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The IP is not inside any attached interface's subnet. The engine only
    /// attacks on-link targets.
    #[error("no attached interface owns {0}")]
    NoInterface(Ipv4Addr),

    /// Raw-socket send or channel setup failed. Scan code treats this as
    /// "no response"; flows log it and keep ticking.
    #[error("link-layer I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
