/// Whether a packet entered the link or was delivered out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// `+` in the link log
    Sent,
    /// `-` in the link log
    Acked,
}

/// One record of a link emulator log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEvent {
    /// Milliseconds since the emulator started
    pub timestamp_ms: u64,
    pub kind: EventKind,
    /// Packet size in bytes, as logged
    pub size: u64,
}
