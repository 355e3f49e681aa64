//! Protocol constants

/// Size of the length prefix in bytes
pub const FRAME_HEADER_LEN: usize = 4;

/// Default upper bound for a single frame payload (64 KiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Default port the relay listens on
pub const DEFAULT_PORT: u16 = 12345;

/// Default per-connection outbound queue capacity, in frames
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;
