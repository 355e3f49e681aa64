//! Wire protocol
//!
//! Every message on the wire is one frame:
//!
//! ```text
//! +----------------------+---------------------------+
//! | length: u32 (BE)     | payload: `length` bytes   |
//! +----------------------+---------------------------+
//! ```
//!
//! The payload is UTF-8 chat text. The relay treats it as opaque bytes and
//! forwards it verbatim.

pub mod codec;
pub mod constants;

pub use codec::{write_frame, FrameCodec, FrameReader};
