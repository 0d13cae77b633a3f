//! Buffer abstractions for wire encoding/decoding
//!
//! This module provides bounds-checked buffer types for reading and writing
//! the big-endian primitives used by frame bodies.

mod read;
mod write;

pub use read::ReadBuffer;
pub use write::WriteBuffer;
