//! Plain-text channel files and stream persistence.

pub mod text;

pub use text::{parse_channel_text, parse_rr_list, persist, persist_vectors, read_channel_file, read_rr_list};
