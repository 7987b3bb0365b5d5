//! # Formats
//!
//! Byte formats the core hands to external collaborators. File I/O stays in
//! the app layer.

pub mod persistence;

pub use persistence::{
    GraphSnapshot, MAX_SNAPSHOT_PAYLOAD_SIZE, SnapshotHeader, graph_from_bytes, graph_to_bytes,
};
