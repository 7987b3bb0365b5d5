//! # isagraph
//!
//! The file-system side of isagraph: manifest loading, the tab-separated
//! tokenizer and the CLI commands. The transform itself lives in
//! `isagraph-core`.

pub mod cli;
pub mod manifest;
pub mod tabfile;
