//! nvlabel - NVDIMM namespace label storage
//!
//! Reads, validates and rewrites the label storage area of a persistent
//! memory module: two redundant index blocks and an array of namespace
//! label slots, moved to and from the device in bounded round trips.
//!
//! Layering, leaves first:
//! - `label`: on-media formats, checksums, geometry, sequence numbers
//! - `device`: the config-area command transport and DIMM control seams
//! - `xfer`: chunked read and read-modify-write sessions
//! - `store`: current-index selection and the destructive mutations
//! - `cli`: the `nvlabel` command line

pub mod cli;
pub mod config;
pub mod crash_point;
pub mod device;
pub mod label;
pub mod observability;
pub mod store;
pub mod xfer;
