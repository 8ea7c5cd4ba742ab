//! Provider implementations.

pub mod bundle;
pub mod filesystem;
pub mod ipfs;
pub mod s3;
