//! Package feed protocol: manifest parsing, version indexes, archive
//! download, checksum verification, the shared on-disk cache, and
//! cross-process at-most-once installation.

pub mod cache;
pub mod checksum;
pub mod download;
pub mod index;
pub mod install;
pub mod manifest;
pub mod repository;
