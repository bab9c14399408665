// src/lib.rs

//! addond - versioned add-on storage and delivery server
//!
//! A network server hosting a catalogue of user-contributed content
//! packages for a game client. It accepts uploads over a framed
//! document protocol, stores every version of every add-on with hash
//! indices and update packs, and serves content back either as full
//! packs or as chained incremental deltas.
//!
//! # Architecture
//!
//! - Document trees: one schemaless attribute/child tree type is the
//!   wire format, the config format, and the pack format
//! - Catalogue: in-memory index of typed records, flushed to
//!   per-add-on metadata files through atomic commits
//! - Delta engine: update packs between consecutive versions are
//!   uploaded or synthesized, expired after a configurable lifespan
//! - Single-threaded: one cooperative event loop, no locks

pub mod auth;
pub mod blacklist;
pub mod catalogue;
pub mod delta;
pub mod doc;
mod error;
pub mod feedback;
pub mod fscommit;
pub mod pack;
pub mod server;
pub mod validate;
pub mod version;

pub use catalogue::record::{AddonRecord, Translation, UpdatePackEntry, VersionEntry};
pub use catalogue::{Catalogue, ListFilter};
pub use doc::{Node, Value};
pub use error::{Error, Result};
pub use fscommit::AtomicFile;
pub use server::handlers::{dispatch, Request, Response};
pub use server::{Server, ServerConfig};
pub use validate::CheckStatus;
pub use version::VersionKey;
