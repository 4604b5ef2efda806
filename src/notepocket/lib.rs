//! # Notepocket Architecture
//!
//! Notepocket is the **local persistence layer** of a personal note manager. It works with
//! zero setup on an in-memory store and can be upgraded, on demand, to a single durable
//! file without losing anything that was written before.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (main.rs + args.rs)                                    │
//! │  - The only place that knows about stdout/stderr/exit codes │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Collaborators: migration.rs, bulk.rs                       │
//! │  - Replay foreign records through the adapter only          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Adapter (adapter.rs)                               │
//! │  - Owns exactly one backend, runs the upgrade state machine │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - DataStore trait, shared Tables                           │
//! │  - MemoryStore (volatile), FileStore (durable)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Principle: No I/O Assumptions in Core
//!
//! Below the CLI, code never writes to stdout/stderr and never exits the process. The
//! environment reaches the core only through injected seams: [`store::access::FileAccess`]
//! for the file-system capability and file choice, [`migration::LegacyStore`] for legacy
//! data. Diagnostics go through `tracing`.
//!
//! ## Typical Session
//!
//! ```no_run
//! use notepocket::adapter::StorageAdapter;
//! use notepocket::config::NotesConfig;
//! use notepocket::model::NewNote;
//! use notepocket::store::access::PathAccess;
//!
//! let adapter = StorageAdapter::new(NotesConfig::default());
//! adapter.initialize();
//! adapter.create_note(NewNote::text("Groceries", "eggs, milk")).unwrap();
//!
//! // Everything written so far moves into the file.
//! adapter.upgrade(&PathAccess::new("notes.json")).unwrap();
//! adapter.close().unwrap();
//! ```
//!
//! ## Module Overview
//!
//! - [`model`]: `Note`, `Folder` and their create/update inputs
//! - [`store`]: backends and the durable image format
//! - [`adapter`]: the façade and the upgrade state machine
//! - [`migration`]: one-shot import from the legacy key-value layout
//! - [`bulk`]: JSON export and tolerant import
//! - [`query`]: search, filters and sort orders
//! - [`config`]: `config.json` settings

pub mod adapter;
pub mod bulk;
pub mod config;
pub mod content;
pub mod demo;
pub mod error;
pub mod migration;
pub mod model;
pub mod query;
mod replay;
pub mod store;
pub mod tags;
