//! Client library for the Filen end-to-end encrypted drive.
//!
//! Everything that leaves this process is encrypted client-side: file names
//! and metadata travel inside versioned AES-GCM envelopes, file content is
//! sealed per 1 MiB chunk, and the server only ever sees opaque UUIDs and
//! HMAC name indexes.
//!
//! The crate is organized leaves-first:
//!
//! - [`crypto`]: key derivation, the metadata envelope, bulk chunk AEAD,
//!   and the filename hash
//! - [`api`]: the JSON wire client with retry/backoff plus the raw chunk
//!   ingest/egest endpoints
//! - [`auth`]: login handshake (including 2FA), master-key decryption, and
//!   credential persistence
//! - [`drive`]: the path resolver and TTL-bounded listing caches over the
//!   opaque UUID tree
//! - [`transfer`]: the resumable chunked upload engine, the sequential
//!   download path, and a seekable decrypted reader
//! - [`batch`]: durable, resumable task lists for batch uploads/downloads
//! - [`state`]: the on-disk store under `~/.filen-cli`

pub mod api;
pub mod auth;
pub mod batch;
pub mod crypto;
pub mod drive;
pub mod state;
pub mod transfer;

pub use api::{ApiClient, ApiError, Endpoints, RetryPolicy};
pub use auth::{AuthError, Credentials};
pub use drive::{DriveClient, DriveError, Node};
pub use state::StateStore;
pub use transfer::{RemoteFileReader, ResumeState, TransferError, UploadOutcome};
