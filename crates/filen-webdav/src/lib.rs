//! WebDAV front-end for the Filen encrypted drive.
//!
//! Exposes the remote namespace as a mountable filesystem: a local HTTP
//! server speaks the WebDAV protocol (via `dav-server`) and translates each
//! request into drive operations. Users mount it with Finder (Cmd+K),
//! Explorer ("Map network drive"), or davfs2.
//!
//! Every byte served here was decrypted client-side on the way out of the
//! store, and every byte written is encrypted before it leaves the process;
//! the WebDAV layer itself never sees server-side ciphertext.
//!
//! # Request model
//!
//! The embedding library handles requests concurrently; each request works
//! through a cloned [`FilenDavFs`] handle, so in-flight readers and write
//! buffers are never shared between HTTP requests. The listing caches
//! underneath are thread-safe and shared deliberately.

mod error;
mod file;
mod filesystem;
mod metadata;
mod server;

pub use error::WebDavError;
pub use filesystem::FilenDavFs;
pub use server::{ServerConfig, WebDavServer};
