//! Git ratchet: which files changed since a reference

pub mod dirty_files;
pub mod index_diff;
pub mod ratchet;
pub mod repository;

pub use index_diff::IndexDiff;
pub use ratchet::GitRatchet;
pub use repository::GitRepository;
