//! Namespaced binary-object store for photos and school assets.

mod vault;

pub use vault::{Blob, BlobLease, BlobNamespace, BlobVault};
