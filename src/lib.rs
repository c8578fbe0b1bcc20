//! # campus-store
//!
//! Local persistence and consistency layer for a school administration
//! application: a synchronous, string-keyed record store of JSON
//! documents, a change bus that tells every subscriber when a keyed
//! collection changed, a namespaced binary blob vault for photos and
//! assets, and the recycle-bin lifecycle that keeps financial and
//! referential invariants intact as records move between active,
//! deleted, and purged states.
//!
//! ## Example
//!
//! ```ignore
//! use campus_store::{SchoolStore, StoreConfig, Student};
//!
//! let store = SchoolStore::open(StoreConfig::at("./school-data"))?;
//!
//! let mut student = Student::new("STU-001", "Asha Verma");
//! student.class = "5A".into();
//! student.total_fees = 10000.0;
//! store.add_student(student)?;
//!
//! let receipt = store.add_payment("STU-001", 4000.0, "2026-04-01")?;
//! store.delete_payment("STU-001", &receipt.receipt_number)?;
//! store.restore_payment("STU-001", &receipt.receipt_number)?;
//! ```

pub mod blobs;
pub mod bus;
pub mod error;
pub mod lifecycle;
pub mod records;
pub mod store;
pub mod types;
pub mod views;

// Re-exports
pub use blobs::{Blob, BlobLease, BlobNamespace, BlobVault};
pub use bus::{ChangeBus, ChangeEvent, ChangeHandle, ChangeOrigin, SubscriberId};
pub use error::{Result, StoreError};
pub use records::{FileBackend, MemoryBackend, RecordStore, StorageBackend};
pub use store::{SchoolStore, StoreConfig};
pub use types::*;
pub use views::{FeeTotals, RecycleBinSummary};
