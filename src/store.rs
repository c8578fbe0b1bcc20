//! Main SchoolStore struct tying all components together.

use crate::blobs::BlobVault;
use crate::bus::{ChangeBus, ChangeHandle};
use crate::error::Result;
use crate::records::{FileBackend, MemoryBackend, RecordStore, StorageBackend};
use crate::types::{
    FeeStructure, InquiryRecord, Notification, SchoolClass, SchoolProfile, StoreKey, Student,
    UserProfile,
};
use crate::views::{self, FeeTotals, RecycleBinSummary};
use std::path::PathBuf;
use std::sync::Arc;

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Base path for the store. None = in-memory (tests, previews).
    pub path: Option<PathBuf>,

    /// Blob cache size (number of blobs).
    pub blob_cache_size: usize,
}

impl StoreConfig {
    /// In-memory records; blobs go to a throwaway temp directory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            blob_cache_size: 100,
        }
    }

    /// On-disk store rooted at `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            blob_cache_size: 1000,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// The application's persistence handle.
///
/// Owns the record store, the blob vault, and the change bus; UI
/// collaborators read and write exclusively through this handle, which
/// makes the whole layer testable with the in-memory backend.
pub struct SchoolStore {
    records: RecordStore,
    vault: BlobVault,
    /// In-memory mode's blob scratch directory; removed when the
    /// store is dropped.
    _scratch: Option<tempfile::TempDir>,
}

impl SchoolStore {
    /// Open a store per the configuration.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let bus = Arc::new(ChangeBus::new());

        let (backend, vault, scratch): (Arc<dyn StorageBackend>, BlobVault, _) =
            match &config.path {
                Some(path) => {
                    let backend = Arc::new(FileBackend::open(path.join("records"))?);
                    let vault = BlobVault::open(path.join("blobs"), config.blob_cache_size);
                    (backend, vault, None)
                }
                None => {
                    let backend = Arc::new(MemoryBackend::new());
                    let scratch = tempfile::tempdir()?;
                    let vault =
                        BlobVault::open(scratch.path().join("blobs"), config.blob_cache_size);
                    (backend, vault, Some(scratch))
                }
            };

        Ok(Self {
            records: RecordStore::new(backend, bus),
            vault,
            _scratch: scratch,
        })
    }

    /// The underlying record store.
    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// The blob vault.
    pub fn vault(&self) -> &BlobVault {
        &self.vault
    }

    /// The change bus.
    pub fn bus(&self) -> &Arc<ChangeBus> {
        self.records.bus()
    }

    /// Subscribe to changes of a single collection.
    pub fn subscribe(&self, key: StoreKey) -> ChangeHandle {
        self.bus().subscribe(Some(vec![key.as_str().to_string()]))
    }

    // --- Typed Collection Accessors ---

    pub fn students(&self) -> Vec<Student> {
        self.records.get_or_init(StoreKey::Students.as_str(), Vec::new)
    }

    pub fn classes(&self) -> Vec<SchoolClass> {
        self.records.get_or_init(StoreKey::Classes.as_str(), Vec::new)
    }

    pub fn employees(&self) -> Vec<UserProfile> {
        self.records.get_or_init(StoreKey::Employees.as_str(), Vec::new)
    }

    pub fn inquiries(&self) -> Vec<InquiryRecord> {
        self.records.get_or_init(StoreKey::Inquiries.as_str(), Vec::new)
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.records
            .get_or_init(StoreKey::Notifications.as_str(), Vec::new)
    }

    pub fn sessions(&self) -> Vec<String> {
        self.records.get_or_init(StoreKey::Sessions.as_str(), Vec::new)
    }

    pub fn fee_types(&self) -> Vec<String> {
        self.records.get_or_init(StoreKey::FeeTypes.as_str(), Vec::new)
    }

    pub fn theme(&self) -> String {
        self.records
            .get_or_init(StoreKey::Theme.as_str(), || "light".to_string())
    }

    pub fn set_theme(&self, theme: &str) -> Result<()> {
        self.records.put(StoreKey::Theme.as_str(), &theme)
    }

    pub fn is_logged_in(&self) -> bool {
        self.records.get_or_init(StoreKey::LoggedIn.as_str(), || false)
    }

    pub fn set_logged_in(&self, logged_in: bool) -> Result<()> {
        self.records.put(StoreKey::LoggedIn.as_str(), &logged_in)
    }

    /// School profile, merged with defaults on read.
    pub fn school_profile(&self) -> SchoolProfile {
        self.records
            .get_or_init(StoreKey::SchoolProfile.as_str(), SchoolProfile::default)
    }

    pub fn set_school_profile(&self, profile: &SchoolProfile) -> Result<()> {
        self.records.put(StoreKey::SchoolProfile.as_str(), profile)
    }

    /// The signed-in user's profile, if one has been stored.
    pub fn user_profile(&self) -> Option<UserProfile> {
        self.records
            .get(StoreKey::UserProfile.as_str())
            .unwrap_or_default()
    }

    pub fn set_user_profile(&self, profile: &UserProfile) -> Result<()> {
        self.records.put(StoreKey::UserProfile.as_str(), profile)
    }

    /// Fee schedule, merged with defaults on read.
    pub fn fee_structure(&self) -> FeeStructure {
        self.records
            .get_or_init(StoreKey::FeeStructure.as_str(), FeeStructure::default)
    }

    pub fn set_fee_structure(&self, fees: &FeeStructure) -> Result<()> {
        self.records.put(StoreKey::FeeStructure.as_str(), fees)
    }

    // --- Derived Views ---

    /// Deleted-record counts across every entity family.
    pub fn recycle_bin(&self) -> RecycleBinSummary {
        views::recycle_bin_summary(
            &self.students(),
            &self.classes(),
            &self.employees(),
            &self.inquiries(),
        )
    }

    /// Aggregate billed/collected/outstanding over active students.
    pub fn fee_totals(&self) -> FeeTotals {
        views::fee_totals(&self.students())
    }

    // --- Backup Boundary ---

    /// Serialize the whole record-store key set to one document.
    /// Blob contents are not captured.
    pub fn export_backup(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        self.records.export_snapshot()
    }

    /// Repopulate the record store from a backup document.
    pub fn import_backup(
        &self,
        doc: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        self.records.import_snapshot(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let store = SchoolStore::open(StoreConfig::in_memory()).unwrap();
        assert!(store.students().is_empty());
        assert_eq!(store.theme(), "light");
        assert!(!store.is_logged_in());
    }

    #[test]
    fn test_profile_defaults_then_roundtrip() {
        let store = SchoolStore::open(StoreConfig::in_memory()).unwrap();

        let mut profile = store.school_profile();
        assert_eq!(profile.name, "");

        profile.name = "Sunrise Public School".to_string();
        store.set_school_profile(&profile).unwrap();
        assert_eq!(store.school_profile().name, "Sunrise Public School");
    }

    #[test]
    fn test_in_memory_scratch_removed_on_drop() {
        let store = SchoolStore::open(StoreConfig::in_memory()).unwrap();
        store
            .vault()
            .put(
                crate::blobs::BlobNamespace::StudentPhotos,
                "STU-1",
                b"jpeg",
                "image/jpeg",
            )
            .unwrap();

        let scratch = store._scratch.as_ref().unwrap().path().to_path_buf();
        assert!(scratch.exists());

        drop(store);
        assert!(!scratch.exists());
    }

    #[test]
    fn test_subscribe_single_key() {
        let store = SchoolStore::open(StoreConfig::in_memory()).unwrap();
        let handle = store.subscribe(StoreKey::Students);

        store.set_theme("dark").unwrap();
        store
            .records()
            .put(StoreKey::Students.as_str(), &Vec::<Student>::new())
            .unwrap();

        // Only the students change arrives.
        assert_eq!(handle.try_recv().unwrap().key, "students");
        assert!(handle.try_recv().is_err());
    }
}
