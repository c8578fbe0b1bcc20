//! Blob vault implementation.
//!
//! One subdirectory per namespace, one file per blob. Files carry a
//! magic header, the exact key, a content type, and a crc32 checksum
//! over the content. Opening never panics: if the backing directories
//! cannot be created the vault enters degraded mode, where reads
//! answer "not found" and mutations surface a typed failure, so
//! image-dependent callers fall back to placeholders instead of
//! crashing.

use crate::error::{Result, StoreError};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Magic bytes for vault files.
const VAULT_MAGIC: &[u8; 4] = b"VLT\0";

/// Current vault file format version.
const VAULT_VERSION: u8 = 1;

/// Width of auto-assigned keys; zero-padding keeps key order equal to
/// insertion order under a lexicographic sort.
const AUTO_KEY_WIDTH: usize = 8;

/// Fixed partitions of the vault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlobNamespace {
    /// Student photos, keyed by student id.
    StudentPhotos,
    /// Staff photos, keyed by user id.
    StaffPhotos,
    /// School assets under fixed names ("logo", "background", ...).
    SchoolAssets,
    /// Ordered gallery with auto-assigned keys.
    Gallery,
}

impl BlobNamespace {
    pub const ALL: [BlobNamespace; 4] = [
        BlobNamespace::StudentPhotos,
        BlobNamespace::StaffPhotos,
        BlobNamespace::SchoolAssets,
        BlobNamespace::Gallery,
    ];

    fn dir_name(&self) -> &'static str {
        match self {
            BlobNamespace::StudentPhotos => "student_photos",
            BlobNamespace::StaffPhotos => "staff_photos",
            BlobNamespace::SchoolAssets => "school_assets",
            BlobNamespace::Gallery => "gallery",
        }
    }
}

/// A stored blob.
#[derive(Clone, Debug, PartialEq)]
pub struct Blob {
    pub key: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

/// A materialized view of a blob, standing in for a display handle.
///
/// The vault counts outstanding leases; callers release one by
/// dropping it when the owning view goes away.
pub struct BlobLease {
    blob: Blob,
    leases: Arc<AtomicUsize>,
}

impl Deref for BlobLease {
    type Target = Blob;

    fn deref(&self) -> &Blob {
        &self.blob
    }
}

impl Drop for BlobLease {
    fn drop(&mut self) {
        self.leases.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
struct CachedBlob {
    content: Vec<u8>,
    content_type: String,
}

/// Namespaced blob store.
pub struct BlobVault {
    root: PathBuf,
    /// None = healthy; Some(reason) = degraded since open.
    outage: Option<String>,
    cache: Mutex<LruCache<(BlobNamespace, String), CachedBlob>>,
    /// Next auto key per namespace, seeded lazily from disk.
    next_auto: Mutex<HashMap<BlobNamespace, u64>>,
    leases: Arc<AtomicUsize>,
}

impl BlobVault {
    /// Open the vault rooted at `path`.
    ///
    /// Initialization failure is recorded, not propagated: the vault
    /// comes back in degraded mode and every caller sees typed
    /// failures or "not found" from then on.
    pub fn open(path: impl AsRef<Path>, cache_size: usize) -> Self {
        let root = path.as_ref().to_path_buf();
        let outage = match Self::init_dirs(&root) {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(path = %root.display(), error = %e, "blob vault unavailable");
                Some(e.to_string())
            }
        };

        let cache_size = NonZeroUsize::new(cache_size.max(1)).unwrap();

        Self {
            root,
            outage,
            cache: Mutex::new(LruCache::new(cache_size)),
            next_auto: Mutex::new(HashMap::new()),
            leases: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn init_dirs(root: &Path) -> std::io::Result<()> {
        for ns in BlobNamespace::ALL {
            fs::create_dir_all(root.join(ns.dir_name()))?;
        }
        Ok(())
    }

    /// Whether the backing store opened successfully.
    pub fn is_available(&self) -> bool {
        self.outage.is_none()
    }

    fn ensure_available(&self) -> Result<()> {
        match &self.outage {
            None => Ok(()),
            Some(reason) => Err(StoreError::BlobBackendUnavailable(reason.clone())),
        }
    }

    /// Store a blob under an explicit key, overwriting any previous
    /// content for that key.
    pub fn put(
        &self,
        ns: BlobNamespace,
        key: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<()> {
        self.ensure_available()?;

        let path = self.blob_path(ns, key);
        let tmp = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            write_blob(&mut file, key, content, content_type)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        self.cache.lock().put(
            (ns, key.to_string()),
            CachedBlob {
                content: content.to_vec(),
                content_type: content_type.to_string(),
            },
        );

        Ok(())
    }

    /// Store a blob under a fresh, strictly increasing key.
    pub fn put_auto(
        &self,
        ns: BlobNamespace,
        content: &[u8],
        content_type: &str,
    ) -> Result<String> {
        self.ensure_available()?;

        let key = {
            let mut counters = self.next_auto.lock();
            let next = match counters.get(&ns) {
                Some(n) => *n,
                None => self.scan_max_auto_key(ns)? + 1,
            };
            counters.insert(ns, next + 1);
            format!("{:0width$}", next, width = AUTO_KEY_WIDTH)
        };

        self.put(ns, &key, content, content_type)?;
        Ok(key)
    }

    /// Get a blob. Missing key and degraded vault both answer `None`.
    pub fn get(&self, ns: BlobNamespace, key: &str) -> Result<Option<Blob>> {
        if !self.is_available() {
            return Ok(None);
        }

        if let Some(cached) = self.cache.lock().get(&(ns, key.to_string())).cloned() {
            return Ok(Some(Blob {
                key: key.to_string(),
                content: cached.content,
                content_type: cached.content_type,
            }));
        }

        let path = self.blob_path(ns, key);
        if !path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&path)?;
        let blob = read_blob(&mut file)?;

        self.cache.lock().put(
            (ns, key.to_string()),
            CachedBlob {
                content: blob.content.clone(),
                content_type: blob.content_type.clone(),
            },
        );

        Ok(Some(blob))
    }

    /// Get a blob as a counted lease.
    pub fn materialize(&self, ns: BlobNamespace, key: &str) -> Result<Option<BlobLease>> {
        match self.get(ns, key)? {
            Some(blob) => {
                self.leases.fetch_add(1, Ordering::SeqCst);
                Ok(Some(BlobLease {
                    blob,
                    leases: Arc::clone(&self.leases),
                }))
            }
            None => Ok(None),
        }
    }

    /// Leases handed out and not yet dropped.
    pub fn outstanding_leases(&self) -> usize {
        self.leases.load(Ordering::SeqCst)
    }

    /// Check if a blob exists.
    pub fn exists(&self, ns: BlobNamespace, key: &str) -> bool {
        if !self.is_available() {
            return false;
        }
        if self.cache.lock().contains(&(ns, key.to_string())) {
            return true;
        }
        self.blob_path(ns, key).exists()
    }

    /// Delete a blob. Returns whether anything was removed.
    pub fn delete(&self, ns: BlobNamespace, key: &str) -> Result<bool> {
        self.ensure_available()?;

        self.cache.lock().pop(&(ns, key.to_string()));

        let path = self.blob_path(ns, key);
        if path.exists() {
            fs::remove_file(&path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// List every blob in a namespace, sorted by key.
    ///
    /// For the gallery the auto keys are zero-padded, so key order is
    /// insertion order. A degraded vault lists nothing.
    pub fn list_all(&self, ns: BlobNamespace) -> Result<Vec<Blob>> {
        if !self.is_available() {
            return Ok(Vec::new());
        }

        let mut blobs = Vec::new();
        for entry in fs::read_dir(self.root.join(ns.dir_name()))? {
            let entry = entry?;
            if entry.path().extension().is_some_and(|e| e == "tmp") {
                continue;
            }
            let mut file = File::open(entry.path())?;
            match read_blob(&mut file) {
                Ok(blob) => blobs.push(blob),
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "skipping unreadable blob");
                }
            }
        }
        blobs.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(blobs)
    }

    /// Remove every blob in a namespace.
    pub fn clear(&self, ns: BlobNamespace) -> Result<()> {
        self.ensure_available()?;

        let mut cache = self.cache.lock();
        let cached: Vec<_> = cache
            .iter()
            .map(|(k, _)| k.clone())
            .filter(|(n, _)| *n == ns)
            .collect();
        for key in cached {
            cache.pop(&key);
        }
        drop(cache);

        for entry in fs::read_dir(self.root.join(ns.dir_name()))? {
            fs::remove_file(entry?.path())?;
        }
        self.next_auto.lock().remove(&ns);
        Ok(())
    }

    fn blob_path(&self, ns: BlobNamespace, key: &str) -> PathBuf {
        self.root.join(ns.dir_name()).join(sanitize_key(key))
    }

    /// Highest existing auto key in a namespace (0 when empty).
    fn scan_max_auto_key(&self, ns: BlobNamespace) -> Result<u64> {
        let mut max = 0u64;
        for entry in fs::read_dir(self.root.join(ns.dir_name()))? {
            let entry = entry?;
            let name = entry.file_name();
            if let Ok(n) = name.to_string_lossy().parse::<u64>() {
                max = max.max(n);
            }
        }
        Ok(max)
    }
}

/// Map a key to a safe filename. Keys are ids and fixed asset names,
/// so this is conservative rather than reversible; the exact key is
/// stored inside the file header.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn write_blob(file: &mut File, key: &str, content: &[u8], content_type: &str) -> Result<()> {
    file.write_all(VAULT_MAGIC)?;
    file.write_all(&[VAULT_VERSION])?;

    let key_bytes = key.as_bytes();
    file.write_all(&(key_bytes.len() as u16).to_le_bytes())?;
    file.write_all(key_bytes)?;

    let ct_bytes = content_type.as_bytes();
    file.write_all(&(ct_bytes.len() as u16).to_le_bytes())?;
    file.write_all(ct_bytes)?;

    file.write_all(&(content.len() as u64).to_le_bytes())?;
    file.write_all(content)?;

    let checksum = crc32fast::hash(content);
    file.write_all(&checksum.to_le_bytes())?;

    Ok(())
}

fn read_blob(file: &mut File) -> Result<Blob> {
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if &magic != VAULT_MAGIC {
        return Err(StoreError::InvalidFormat("bad vault magic".into()));
    }

    let mut version = [0u8; 1];
    file.read_exact(&mut version)?;
    if version[0] != VAULT_VERSION {
        return Err(StoreError::InvalidFormat(format!(
            "unsupported vault version: {}",
            version[0]
        )));
    }

    let mut len2 = [0u8; 2];
    file.read_exact(&mut len2)?;
    let mut key_bytes = vec![0u8; u16::from_le_bytes(len2) as usize];
    file.read_exact(&mut key_bytes)?;
    let key = String::from_utf8_lossy(&key_bytes).into_owned();

    file.read_exact(&mut len2)?;
    let mut ct_bytes = vec![0u8; u16::from_le_bytes(len2) as usize];
    file.read_exact(&mut ct_bytes)?;
    let content_type = String::from_utf8_lossy(&ct_bytes).into_owned();

    let mut len8 = [0u8; 8];
    file.read_exact(&mut len8)?;
    let mut content = vec![0u8; u64::from_le_bytes(len8) as usize];
    file.read_exact(&mut content)?;

    let mut checksum_bytes = [0u8; 4];
    file.read_exact(&mut checksum_bytes)?;
    let stored = u32::from_le_bytes(checksum_bytes);
    let computed = crc32fast::hash(&content);
    if stored != computed {
        return Err(StoreError::ChecksumMismatch {
            expected: stored,
            got: computed,
        });
    }

    Ok(Blob {
        key,
        content,
        content_type,
    })
}
