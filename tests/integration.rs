//! Integration tests for the school store.

use campus_store::{
    views, BlobNamespace, SchoolClass, SchoolStore, StoreConfig, StoreKey, Student,
};
use tempfile::TempDir;

fn disk_store(dir: &TempDir) -> SchoolStore {
    SchoolStore::open(StoreConfig::at(dir.path().join("store"))).unwrap()
}

fn enroll(store: &SchoolStore, id: &str, name: &str, class: &str, total_fees: f64) {
    let mut s = Student::new(id, name);
    s.class = class.to_string();
    s.total_fees = total_fees;
    store.add_student(s).unwrap();
}

// --- Realistic Workflow Tests ---

#[test]
fn test_admission_and_fee_workflow() {
    let dir = TempDir::new().unwrap();
    let store = disk_store(&dir);

    store
        .add_class(SchoolClass {
            id: "CLS-1".into(),
            name: "5A".into(),
            section: "A".into(),
            is_deleted: false,
        })
        .unwrap();

    enroll(&store, "STU-1", "Asha Verma", "5A", 10000.0);
    enroll(&store, "STU-2", "Ravi Nair", "5A", 10000.0);

    store.add_payment("STU-1", 4000.0, "2026-04-01").unwrap();
    store.add_payment("STU-2", 10000.0, "2026-04-02").unwrap();

    let students = store.students();
    let groups = views::students_by_class(&students);
    assert_eq!(groups["5A"].len(), 2);

    let totals = store.fee_totals();
    assert_eq!(totals.billed, 20000.0);
    assert_eq!(totals.collected, 14000.0);
    assert_eq!(totals.outstanding, 6000.0);

    for student in store.students() {
        assert_eq!(student.fees_paid, views::paid_total(&student));
    }
}

#[test]
fn test_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = disk_store(&dir);
        enroll(&store, "STU-1", "Asha Verma", "5A", 10000.0);
        store.add_payment("STU-1", 2500.0, "2026-04-01").unwrap();
        store
            .vault()
            .put(BlobNamespace::StudentPhotos, "STU-1", b"jpeg", "image/jpeg")
            .unwrap();
    }

    let store = disk_store(&dir);
    let students = store.students();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].fees_paid, 2500.0);
    assert_eq!(students[0].payment_history.len(), 1);

    let photo = store
        .vault()
        .get(BlobNamespace::StudentPhotos, "STU-1")
        .unwrap()
        .unwrap();
    assert_eq!(photo.content, b"jpeg");
}

#[test]
fn test_every_write_notifies_subscribers() {
    let store = SchoolStore::open(StoreConfig::in_memory()).unwrap();
    let handle = store.subscribe(StoreKey::Students);

    enroll(&store, "STU-1", "Asha Verma", "5A", 10000.0);
    let p = store.add_payment("STU-1", 1000.0, "2026-04-01").unwrap();
    store.delete_payment("STU-1", &p.receipt_number).unwrap();

    let mut events = 0;
    while handle.try_recv().is_ok() {
        events += 1;
    }
    // add_student may also trigger the get_or_init seed write; at
    // minimum the three explicit mutations must all have published.
    assert!(events >= 3);
}

#[test]
fn test_remote_change_signal_carries_key_only() {
    let store = SchoolStore::open(StoreConfig::in_memory()).unwrap();
    let handle = store.subscribe(StoreKey::Students);

    store.records().notify_remote(StoreKey::Students.as_str());

    let event = handle.try_recv().unwrap();
    assert_eq!(event.key, "students");
    assert_eq!(event.origin, campus_store::ChangeOrigin::Remote);
}

// --- Backup Boundary ---

#[test]
fn test_backup_restores_records_but_not_blobs() {
    let store = SchoolStore::open(StoreConfig::in_memory()).unwrap();
    enroll(&store, "STU-1", "Asha Verma", "5A", 10000.0);
    store
        .records()
        .put(StoreKey::Students.as_str(), &{
            let mut students = store.students();
            students[0].has_photo = true;
            students
        })
        .unwrap();
    store
        .vault()
        .put(BlobNamespace::StudentPhotos, "STU-1", b"jpeg", "image/jpeg")
        .unwrap();

    let backup = store.export_backup().unwrap();

    // Restore into a fresh store with no blob contents.
    let restored = SchoolStore::open(StoreConfig::in_memory()).unwrap();
    restored.import_backup(&backup).unwrap();

    let students = restored.students();
    assert_eq!(students.len(), 1);
    assert!(students[0].has_photo);

    // The flag says present, the lookup says nothing: placeholder case.
    assert!(restored
        .vault()
        .get(BlobNamespace::StudentPhotos, "STU-1")
        .unwrap()
        .is_none());
}
