//! Recycle-bin reconciler.
//!
//! Every entity moves through `Active -> Deleted -> Active` via the
//! delete/restore pair and leaves through `purge`, which is terminal.
//! Purge cascades: a purged class releases its students' class field, a
//! purged student or employee takes its photo with it (best-effort),
//! and payment mutations keep the owning student's `fees_paid` equal to
//! the sum of non-deleted payment amounts at every step.
//!
//! Delete/restore/purge return `Ok(false)` when the target is absent or
//! already in the requested state: calling them on a purged record is a
//! no-op, never an error.

use crate::blobs::BlobNamespace;
use crate::error::{Result, StoreError};
use crate::store::SchoolStore;
use crate::types::{
    InquiryRecord, PaymentRecord, Reclaimable, SchoolClass, StoreKey, Student, UserProfile,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

impl SchoolStore {
    /// Read a collection, let `f` mutate it, and persist only when `f`
    /// reports a change. Untouched collections publish nothing.
    fn mutate_collection<T, R>(
        &self,
        key: StoreKey,
        f: impl FnOnce(&mut Vec<T>) -> Option<R>,
    ) -> Result<Option<R>>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut items: Vec<T> = self.records().get_or_init(key.as_str(), Vec::new);
        match f(&mut items) {
            Some(outcome) => {
                self.records().put(key.as_str(), &items)?;
                Ok(Some(outcome))
            }
            None => Ok(None),
        }
    }

    /// Flip the soft-delete flag on the first item matching `find`.
    fn mark_deleted<T>(
        &self,
        key: StoreKey,
        find: impl Fn(&T) -> bool,
        deleted: bool,
    ) -> Result<bool>
    where
        T: Reclaimable + Serialize + DeserializeOwned,
    {
        let changed = self.mutate_collection::<T, ()>(key, |items| {
            let item = items
                .iter_mut()
                .find(|i| find(i) && i.is_deleted() != deleted)?;
            item.set_deleted(deleted);
            Some(())
        })?;
        Ok(changed.is_some())
    }

    /// Remove the first item matching `find`, returning it.
    fn purge_from<T>(&self, key: StoreKey, find: impl Fn(&T) -> bool) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        self.mutate_collection(key, |items| {
            let pos = items.iter().position(|i| find(i))?;
            Some(items.remove(pos))
        })
    }

    /// Best-effort photo cleanup during a purge. A failed deletion is
    /// a leak, not a failed purge.
    fn scrub_photo(&self, ns: BlobNamespace, key: &str) {
        if let Err(e) = self.vault().delete(ns, key) {
            tracing::warn!(namespace = ?ns, key, error = %e, "photo left behind by purge");
        }
    }

    // --- Students ---

    pub fn add_student(&self, student: Student) -> Result<()> {
        let mut students = self.students();
        if students.iter().any(|s| s.id == student.id) {
            return Err(StoreError::DuplicateId(student.id));
        }
        students.push(student);
        self.records().put(StoreKey::Students.as_str(), &students)
    }

    /// Move a student to the recycle bin.
    pub fn delete_student(&self, id: &str) -> Result<bool> {
        self.mark_deleted::<Student>(StoreKey::Students, |s| s.id == id, true)
    }

    /// Bring a student back from the recycle bin.
    pub fn restore_student(&self, id: &str) -> Result<bool> {
        self.mark_deleted::<Student>(StoreKey::Students, |s| s.id == id, false)
    }

    /// Permanently remove a student, photo included.
    pub fn purge_student(&self, id: &str) -> Result<bool> {
        let removed = self.purge_from::<Student>(StoreKey::Students, |s| s.id == id)?;
        match removed {
            Some(student) => {
                if student.has_photo {
                    self.scrub_photo(BlobNamespace::StudentPhotos, &student.id);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // --- Classes ---

    pub fn add_class(&self, class: SchoolClass) -> Result<()> {
        let mut classes = self.classes();
        if classes.iter().any(|c| c.id == class.id) {
            return Err(StoreError::DuplicateId(class.id));
        }
        classes.push(class);
        self.records().put(StoreKey::Classes.as_str(), &classes)
    }

    pub fn delete_class(&self, id: &str) -> Result<bool> {
        self.mark_deleted::<SchoolClass>(StoreKey::Classes, |c| c.id == id, true)
    }

    pub fn restore_class(&self, id: &str) -> Result<bool> {
        self.mark_deleted::<SchoolClass>(StoreKey::Classes, |c| c.id == id, false)
    }

    /// Permanently remove a class and release every student that still
    /// points at it by name, recycle-bin students included.
    pub fn purge_class(&self, id: &str) -> Result<bool> {
        let removed = self.purge_from::<SchoolClass>(StoreKey::Classes, |c| c.id == id)?;
        let Some(class) = removed else {
            return Ok(false);
        };

        self.mutate_collection::<Student, ()>(StoreKey::Students, |students| {
            let mut any = false;
            for student in students.iter_mut() {
                if student.class == class.name {
                    student.class.clear();
                    any = true;
                }
            }
            any.then_some(())
        })?;

        Ok(true)
    }

    // --- Employees ---

    pub fn add_employee(&self, employee: UserProfile) -> Result<()> {
        let mut employees = self.employees();
        if employees.iter().any(|e| e.user_id == employee.user_id) {
            return Err(StoreError::DuplicateId(employee.user_id));
        }
        employees.push(employee);
        self.records().put(StoreKey::Employees.as_str(), &employees)
    }

    pub fn delete_employee(&self, user_id: &str) -> Result<bool> {
        self.mark_deleted::<UserProfile>(StoreKey::Employees, |e| e.user_id == user_id, true)
    }

    pub fn restore_employee(&self, user_id: &str) -> Result<bool> {
        self.mark_deleted::<UserProfile>(StoreKey::Employees, |e| e.user_id == user_id, false)
    }

    pub fn purge_employee(&self, user_id: &str) -> Result<bool> {
        let removed =
            self.purge_from::<UserProfile>(StoreKey::Employees, |e| e.user_id == user_id)?;
        match removed {
            Some(employee) => {
                if employee.has_photo {
                    self.scrub_photo(BlobNamespace::StaffPhotos, &employee.user_id);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // --- Inquiries ---

    pub fn add_inquiry(&self, inquiry: InquiryRecord) -> Result<()> {
        let mut inquiries = self.inquiries();
        if inquiries.iter().any(|i| i.id == inquiry.id) {
            return Err(StoreError::DuplicateId(inquiry.id));
        }
        inquiries.push(inquiry);
        self.records().put(StoreKey::Inquiries.as_str(), &inquiries)
    }

    pub fn delete_inquiry(&self, id: &str) -> Result<bool> {
        self.mark_deleted::<InquiryRecord>(StoreKey::Inquiries, |i| i.id == id, true)
    }

    pub fn restore_inquiry(&self, id: &str) -> Result<bool> {
        self.mark_deleted::<InquiryRecord>(StoreKey::Inquiries, |i| i.id == id, false)
    }

    pub fn purge_inquiry(&self, id: &str) -> Result<bool> {
        Ok(self
            .purge_from::<InquiryRecord>(StoreKey::Inquiries, |i| i.id == id)?
            .is_some())
    }

    // --- Payments ---

    /// Record a payment against a student.
    ///
    /// The receipt number is assigned here and never reused: it is one
    /// past the highest receipt in the student's full history, deleted
    /// entries included.
    pub fn add_payment(&self, student_id: &str, amount: f64, date: &str) -> Result<PaymentRecord> {
        let mut students = self.students();
        let student = students
            .iter_mut()
            .find(|s| s.id == student_id)
            .ok_or_else(|| StoreError::RecordNotFound(student_id.to_string()))?;

        let payment = PaymentRecord {
            receipt_number: next_receipt(student),
            amount,
            date: date.to_string(),
            is_deleted: false,
        };
        student.fees_paid += amount;
        student.payment_history.push(payment.clone());

        self.records().put(StoreKey::Students.as_str(), &students)?;
        Ok(payment)
    }

    /// Change a non-deleted payment's amount, applying the difference
    /// to the student's paid total.
    pub fn edit_payment_amount(
        &self,
        student_id: &str,
        receipt: &str,
        new_amount: f64,
    ) -> Result<()> {
        let mut students = self.students();
        let student = students
            .iter_mut()
            .find(|s| s.id == student_id)
            .ok_or_else(|| StoreError::RecordNotFound(student_id.to_string()))?;
        let payment = student
            .payment_history
            .iter_mut()
            .find(|p| p.receipt_number == receipt)
            .ok_or_else(|| StoreError::PaymentNotFound {
                student: student_id.to_string(),
                receipt: receipt.to_string(),
            })?;
        if payment.is_deleted {
            return Err(StoreError::InvalidOperation(format!(
                "cannot edit deleted payment {receipt}"
            )));
        }

        let diff = new_amount - payment.amount;
        payment.amount = new_amount;
        student.fees_paid += diff;

        self.records().put(StoreKey::Students.as_str(), &students)
    }

    /// Soft-delete a payment, subtracting its amount from the paid
    /// total. Already-deleted payments and missing records are no-ops.
    pub fn delete_payment(&self, student_id: &str, receipt: &str) -> Result<bool> {
        let outcome = self.mutate_collection::<Student, ()>(StoreKey::Students, |students| {
            let student = students.iter_mut().find(|s| s.id == student_id)?;
            let payment = student
                .payment_history
                .iter_mut()
                .find(|p| p.receipt_number == receipt && !p.is_deleted)?;
            payment.is_deleted = true;
            let amount = payment.amount;
            student.fees_paid -= amount;
            Some(())
        })?;
        Ok(outcome.is_some())
    }

    /// Restore a soft-deleted payment, re-adding its amount.
    pub fn restore_payment(&self, student_id: &str, receipt: &str) -> Result<bool> {
        let outcome = self.mutate_collection::<Student, ()>(StoreKey::Students, |students| {
            let student = students.iter_mut().find(|s| s.id == student_id)?;
            let payment = student
                .payment_history
                .iter_mut()
                .find(|p| p.receipt_number == receipt && p.is_deleted)?;
            payment.is_deleted = false;
            let amount = payment.amount;
            student.fees_paid += amount;
            Some(())
        })?;
        Ok(outcome.is_some())
    }

    /// Permanently remove a payment from the student's history.
    ///
    /// A payment purged straight from Active has its amount subtracted
    /// first, so both purge paths land on the same paid total.
    pub fn purge_payment(&self, student_id: &str, receipt: &str) -> Result<bool> {
        let outcome = self.mutate_collection::<Student, ()>(StoreKey::Students, |students| {
            let student = students.iter_mut().find(|s| s.id == student_id)?;
            let pos = student
                .payment_history
                .iter()
                .position(|p| p.receipt_number == receipt)?;
            let payment = student.payment_history.remove(pos);
            if !payment.is_deleted {
                student.fees_paid -= payment.amount;
            }
            Some(())
        })?;
        Ok(outcome.is_some())
    }
}

/// Next receipt number for a student: "RCP-<n>" where n is one past
/// the highest issued so far, across active and deleted payments.
fn next_receipt(student: &Student) -> String {
    let max = student
        .payment_history
        .iter()
        .filter_map(|p| p.receipt_number.strip_prefix("RCP-"))
        .filter_map(|n| n.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("RCP-{:04}", max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;
    use crate::views;

    fn test_store() -> SchoolStore {
        SchoolStore::open(StoreConfig::in_memory()).unwrap()
    }

    fn enrolled_student(store: &SchoolStore, id: &str) -> Student {
        let mut s = Student::new(id, "Test Student");
        s.total_fees = 10000.0;
        store.add_student(s.clone()).unwrap();
        s
    }

    fn student(store: &SchoolStore, id: &str) -> Student {
        store.students().into_iter().find(|s| s.id == id).unwrap()
    }

    #[test]
    fn test_duplicate_student_id_rejected() {
        let store = test_store();
        enrolled_student(&store, "STU-1");
        let err = store.add_student(Student::new("STU-1", "Other")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(_)));
    }

    #[test]
    fn test_delete_restore_student() {
        let store = test_store();
        enrolled_student(&store, "STU-1");

        assert!(store.delete_student("STU-1").unwrap());
        assert!(student(&store, "STU-1").is_deleted);

        // Second delete is a no-op.
        assert!(!store.delete_student("STU-1").unwrap());

        assert!(store.restore_student("STU-1").unwrap());
        assert!(!student(&store, "STU-1").is_deleted);
    }

    #[test]
    fn test_receipts_unique_across_deleted_history() {
        let store = test_store();
        enrolled_student(&store, "STU-1");

        let a = store.add_payment("STU-1", 1000.0, "2026-04-01").unwrap();
        store.purge_payment("STU-1", &a.receipt_number).unwrap();
        let b = store.add_payment("STU-1", 1000.0, "2026-04-02").unwrap();

        // Purge empties the history, but a soft-deleted survivor still
        // pins the counter.
        let c = store.add_payment("STU-1", 500.0, "2026-04-03").unwrap();
        store.delete_payment("STU-1", &c.receipt_number).unwrap();
        let d = store.add_payment("STU-1", 500.0, "2026-04-04").unwrap();

        assert_ne!(b.receipt_number, c.receipt_number);
        assert_ne!(c.receipt_number, d.receipt_number);
    }

    #[test]
    fn test_ledger_scenario() {
        let store = test_store();
        enrolled_student(&store, "STU-1");

        let a = store.add_payment("STU-1", 4000.0, "2026-04-01").unwrap();
        assert_eq!(student(&store, "STU-1").fees_paid, 4000.0);

        let b = store.add_payment("STU-1", 3000.0, "2026-05-01").unwrap();
        assert_eq!(student(&store, "STU-1").fees_paid, 7000.0);

        store.delete_payment("STU-1", &a.receipt_number).unwrap();
        assert_eq!(student(&store, "STU-1").fees_paid, 3000.0);

        store.restore_payment("STU-1", &a.receipt_number).unwrap();
        assert_eq!(student(&store, "STU-1").fees_paid, 7000.0);

        store
            .edit_payment_amount("STU-1", &b.receipt_number, 5000.0)
            .unwrap();
        assert_eq!(student(&store, "STU-1").fees_paid, 9000.0);

        store.purge_payment("STU-1", &a.receipt_number).unwrap();
        let s = student(&store, "STU-1");
        assert_eq!(s.fees_paid, 5000.0);
        assert_eq!(s.payment_history.len(), 1);
        assert_eq!(s.payment_history[0].amount, 5000.0);
        assert!(!s.payment_history[0].is_deleted);
        assert_eq!(s.fees_paid, views::paid_total(&s));
    }

    #[test]
    fn test_purge_from_active_and_from_deleted_agree() {
        let store = test_store();
        enrolled_student(&store, "STU-1");
        enrolled_student(&store, "STU-2");

        // Path 1: purge straight from Active.
        let p1 = store.add_payment("STU-1", 2500.0, "2026-04-01").unwrap();
        store.purge_payment("STU-1", &p1.receipt_number).unwrap();

        // Path 2: delete, then purge.
        let p2 = store.add_payment("STU-2", 2500.0, "2026-04-01").unwrap();
        store.delete_payment("STU-2", &p2.receipt_number).unwrap();
        store.purge_payment("STU-2", &p2.receipt_number).unwrap();

        assert_eq!(student(&store, "STU-1").fees_paid, 0.0);
        assert_eq!(student(&store, "STU-2").fees_paid, 0.0);
    }

    #[test]
    fn test_edit_deleted_payment_rejected() {
        let store = test_store();
        enrolled_student(&store, "STU-1");
        let p = store.add_payment("STU-1", 1000.0, "2026-04-01").unwrap();
        store.delete_payment("STU-1", &p.receipt_number).unwrap();

        let err = store
            .edit_payment_amount("STU-1", &p.receipt_number, 2000.0)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidOperation(_)));
    }

    #[test]
    fn test_payment_for_unknown_student_errors() {
        let store = test_store();
        let err = store.add_payment("ghost", 100.0, "2026-04-01").unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound(_)));
    }
}
