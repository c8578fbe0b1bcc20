//! Pure read-side computations over store collections.
//!
//! Nothing here touches the store; callers pass in the collections
//! they already read. These helpers encode the invariants the write
//! side must keep, and `paid_total` is the independent oracle the
//! financial tests check `fees_paid` against.

use crate::types::{InquiryRecord, Reclaimable, SchoolClass, Student, UserProfile};
use std::collections::BTreeMap;

/// Deleted-record counts per entity family.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecycleBinSummary {
    pub students: usize,
    pub classes: usize,
    pub employees: usize,
    /// Soft-deleted payments across every student, including students
    /// that are themselves in the recycle bin.
    pub payments: usize,
    pub inquiries: usize,
}

impl RecycleBinSummary {
    pub fn total(&self) -> usize {
        self.students + self.classes + self.employees + self.payments + self.inquiries
    }
}

/// Number of soft-deleted items in a collection.
pub fn deleted_count<T: Reclaimable>(items: &[T]) -> usize {
    items.iter().filter(|i| i.is_deleted()).count()
}

/// Summarize the recycle bin across all entity families.
pub fn recycle_bin_summary(
    students: &[Student],
    classes: &[SchoolClass],
    employees: &[UserProfile],
    inquiries: &[InquiryRecord],
) -> RecycleBinSummary {
    RecycleBinSummary {
        students: deleted_count(students),
        classes: deleted_count(classes),
        employees: deleted_count(employees),
        payments: students
            .iter()
            .map(|s| deleted_count(&s.payment_history))
            .sum(),
        inquiries: deleted_count(inquiries),
    }
}

/// Sum of the student's non-deleted payment amounts.
pub fn paid_total(student: &Student) -> f64 {
    student
        .payment_history
        .iter()
        .filter(|p| !p.is_deleted)
        .map(|p| p.amount)
        .sum()
}

/// What the student still owes.
pub fn outstanding_balance(student: &Student) -> f64 {
    student.total_fees - student.fees_paid
}

/// Active students grouped by class name. Students with no class sit
/// under the empty string.
pub fn students_by_class(students: &[Student]) -> BTreeMap<String, Vec<&Student>> {
    let mut groups: BTreeMap<String, Vec<&Student>> = BTreeMap::new();
    for student in students.iter().filter(|s| !s.is_deleted) {
        groups.entry(student.class.clone()).or_default().push(student);
    }
    groups
}

/// Aggregate fee position across active students.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeeTotals {
    pub billed: f64,
    pub collected: f64,
    pub outstanding: f64,
}

pub fn fee_totals(students: &[Student]) -> FeeTotals {
    let mut totals = FeeTotals::default();
    for student in students.iter().filter(|s| !s.is_deleted) {
        totals.billed += student.total_fees;
        totals.collected += student.fees_paid;
    }
    totals.outstanding = totals.billed - totals.collected;
    totals
}
