//! Core entity model and store key schema.
//!
//! Every type here serializes to the same camelCase document shapes the
//! UI reads and writes, so a populated store can be inspected (or
//! restored from a backup) without a translation step.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fixed keys of the record store. One key per logical collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreKey {
    Students,
    Classes,
    Employees,
    SchoolProfile,
    UserProfile,
    FeeStructure,
    Inquiries,
    Notifications,
    Theme,
    Sessions,
    LoggedIn,
    FeeTypes,
}

impl StoreKey {
    /// The string key the value is persisted under.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::Students => "students",
            StoreKey::Classes => "classes",
            StoreKey::Employees => "employees",
            StoreKey::SchoolProfile => "schoolProfile",
            StoreKey::UserProfile => "userProfile",
            StoreKey::FeeStructure => "feeStructure",
            StoreKey::Inquiries => "inquiries",
            StoreKey::Notifications => "notifications",
            StoreKey::Theme => "theme",
            StoreKey::Sessions => "sessions",
            StoreKey::LoggedIn => "isLoggedIn",
            StoreKey::FeeTypes => "feeTypes",
        }
    }

    /// All keys, in backup order.
    pub const ALL: [StoreKey; 12] = [
        StoreKey::Students,
        StoreKey::Classes,
        StoreKey::Employees,
        StoreKey::SchoolProfile,
        StoreKey::UserProfile,
        StoreKey::FeeStructure,
        StoreKey::Inquiries,
        StoreKey::Notifications,
        StoreKey::Theme,
        StoreKey::Sessions,
        StoreKey::LoggedIn,
        StoreKey::FeeTypes,
    ];
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records that can sit in the recycle bin.
///
/// `is_deleted` is a three-state marker: false = active, true = in the
/// recycle bin, record absent from its collection = purged.
pub trait Reclaimable {
    fn is_deleted(&self) -> bool;
    fn set_deleted(&mut self, deleted: bool);
}

macro_rules! impl_reclaimable {
    ($ty:ty) => {
        impl Reclaimable for $ty {
            fn is_deleted(&self) -> bool {
                self.is_deleted
            }
            fn set_deleted(&mut self, deleted: bool) {
                self.is_deleted = deleted;
            }
        }
    };
}

/// A single fee payment, embedded in `Student::payment_history`.
///
/// The receipt number is the payment's identity: unique within the
/// student (deleted entries included) and stable across reordering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub receipt_number: String,
    pub amount: f64,
    pub date: String,
    #[serde(default)]
    pub is_deleted: bool,
}

impl_reclaimable!(PaymentRecord);

/// A student record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    /// Soft foreign key into `SchoolClass::name` (by name, not by id;
    /// a denormalization inherited from the source data model).
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub total_fees: f64,
    #[serde(default)]
    pub fees_paid: f64,
    #[serde(default)]
    pub payment_history: Vec<PaymentRecord>,
    #[serde(default)]
    pub has_photo: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

impl_reclaimable!(Student);

impl Student {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            class: String::new(),
            total_fees: 0.0,
            fees_paid: 0.0,
            payment_history: Vec::new(),
            has_photo: false,
            is_deleted: false,
        }
    }

    /// Look up a payment by receipt number.
    pub fn payment(&self, receipt: &str) -> Option<&PaymentRecord> {
        self.payment_history
            .iter()
            .find(|p| p.receipt_number == receipt)
    }
}

/// A class (grade/section) record. Referenced by name from students.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolClass {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub is_deleted: bool,
}

impl_reclaimable!(SchoolClass);

/// Staff role tag on a user profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Admin,
    Teacher,
    Accountant,
    Support,
}

/// An employee: a role-tagged user profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub role: StaffRole,
    #[serde(default)]
    pub has_photo: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

impl_reclaimable!(UserProfile);

/// An admission inquiry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub is_deleted: bool,
}

impl_reclaimable!(InquiryRecord);

/// A dashboard notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub message: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub read: bool,
}

/// School profile. Versioned, merged with defaults on read: fields
/// missing from an older stored document take their `Default` value,
/// so adding a field here is the one place to update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchoolProfile {
    pub schema_version: u32,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub session: String,
}

impl Default for SchoolProfile {
    fn default() -> Self {
        Self {
            schema_version: 1,
            name: String::new(),
            address: String::new(),
            phone: String::new(),
            email: String::new(),
            session: String::new(),
        }
    }
}

/// Per-class fee schedule. Versioned and default-merged like
/// [`SchoolProfile`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeeStructure {
    pub schema_version: u32,
    /// Class name -> annual fee amount.
    pub classes: BTreeMap<String, f64>,
}

impl Default for FeeStructure {
    fn default() -> Self {
        Self {
            schema_version: 1,
            classes: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_key_names_are_stable() {
        assert_eq!(StoreKey::Students.as_str(), "students");
        assert_eq!(StoreKey::LoggedIn.as_str(), "isLoggedIn");
        assert_eq!(StoreKey::ALL.len(), 12);
    }

    #[test]
    fn test_student_roundtrip_uses_camel_case() {
        let mut s = Student::new("STU-1", "Asha");
        s.total_fees = 10000.0;
        let json = serde_json::to_value(&s).unwrap();
        assert!(json.get("totalFees").is_some());
        assert!(json.get("paymentHistory").is_some());
        let back: Student = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_is_deleted_defaults_to_active() {
        // Documents written before soft delete existed have no flag.
        let s: Student =
            serde_json::from_str(r#"{"id":"STU-1","name":"Asha"}"#).unwrap();
        assert!(!s.is_deleted());
        assert_eq!(s.class, "");
    }

    #[test]
    fn test_profile_merges_with_defaults() {
        // Partial older document: missing fields come back as defaults.
        let p: SchoolProfile =
            serde_json::from_str(r#"{"name":"Sunrise Public School"}"#).unwrap();
        assert_eq!(p.name, "Sunrise Public School");
        assert_eq!(p.address, "");
        assert_eq!(p.schema_version, 1);
    }
}
