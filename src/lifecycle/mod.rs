//! Entity lifecycle: soft delete, restore, and permanent purge.

mod reconciler;
