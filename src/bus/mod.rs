//! Change bus: notifies subscribers that a keyed collection changed.

mod manager;

pub use manager::{ChangeBus, ChangeEvent, ChangeHandle, ChangeOrigin, SubscriberId};
