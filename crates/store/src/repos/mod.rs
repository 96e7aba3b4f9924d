//! Repository traits for contract store operations.

pub mod notifications;
pub mod replica;
pub mod source;
pub mod sync_status;

pub use notifications::NotificationFeed;
pub use replica::ReplicaRepo;
pub use source::SourceRepo;
pub use sync_status::SyncStatusRepo;
