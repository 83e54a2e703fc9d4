pub mod entities;
pub mod value_objects;

pub use entities::{PendingAction, Record, RemoteRecord};
pub use value_objects::{ActionKind, RecordId, SyncStatus, TableName};
