//! Offline cache manager.
//!
//! Keeps the app shell and its static assets available without network
//! access. Each deployment owns one named cache generation
//! (`v60-recipe-v1.4.0`); a new version is installed next to the live one,
//! waits until it is told to take over, then evicts every other generation.
//!
//! Pieces:
//! - `storage`: the injected bucket store (`CacheStorage` / `CacheBucket`),
//!   with `MemoryStorage` and the JSON-on-disk `FileStorage`
//! - `manifest`: generation names and the pre-cache manifest
//! - `routing`: per-request cache policy
//! - `worker`: one generation's install/activate lifecycle and interception
//! - `registration`: the active/waiting slots, control messages, dispatch
//! - `clients`, `notifications`: open app instances and notification clicks

pub mod clients;
pub mod entry;
pub mod error;
pub mod file;
pub mod manifest;
pub mod memory;
pub mod message;
pub mod notifications;
pub mod registration;
pub mod routing;
pub mod storage;
pub mod worker;

pub use clients::{Client, ClientId, ClientRegistry};
pub use entry::{CachedData, CachedResponse};
pub use error::{LifecycleError, StoreError};
pub use file::FileStorage;
pub use manifest::{CacheName, PrecacheManifest};
pub use memory::MemoryStorage;
pub use message::ControlMessage;
pub use notifications::{Notification, NotificationCenter, NotificationId};
pub use registration::{
    BucketStatus, ClickOutcome, RegisterOutcome, Registration, RegistrationStatus, WorkerStatus,
};
pub use routing::{RoutePolicy, RouteTable};
pub use storage::{CacheBucket, CacheStorage};
pub use worker::{
    ActivationReport, CacheWorker, InstallReport, Interception, LifecycleState, ResponseSource,
    Routed,
};
