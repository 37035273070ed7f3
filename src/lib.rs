pub mod app;
pub mod asset;
pub mod codec;
pub mod core;
pub mod ledger;
pub mod loader;
pub mod record;
pub mod scene;
pub mod service;
pub mod session;
pub mod settings;
pub mod storage;

pub use glam as math;

pub use crate::app::{AnchorApp, AppError, Placement};
pub use crate::asset::{Orientation, Prefab, PrefabRegistry};
pub use crate::codec::{Codec, LedgerFormat};
pub use crate::ledger::{AnchorLedger, FailurePolicy, LedgerError, LedgerOptions, LoadReport};
pub use crate::record::{AnchorRecord, Payload, PrefabRef, RecordHandle, ResolvedAnchor};
pub use crate::service::{AnchorService, Pose, SimulatedAnchorService};
pub use crate::settings::Settings;
pub use crate::storage::{FileStore, LedgerStore, MemoryStore};
