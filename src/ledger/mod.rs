//! The anchor ledger: placed anchors, in placement order, and the protocol
//! for writing them to the ledger slot and bringing them back.

mod report;

use std::sync::Arc;

use glam::Vec3;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::asset::PrefabRegistry;
use crate::codec::{Codec, FormatError};
use crate::core::Arena;
use crate::loader::LedgerLoader;
use crate::record::{AnchorRecord, Payload, PrefabRef, RecordHandle, ResolvedAnchor};
use crate::service::{AnchorHandle, AnchorService};
use crate::storage::{LedgerStore, StorageError};

pub use self::report::*;

/// What `load` does when a payload fails to resolve.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the failing record; later records are not attempted.
    #[default]
    StopAtFirst,
    /// Note the failure and keep resolving the remaining records.
    SkipAndContinue,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LedgerOptions {
    pub codec: Codec,
    pub policy: FailurePolicy,
}

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("anchor payload is empty")]
    EmptyPayload,

    #[error("prefab {0} is not in the registry")]
    UnknownPrefab(PrefabRef),

    #[error("record {record}: prefab {prefab} is not in the registry")]
    UnresolvedPrefab { record: usize, prefab: PrefabRef },

    #[error("scale {0} is not finite")]
    InvalidScale(Vec3),

    #[error("anchor {0:?} has no payload yet")]
    PayloadUnavailable(AnchorHandle),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("malformed ledger: {0}")]
    Format(#[from] FormatError),
}

pub struct AnchorLedger<S> {
    records: Arena<AnchorRecord>,
    registry: Arc<PrefabRegistry>,
    service: S,
    store: Arc<dyn LedgerStore>,
    options: LedgerOptions,
}

impl<S: AnchorService> AnchorLedger<S> {
    pub fn new(
        registry: Arc<PrefabRegistry>,
        service: S,
        store: Arc<dyn LedgerStore>,
        options: LedgerOptions,
    ) -> Self {
        Self {
            records: Arena::new(),
            registry,
            service,
            store,
            options,
        }
    }

    pub fn registry(&self) -> &Arc<PrefabRegistry> {
        &self.registry
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut S {
        &mut self.service
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn options(&self) -> LedgerOptions {
        self.options
    }

    /// A background loader bound to this ledger's slot and encoding.
    pub fn loader(&self, thread_pool: Arc<ThreadPool>) -> LedgerLoader {
        LedgerLoader::new(self.store.clone(), self.options.codec, thread_pool)
    }

    /// Appends a freshly placed anchor.
    ///
    /// The prefab must already be registered; an unknown prefab is rejected
    /// here instead of surfacing later as a load failure.
    pub fn record(
        &mut self,
        payload: Payload,
        prefab: PrefabRef,
        scale: Vec3,
    ) -> Result<RecordHandle, LedgerError> {
        if payload.is_empty() {
            return Err(LedgerError::EmptyPayload);
        }

        if !self.registry.contains(prefab) {
            return Err(LedgerError::UnknownPrefab(prefab));
        }

        if !scale.is_finite() {
            return Err(LedgerError::InvalidScale(scale));
        }

        let handle = self
            .records
            .insert(AnchorRecord::new(payload, prefab, scale));

        debug!(?handle, %prefab, "anchor recorded");

        Ok(handle)
    }

    /// Records a live anchor, asking the service for its payload.
    pub fn record_anchor(
        &mut self,
        anchor: AnchorHandle,
        prefab: PrefabRef,
        scale: Vec3,
    ) -> Result<RecordHandle, LedgerError> {
        let payload = self
            .service
            .payload(anchor)
            .ok_or(LedgerError::PayloadUnavailable(anchor))?;

        self.record(payload, prefab, scale)
    }

    pub fn remove(&mut self, handle: RecordHandle) -> Option<AnchorRecord> {
        self.records.remove(handle)
    }

    pub fn get(&self, handle: RecordHandle) -> Option<&AnchorRecord> {
        self.records.get(handle)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = (RecordHandle, &AnchorRecord)> {
        self.records.iter()
    }

    pub fn snapshot(&self) -> Vec<AnchorRecord> {
        self.records.values().cloned().collect()
    }

    /// Writes every record to the ledger slot, replacing what was there.
    ///
    /// An empty ledger is written as an empty document so that the next
    /// load sees zero records instead of a missing ledger.
    pub fn save(&self) -> Result<usize, LedgerError> {
        let records = self.snapshot();
        let text = self.options.codec.encode(&records)?;

        self.store.write(&text)?;

        info!(count = records.len(), format = ?self.options.codec.format, "ledger saved");

        Ok(records.len())
    }

    /// Reads the ledger slot and resolves every record against the service.
    ///
    /// A missing ledger loads as empty. Format and prefab errors fail the
    /// whole load and leave the in-memory ledger untouched.
    pub fn load(&mut self) -> Result<LoadReport, LedgerError> {
        let records = match self.store.read()? {
            Some(text) => self.options.codec.decode(&text)?,
            None => {
                info!("no saved ledger");
                Vec::new()
            }
        };

        self.restore(records)
    }

    /// Replaces the in-memory ledger with whatever part of `records` resolves.
    ///
    /// Handles issued before the restore stay stale afterwards: the arena is
    /// emptied in place, so reused cells move on to a new generation.
    pub fn restore(&mut self, records: Vec<AnchorRecord>) -> Result<LoadReport, LedgerError> {
        for (record, anchor) in records.iter().enumerate() {
            if !self.registry.contains(anchor.prefab) {
                return Err(LedgerError::UnresolvedPrefab {
                    record,
                    prefab: anchor.prefab,
                });
            }
        }

        self.records.drain();

        let total = records.len();
        let mut report = LoadReport::default();

        for (index, record) in records.into_iter().enumerate() {
            let anchors = self.service.resolve_anchors(&record.payload);

            let Some((&anchor, extra)) = anchors.split_first() else {
                warn!(index, payload = %record.payload, "anchor could not be resolved");

                report.failures.push(ResolutionFailure {
                    index,
                    payload: record.payload,
                });

                match self.options.policy {
                    FailurePolicy::StopAtFirst => {
                        report.halted = index + 1 < total;
                        break;
                    }
                    FailurePolicy::SkipAndContinue => continue,
                }
            };

            if !extra.is_empty() {
                self.service.destroy_anchors(extra);
            }

            let prefab = record.prefab;
            let scale = record.scale;
            let handle = self.records.insert(record);

            report.resolved.push(ResolvedAnchor {
                index,
                record: handle,
                anchor,
                prefab,
                scale,
            });
        }

        info!(
            resolved = report.resolved.len(),
            failed = report.failures.len(),
            halted = report.halted,
            "ledger loaded"
        );

        Ok(report)
    }

    /// Drops every record and hands back their handles so the caller can
    /// destroy the instances built from them. Storage is not touched.
    pub fn clear(&mut self) -> Vec<RecordHandle> {
        let handles: Vec<_> = self
            .records
            .drain()
            .into_iter()
            .map(|(handle, _)| handle)
            .collect();

        debug!(count = handles.len(), "ledger cleared");

        handles
    }
}

#[cfg(test)]
mod tests {
    use ahash::AHashSet;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::asset::Prefab;
    use crate::codec::LedgerFormat;
    use crate::service::{AnchorStatus, LocalizationState, Pose};
    use crate::storage::MemoryStore;

    /// Resolves every payload except the ones listed in `failing`.
    #[derive(Default)]
    struct EchoService {
        next: u64,
        failing: AHashSet<String>,
        attempts: Vec<String>,
    }

    impl AnchorService for EchoService {
        fn localization_state(&self) -> LocalizationState {
            LocalizationState::Localized
        }

        fn create_anchors(&mut self, _pose: &Pose) -> Vec<AnchorHandle> {
            self.next += 1;
            vec![AnchorHandle::from_raw(self.next)]
        }

        fn resolve_anchors(&mut self, payload: &Payload) -> Vec<AnchorHandle> {
            self.attempts.push(payload.to_string());

            if self.failing.contains(payload.as_str()) {
                return Vec::new();
            }

            self.next += 1;
            vec![AnchorHandle::from_raw(self.next)]
        }

        fn status(&self, _anchor: AnchorHandle) -> AnchorStatus {
            AnchorStatus::Success
        }

        fn payload(&self, anchor: AnchorHandle) -> Option<Payload> {
            Some(Payload::new(format!("echo-{}", anchor.raw())))
        }

        fn pose(&self, _anchor: AnchorHandle) -> Option<Pose> {
            Some(Pose::default())
        }

        fn destroy_anchors(&mut self, _anchors: &[AnchorHandle]) {}

        fn restart(&mut self) {}
    }

    fn ledger(service: EchoService, policy: FailurePolicy) -> AnchorLedger<EchoService> {
        let registry =
            PrefabRegistry::new(vec![Prefab::new("portal"), Prefab::new("lamp")]).unwrap();

        AnchorLedger::new(
            Arc::new(registry),
            service,
            Arc::new(MemoryStore::new()),
            LedgerOptions {
                codec: Codec::new(LedgerFormat::Lines, 4),
                policy,
            },
        )
    }

    fn record_three(ledger: &mut AnchorLedger<EchoService>) {
        for (payload, prefab) in [("a", 0), ("b", 1), ("c", 0)] {
            ledger
                .record(Payload::new(payload), PrefabRef::new(prefab), Vec3::ONE)
                .unwrap();
        }
    }

    #[test]
    fn record_rejects_unknown_prefab_and_empty_payload() {
        let mut ledger = ledger(EchoService::default(), FailurePolicy::StopAtFirst);

        let err = ledger
            .record(Payload::new("a"), PrefabRef::new(2), Vec3::ONE)
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownPrefab(p) if p == PrefabRef::new(2)));

        let err = ledger
            .record(Payload::new(""), PrefabRef::new(0), Vec3::ONE)
            .unwrap_err();
        assert!(matches!(err, LedgerError::EmptyPayload));

        assert!(ledger.is_empty());
    }

    #[test]
    fn remove_targets_one_record() {
        let mut ledger = ledger(EchoService::default(), FailurePolicy::StopAtFirst);

        let a = ledger
            .record(Payload::new("a"), PrefabRef::new(0), Vec3::ONE)
            .unwrap();
        ledger
            .record(Payload::new("b"), PrefabRef::new(1), Vec3::ONE)
            .unwrap();

        assert_eq!(ledger.remove(a).map(|r| r.payload), Some(Payload::new("a")));
        assert_eq!(ledger.remove(a), None);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn record_anchor_uses_service_payload() {
        let mut ledger = ledger(EchoService::default(), FailurePolicy::StopAtFirst);

        let handle = ledger
            .record_anchor(AnchorHandle::from_raw(9), PrefabRef::new(1), Vec3::ONE)
            .unwrap();

        assert_eq!(ledger.get(handle).unwrap().payload.as_str(), "echo-9");
    }

    #[test]
    fn stop_at_first_leaves_later_records_unattempted() {
        let mut service = EchoService::default();
        service.failing.insert("b".to_owned());

        let mut ledger = ledger(service, FailurePolicy::StopAtFirst);
        record_three(&mut ledger);
        ledger.save().unwrap();

        let report = ledger.load().unwrap();

        assert_eq!(report.resolved.len(), 1);
        assert_eq!(report.resolved[0].index, 0);
        assert_eq!(report.first_failure().map(|f| f.index), Some(1));
        assert!(report.halted);
        assert_eq!(ledger.service().attempts, ["a", "b"]);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn skip_and_continue_reports_every_failure() {
        let mut service = EchoService::default();
        service.failing.insert("a".to_owned());
        service.failing.insert("c".to_owned());

        let mut ledger = ledger(service, FailurePolicy::SkipAndContinue);
        record_three(&mut ledger);
        ledger.save().unwrap();

        let report = ledger.load().unwrap();

        assert_eq!(report.failed_indices(), [0, 2]);
        assert_eq!(report.resolved.len(), 1);
        assert_eq!(report.resolved[0].index, 1);
        assert!(!report.halted);
        assert_eq!(ledger.service().attempts, ["a", "b", "c"]);
    }

    #[test]
    fn load_replaces_instead_of_merging() {
        let mut ledger = ledger(EchoService::default(), FailurePolicy::StopAtFirst);
        record_three(&mut ledger);
        ledger.save().unwrap();

        ledger
            .record(Payload::new("d"), PrefabRef::new(1), Vec3::ONE)
            .unwrap();
        assert_eq!(ledger.len(), 4);

        let report = ledger.load().unwrap();

        assert_eq!(report.resolved.len(), 3);
        let payloads: Vec<_> = ledger.snapshot().into_iter().map(|r| r.payload).collect();
        assert_eq!(payloads, [Payload::new("a"), Payload::new("b"), Payload::new("c")]);
    }

    #[test]
    fn handles_from_before_a_load_go_stale() {
        let mut ledger = AnchorLedger::new(
            Arc::new(PrefabRegistry::new(vec![Prefab::new("portal")]).unwrap()),
            EchoService::default(),
            Arc::new(MemoryStore::with_contents("saved\n0\n1,1,1\n")),
            LedgerOptions {
                codec: Codec::new(LedgerFormat::Lines, 4),
                policy: FailurePolicy::StopAtFirst,
            },
        );

        let unsaved = ledger
            .record(Payload::new("unsaved"), PrefabRef::new(0), Vec3::ONE)
            .unwrap();

        let report = ledger.load().unwrap();
        let restored = report.resolved[0].record;

        assert_ne!(restored, unsaved);
        assert_eq!(ledger.remove(unsaved), None);
        assert_eq!(ledger.get(unsaved), None);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(restored).map(|r| r.payload.as_str()), Some("saved"));
    }

    #[test]
    fn unknown_prefab_in_storage_fails_the_load() {
        let registry = PrefabRegistry::new(vec![Prefab::new("portal")]).unwrap();
        let mut ledger = AnchorLedger::new(
            Arc::new(registry),
            EchoService::default(),
            Arc::new(MemoryStore::with_contents("a\n0\n1,1,1\nb\n5\n1,1,1\n")),
            LedgerOptions {
                codec: Codec::new(LedgerFormat::Lines, 4),
                policy: FailurePolicy::StopAtFirst,
            },
        );

        let err = ledger.load().unwrap_err();

        assert!(matches!(
            err,
            LedgerError::UnresolvedPrefab { record: 1, prefab } if prefab == PrefabRef::new(5)
        ));
        assert!(ledger.service().attempts.is_empty());
    }

    #[test]
    fn clear_returns_handles_and_keeps_storage() {
        let mut ledger = ledger(EchoService::default(), FailurePolicy::StopAtFirst);
        record_three(&mut ledger);
        ledger.save().unwrap();

        let handles = ledger.clear();

        assert_eq!(handles.len(), 3);
        assert!(ledger.is_empty());
        assert_eq!(ledger.load().unwrap().resolved.len(), 3);
    }
}
