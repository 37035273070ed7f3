use ahash::{AHashMap, AHashSet};
use tracing::debug;
use uuid::Uuid;

use crate::record::Payload;
use crate::service::{AnchorHandle, AnchorService, AnchorStatus, LocalizationState, Pose};

struct LiveAnchor {
    payload: Payload,
    status: AnchorStatus,
}

/// In-process stand-in for the positioning service.
///
/// Payloads are random UUIDs. The "world" that maps payloads to poses
/// survives [`restart`](AnchorService::restart), so anchors placed before a
/// restart can still be resolved after it.
pub struct SimulatedAnchorService {
    state: LocalizationState,
    next_handle: u64,
    place_pending: bool,
    live: AHashMap<AnchorHandle, LiveAnchor>,
    world: AHashMap<Payload, Pose>,
    unresolvable: AHashSet<Payload>,
    resolve_calls: Vec<Payload>,
}

impl SimulatedAnchorService {
    pub fn new() -> Self {
        Self {
            state: LocalizationState::Initializing,
            next_handle: 1,
            place_pending: false,
            live: AHashMap::new(),
            world: AHashMap::new(),
            unresolvable: AHashSet::new(),
            resolve_calls: Vec::new(),
        }
    }

    pub fn localized() -> Self {
        let mut service = Self::new();
        service.state = LocalizationState::Localized;
        service
    }

    pub fn set_localization_state(&mut self, state: LocalizationState) {
        debug!(?state, "localization state changed");
        self.state = state;
    }

    /// New anchors start out `Pending` until [`settle`](Self::settle) is called.
    pub fn with_pending_placements(mut self) -> Self {
        self.place_pending = true;
        self
    }

    /// Marks every pending anchor as successfully located.
    pub fn settle(&mut self) {
        for anchor in self.live.values_mut() {
            if anchor.status == AnchorStatus::Pending {
                anchor.status = AnchorStatus::Success;
            }
        }
    }

    pub fn fail_anchor(&mut self, anchor: AnchorHandle) {
        if let Some(anchor) = self.live.get_mut(&anchor) {
            anchor.status = AnchorStatus::Failed;
        }
    }

    /// Makes the service report zero anchors whenever `payload` is resolved.
    pub fn fail_resolution(&mut self, payload: Payload) {
        self.unresolvable.insert(payload);
    }

    /// Registers a payload as a known place in the world, as if another
    /// session had created it.
    pub fn seed(&mut self, payload: Payload, pose: Pose) {
        self.world.insert(payload, pose);
    }

    /// Payloads passed to `resolve_anchors`, in call order.
    pub fn resolve_calls(&self) -> &[Payload] {
        &self.resolve_calls
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    fn mint(&mut self, payload: Payload, status: AnchorStatus) -> AnchorHandle {
        let handle = AnchorHandle::from_raw(self.next_handle);
        self.next_handle += 1;
        self.live.insert(handle, LiveAnchor { payload, status });
        handle
    }
}

impl Default for SimulatedAnchorService {
    fn default() -> Self {
        Self::new()
    }
}

impl AnchorService for SimulatedAnchorService {
    fn localization_state(&self) -> LocalizationState {
        self.state
    }

    fn create_anchors(&mut self, pose: &Pose) -> Vec<AnchorHandle> {
        if self.state != LocalizationState::Localized {
            debug!(state = ?self.state, "refusing to create anchor before localization");
            return Vec::new();
        }

        let payload = Payload::new(Uuid::new_v4().to_string());
        self.world.insert(payload.clone(), *pose);

        let status = if self.place_pending {
            AnchorStatus::Pending
        } else {
            AnchorStatus::Success
        };

        vec![self.mint(payload, status)]
    }

    fn resolve_anchors(&mut self, payload: &Payload) -> Vec<AnchorHandle> {
        self.resolve_calls.push(payload.clone());

        if self.unresolvable.contains(payload) || !self.world.contains_key(payload) {
            debug!(%payload, "payload did not resolve");
            return Vec::new();
        }

        vec![self.mint(payload.clone(), AnchorStatus::Success)]
    }

    fn status(&self, anchor: AnchorHandle) -> AnchorStatus {
        self.live
            .get(&anchor)
            .map_or(AnchorStatus::Failed, |anchor| anchor.status)
    }

    fn payload(&self, anchor: AnchorHandle) -> Option<Payload> {
        self.live
            .get(&anchor)
            .filter(|anchor| anchor.status.is_saveable())
            .map(|anchor| anchor.payload.clone())
    }

    fn pose(&self, anchor: AnchorHandle) -> Option<Pose> {
        let anchor = self.live.get(&anchor)?;
        self.world.get(&anchor.payload).copied()
    }

    fn destroy_anchors(&mut self, anchors: &[AnchorHandle]) {
        for anchor in anchors {
            self.live.remove(anchor);
        }
    }

    fn restart(&mut self) {
        self.live.clear();
        self.state = LocalizationState::Localizing;
    }
}
