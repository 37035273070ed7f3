use std::sync::Arc;

use rayon::ThreadPool;
use tracing::{debug, info, warn};

use crate::asset::PrefabRegistry;
use crate::ledger::{AnchorLedger, LedgerError, LoadReport};
use crate::loader::{LedgerLoader, LoadResponse};
use crate::record::{AnchorRecord, PrefabRef};
use crate::scene::{Instance, InstanceId, Scene, Transform};
use crate::service::{AnchorHandle, AnchorService, AnchorStatus, LocalizationState, Pose};
use crate::session::{Session, SessionError, SessionState};

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("session is {0:?}, not running")]
    NotRunning(SessionState),

    #[error("prefab {0} is not in the registry")]
    UnknownPrefab(PrefabRef),

    #[error("instance {0:?} is not in the scene")]
    UnknownInstance(InstanceId),

    #[error("no background loader attached")]
    NoLoader,

    #[error("no background work in flight")]
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Placed(InstanceId),
    /// The service has not localized the device yet.
    NotLocalized,
    /// The service returned no anchor for the pose.
    Rejected,
}

/// Anchor placement demo: session lifecycle, the ledger, and the live scene
/// built from it.
pub struct AnchorApp<S> {
    session: Session,
    ledger: AnchorLedger<S>,
    scene: Scene,
    selected: PrefabRef,
    status: String,
    loader: Option<LedgerLoader>,
}

impl<S: AnchorService> AnchorApp<S> {
    pub fn new(ledger: AnchorLedger<S>) -> Self {
        let mut app = Self {
            session: Session::new(),
            ledger,
            scene: Scene::new(),
            selected: PrefabRef::new(0),
            status: String::new(),
            loader: None,
        };

        app.set_status("Initializing session.");
        app
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn localization_state(&self) -> LocalizationState {
        self.ledger.service().localization_state()
    }

    pub fn ledger(&self) -> &AnchorLedger<S> {
        &self.ledger
    }

    pub fn service_mut(&mut self) -> &mut S {
        self.ledger.service_mut()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn registry(&self) -> &Arc<PrefabRegistry> {
        self.ledger.registry()
    }

    pub fn start_session(&mut self) -> Result<(), AppError> {
        self.session.initialize()?;
        self.set_status("Session initialized.");
        Ok(())
    }

    pub fn on_session_ran(&mut self) -> Result<(), AppError> {
        self.session.on_ran()?;
        self.set_status("Session running.");
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), AppError> {
        match self.session.pause() {
            Ok(()) => {
                self.set_status("AR session paused.");
                Ok(())
            }
            Err(err) => {
                self.set_status("Cannot pause AR session.");
                Err(err.into())
            }
        }
    }

    pub fn resume(&mut self) -> Result<(), AppError> {
        match self.session.resume() {
            Ok(()) => {
                self.set_status("AR session resumed.");
                Ok(())
            }
            Err(err) => {
                self.set_status("Cannot resume AR session.");
                Err(err.into())
            }
        }
    }

    pub fn restart_service(&mut self) {
        self.ledger.service_mut().restart();
        self.set_status("Anchor service restarted.");
    }

    pub fn selected_prefab(&self) -> PrefabRef {
        self.selected
    }

    pub fn select_prefab(&mut self, prefab: PrefabRef) -> Result<(), AppError> {
        if !self.registry().contains(prefab) {
            return Err(AppError::UnknownPrefab(prefab));
        }

        self.selected = prefab;
        Ok(())
    }

    pub fn select_next_prefab(&mut self) -> PrefabRef {
        let count = self.registry().len();

        if count > 0 {
            self.selected = PrefabRef::new((self.selected.index() + 1) % count);
        }

        self.selected
    }

    pub fn select_previous_prefab(&mut self) -> PrefabRef {
        let count = self.registry().len();

        if count > 0 {
            let index = match self.selected.index() {
                0 => count - 1,
                index => (index - 1).min(count - 1),
            };
            self.selected = PrefabRef::new(index);
        }

        self.selected
    }

    /// Anchors the selected prefab at `pose`.
    ///
    /// The instance appears immediately; it is written to the ledger once the
    /// service reports its anchor as saveable (see [`update`](Self::update)).
    pub fn place(&mut self, pose: &Pose) -> Result<Placement, AppError> {
        if !self.session.is_running() {
            return Err(AppError::NotRunning(self.session.state()));
        }

        let registry = self.registry().clone();
        let prefab = registry
            .get(self.selected)
            .ok_or(AppError::UnknownPrefab(self.selected))?;

        if self.localization_state() != LocalizationState::Localized {
            self.set_status("Must localize before placing anchor.");
            return Ok(Placement::NotLocalized);
        }

        let anchored = Pose {
            position: pose.position,
            rotation: prefab.placement_rotation(pose.rotation),
            scale: pose.scale,
        };

        let anchors = self.ledger.service_mut().create_anchors(&anchored);

        let Some(&anchor) = anchors.first() else {
            self.set_status("Anchor placement failed.");
            return Ok(Placement::Rejected);
        };

        let transform = Transform::from_pose(&anchored, pose.scale * prefab.scale);
        let id = self
            .scene
            .spawn(Instance::new(anchor, self.selected, transform));

        self.update();
        self.set_status("Anchor placed.");

        Ok(Placement::Placed(id))
    }

    /// Records anchors the service has confirmed since the last call and
    /// drops the ones it gave up on. Returns how many were recorded.
    pub fn update(&mut self) -> usize {
        let mut recorded = 0;
        let mut lost = Vec::new();

        for (id, instance) in self.scene.instances_mut() {
            if instance.is_confirmed() {
                continue;
            }

            match self.ledger.service().status(instance.anchor) {
                AnchorStatus::Pending => {}
                AnchorStatus::Failed => lost.push(id),
                AnchorStatus::Limited | AnchorStatus::Success => {
                    match self.ledger.record_anchor(
                        instance.anchor,
                        instance.prefab,
                        instance.transform.scale,
                    ) {
                        Ok(record) => {
                            instance.record = Some(record);
                            recorded += 1;
                        }
                        Err(err) => warn!(anchor = ?instance.anchor, "cannot record anchor: {err}"),
                    }
                }
            }
        }

        if !lost.is_empty() {
            let anchors: Vec<AnchorHandle> = lost
                .into_iter()
                .filter_map(|id| self.scene.despawn(id))
                .map(|instance| instance.anchor)
                .collect();

            warn!(count = anchors.len(), "dropping anchors the service failed to place");
            self.ledger.service_mut().destroy_anchors(&anchors);
        }

        recorded
    }

    /// Moves, turns or rescales an instance in its own local space.
    ///
    /// The anchor and the ledger keep the old placement until
    /// [`reanchor_all`](Self::reanchor_all) runs.
    pub fn modify(&mut self, id: InstanceId, edit: Transform) -> Result<(), AppError> {
        let instance = self
            .scene
            .instance_mut(id)
            .ok_or(AppError::UnknownInstance(id))?;

        instance.transform = instance.transform * edit;
        debug!(?id, transform = ?instance.transform, "instance modified");

        self.set_status("Anchor modified.");
        Ok(())
    }

    /// Replaces every instance's anchor with a fresh one at its current
    /// transform, and its ledger record with one carrying the new payload
    /// and scale. Instances the service cannot re-anchor keep their old
    /// anchor and record. Returns how many were re-anchored.
    pub fn reanchor_all(&mut self) -> Result<usize, AppError> {
        if !self.session.is_running() {
            return Err(AppError::NotRunning(self.session.state()));
        }

        if self.localization_state() != LocalizationState::Localized {
            self.set_status("Must localize before placing anchor.");
            return Ok(0);
        }

        let mut replaced = Vec::new();

        for (id, instance) in self.scene.instances_mut() {
            let anchors = self
                .ledger
                .service_mut()
                .create_anchors(&instance.transform.pose());

            let Some((&anchor, extra)) = anchors.split_first() else {
                warn!(?id, "service refused to re-anchor instance");
                continue;
            };

            if !extra.is_empty() {
                self.ledger.service_mut().destroy_anchors(extra);
            }

            if let Some(record) = instance.record.take() {
                self.ledger.remove(record);
            }

            replaced.push(std::mem::replace(&mut instance.anchor, anchor));
        }

        self.ledger.service_mut().destroy_anchors(&replaced);
        self.update();

        let count = replaced.len();
        self.set_status(format!("Re-anchored {count} anchors."));

        Ok(count)
    }

    pub fn save(&mut self) -> Result<usize, AppError> {
        self.update();

        match self.ledger.save() {
            Ok(count) => {
                self.set_status(format!("Saved {count} anchors."));
                Ok(count)
            }
            Err(err) => {
                self.set_status(format!("Save failed: {err}"));
                Err(err.into())
            }
        }
    }

    /// Replaces the scene with the anchors restored from the ledger slot.
    pub fn load(&mut self) -> Result<LoadReport, AppError> {
        match self.ledger.load() {
            Ok(report) => {
                self.apply_report(&report);
                Ok(report)
            }
            Err(err) => {
                self.set_status(format!("Load failed: {err}"));
                Err(err.into())
            }
        }
    }

    /// Destroys every live instance and empties the ledger. Storage keeps
    /// its contents until the next save.
    pub fn clear(&mut self) -> usize {
        if self.ledger.is_empty() && self.scene.is_empty() {
            self.set_status("No anchors to clear.");
            return 0;
        }

        let mut anchors = Vec::new();

        for record in self.ledger.clear() {
            if let Some(instance) = self
                .scene
                .find_by_record(record)
                .and_then(|id| self.scene.despawn(id))
            {
                anchors.push(instance.anchor);
            }
        }

        // Placements still waiting on the service have no record yet.
        anchors.extend(self.scene.despawn_all().into_iter().map(|i| i.anchor));

        self.ledger.service_mut().destroy_anchors(&anchors);
        self.set_status("Cleared anchors.");

        anchors.len()
    }

    pub fn attach_loader(&mut self, thread_pool: Arc<ThreadPool>) {
        self.loader = Some(self.ledger.loader(thread_pool));
    }

    /// Starts writing the current ledger on the loader's thread pool.
    pub fn begin_save(&mut self) -> Result<(), AppError> {
        self.update();

        let snapshot: Vec<AnchorRecord> = self.ledger.snapshot();
        self.loader.as_ref().ok_or(AppError::NoLoader)?.save_async(snapshot);
        self.set_status("Saving anchors...");

        Ok(())
    }

    pub fn begin_load(&mut self) -> Result<(), AppError> {
        self.loader.as_ref().ok_or(AppError::NoLoader)?.load_async();
        self.set_status("Loading anchors...");

        Ok(())
    }

    /// Applies every background result that has arrived. Never blocks.
    pub fn poll_background(&mut self) -> Result<usize, AppError> {
        let responses: Vec<LoadResponse> = match &self.loader {
            Some(loader) => loader.poll().collect(),
            None => return Ok(0),
        };

        let count = responses.len();

        for response in responses {
            self.handle_response(response)?;
        }

        Ok(count)
    }

    /// Blocks for the next background result and applies it. Fails with
    /// [`AppError::Idle`] instead of blocking when nothing was started.
    pub fn wait_background(&mut self) -> Result<(), AppError> {
        let response = self
            .loader
            .as_ref()
            .ok_or(AppError::NoLoader)?
            .wait()
            .ok_or(AppError::Idle)?;

        self.handle_response(response)
    }

    fn handle_response(&mut self, response: LoadResponse) -> Result<(), AppError> {
        match response {
            LoadResponse::Saved(count) => {
                self.set_status(format!("Saved {count} anchors."));
                Ok(())
            }
            LoadResponse::Loaded(records) => match self.ledger.restore(records) {
                Ok(report) => {
                    self.apply_report(&report);
                    Ok(())
                }
                Err(err) => {
                    self.set_status(format!("Load failed: {err}"));
                    Err(err.into())
                }
            },
            LoadResponse::LoadFailed(err) => {
                self.set_status(format!("Load failed: {err}"));
                Err(err.into())
            }
            LoadResponse::SaveFailed(err) => {
                self.set_status(format!("Save failed: {err}"));
                Err(err.into())
            }
        }
    }

    fn apply_report(&mut self, report: &LoadReport) {
        let stale: Vec<AnchorHandle> = self
            .scene
            .despawn_all()
            .into_iter()
            .map(|instance| instance.anchor)
            .collect();
        self.ledger.service_mut().destroy_anchors(&stale);

        for resolved in &report.resolved {
            let pose = self
                .ledger
                .service()
                .pose(resolved.anchor)
                .unwrap_or_default();

            let instance = Instance::new(
                resolved.anchor,
                resolved.prefab,
                Transform::from_pose(&pose, resolved.scale),
            )
            .with_record(resolved.record);

            self.scene.spawn(instance);
        }

        self.set_status(load_status(report));
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        info!(status = %self.status);
    }
}

fn load_status(report: &LoadReport) -> String {
    let loaded = report.resolved.len();

    match report.failed_indices().as_slice() {
        [] if loaded == 0 => "No anchors to load.".to_owned(),
        [] => format!("Loaded {loaded} anchors."),
        [index] => format!("Loaded {loaded} anchors; anchor {index} could not be resolved."),
        indices => {
            let list: Vec<String> = indices.iter().map(ToString::to_string).collect();
            format!(
                "Loaded {loaded} anchors; anchors {} could not be resolved.",
                list.join(", ")
            )
        }
    }
}
