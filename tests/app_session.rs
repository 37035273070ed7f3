use std::sync::Arc;

use anchorland::math::{Quat, Vec3};
use anchorland::service::LocalizationState;
use anchorland::{
    AnchorApp, AnchorLedger, AnchorService, FailurePolicy, FileStore, LedgerFormat, Placement,
    Pose, Prefab, PrefabRef, PrefabRegistry, Settings, SimulatedAnchorService,
};

fn app(settings: &Settings, service: SimulatedAnchorService) -> AnchorApp<SimulatedAnchorService> {
    settings.validate().unwrap();

    let registry = PrefabRegistry::new(vec![
        Prefab::new("portal"),
        Prefab::new("lamp").with_scale(Vec3::splat(0.5)),
    ])
    .unwrap();

    let ledger = AnchorLedger::new(
        Arc::new(registry),
        service,
        Arc::new(FileStore::new(&settings.ledger_path).unwrap()),
        settings.ledger_options(),
    );

    let mut app = AnchorApp::new(ledger);
    app.start_session().unwrap();
    app.on_session_ran().unwrap();
    app
}

#[test]
fn anchors_survive_a_service_restart() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        ledger_path: dir.path().join("anchors.txt"),
        format: LedgerFormat::Lines,
        ..Settings::default()
    };

    let mut app = app(&settings, SimulatedAnchorService::localized());

    let first = Pose::new(Vec3::new(0.0, 0.0, -1.0), Quat::IDENTITY);
    let second = Pose::new(Vec3::new(2.0, 0.0, -1.0), Quat::from_rotation_y(1.0));

    assert!(matches!(app.place(&first).unwrap(), Placement::Placed(_)));
    app.select_prefab(PrefabRef::new(1)).unwrap();
    assert!(matches!(app.place(&second).unwrap(), Placement::Placed(_)));
    app.save().unwrap();

    app.restart_service();
    assert_eq!(app.localization_state(), LocalizationState::Localizing);
    app.service_mut()
        .set_localization_state(LocalizationState::Localized);

    app.clear();
    let report = app.load().unwrap();

    assert_eq!(report.resolved.len(), 2);
    assert_eq!(app.status(), "Loaded 2 anchors.");

    let scales: Vec<Vec3> = app
        .scene()
        .instances()
        .map(|(_, instance)| instance.transform.scale)
        .collect();
    assert_eq!(scales, [Vec3::ONE, Vec3::splat(0.5)]);

    assert_eq!(app.ledger().service().localization_state(), LocalizationState::Localized);
}

#[test]
fn skip_policy_keeps_resolving_after_failure() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        ledger_path: dir.path().join("anchors.json"),
        failure_policy: FailurePolicy::SkipAndContinue,
        ..Settings::default()
    };

    let mut app = app(&settings, SimulatedAnchorService::localized());

    for x in [0.0, 1.0, 2.0] {
        app.place(&Pose::new(Vec3::new(x, 0.0, 0.0), Quat::IDENTITY))
            .unwrap();
    }
    app.save().unwrap();

    let first = app.ledger().snapshot()[0].payload.clone();
    app.service_mut().fail_resolution(first);

    let report = app.load().unwrap();

    assert_eq!(report.failed_indices(), [0]);
    assert_eq!(report.resolved.len(), 2);
    assert!(!report.halted);
    assert_eq!(
        app.status(),
        "Loaded 2 anchors; anchor 0 could not be resolved."
    );
}
