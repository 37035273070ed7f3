use std::process::ExitCode;
use std::sync::Arc;

use anchorland::math::{Quat, Vec3};
use anchorland::{
    AnchorApp, AnchorLedger, FileStore, Orientation, Pose, Prefab, PrefabRegistry, Settings,
    SimulatedAnchorService,
};
use rayon::ThreadPoolBuilder;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn builtin_prefabs() -> Vec<Prefab> {
    vec![
        Prefab::new("portal"),
        Prefab::new("banner").with_orientation(Orientation::Vertical),
        Prefab::new("lamp").with_scale(Vec3::splat(0.5)),
        Prefab::new("statue").with_scale(Vec3::new(1.0, 2.0, 1.0)),
    ]
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load_global()?;
    settings.validate()?;

    let registry = match &settings.prefabs_path {
        Some(path) => PrefabRegistry::import_json(&std::fs::read(path)?)?,
        None => PrefabRegistry::new(builtin_prefabs())?,
    };

    let store = FileStore::new(&settings.ledger_path)?;
    let ledger = AnchorLedger::new(
        Arc::new(registry),
        SimulatedAnchorService::localized(),
        Arc::new(store),
        settings.ledger_options(),
    );

    let thread_pool = Arc::new(
        ThreadPoolBuilder::new()
            .num_threads(settings.worker_threads)
            .build()?,
    );

    let mut app = AnchorApp::new(ledger);
    app.attach_loader(thread_pool);
    app.start_session()?;
    app.on_session_ran()?;

    for step in 0..4 {
        let x = step as f32 * 0.75;
        let pose = Pose::new(Vec3::new(x, 0.0, -2.0), Quat::from_rotation_y(x));
        app.place(&pose)?;
        app.select_next_prefab();
    }

    app.begin_save()?;
    app.wait_background()?;

    app.clear();

    app.begin_load()?;
    app.wait_background()?;

    for (_, instance) in app.scene().instances() {
        let name = app
            .registry()
            .get(instance.prefab)
            .map_or("?", |prefab| prefab.name.as_str());

        info!(
            prefab = name,
            position = %instance.transform.position,
            scale = %instance.transform.scale,
            "restored instance"
        );
    }

    info!(status = app.status(), path = ?settings.ledger_path, "done");

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
