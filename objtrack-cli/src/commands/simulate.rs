//! `simulate` command: run the tracker against a scripted scene.
//!
//! Demo models are placed on a ring around an orbiting camera. The tracker
//! runs until the requested duration elapses or Ctrl-C is pressed, then a
//! summary (or JSON report) is printed.

use std::f32::consts::TAU;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use nalgebra::{UnitQuaternion, Vector3};
use tokio_util::sync::CancellationToken;

use objtrack::backend::{SceneObject, SharedCamera, SimulatedBackend};
use objtrack::catalog::{InMemoryCatalog, ModelCatalog, ModelEntry};
use objtrack::config::{DetectionStrategy, DiagnosticsConfig, TrackerConfig, TrackingStrategy};
use objtrack::diagnostics::{capture_enabled, DiagnosticsCapture, DirectoryStore};
use objtrack::events::event_queue;
use objtrack::geometry::{OrientedBox, Pose};
use objtrack::logging::init_logging;
use objtrack::model::ModelId;
use objtrack::orchestrator::{ObjectTracker, TrackerServices, TrackerStatus};
use objtrack::telemetry::TelemetrySnapshot;

use crate::error::CliError;

/// Distance of demo objects from the camera.
const RING_RADIUS: f32 = 2.0;
const ORBIT_STEP: Duration = Duration::from_millis(50);
const OBJECT_COVERAGE: f32 = 0.8;

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Run time in seconds (0 runs until Ctrl-C)
    #[arg(long, default_value_t = 10)]
    pub duration: u64,

    /// Number of demo models placed around the camera
    #[arg(long, default_value_t = 3)]
    pub models: usize,

    /// Tracking strategy override (auto, accurate, coarse, pause)
    #[arg(long)]
    pub tracking: Option<TrackingStrategy>,

    /// Detection strategy override (auto, manual)
    #[arg(long)]
    pub detection: Option<DetectionStrategy>,

    /// Enable search-area refinement
    #[arg(long)]
    pub refine: bool,

    /// Camera yaw rate in degrees per second
    #[arg(long, default_value_t = 30.0)]
    pub yaw_rate: f32,

    /// Make the first N detection calls fail
    #[arg(long, default_value_t = 0)]
    pub fail_first: usize,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the simulation.
pub fn run(
    args: SimulateArgs,
    mut config: TrackerConfig,
    verbose: u8,
    log_dir: Option<PathBuf>,
) -> Result<(), CliError> {
    if args.models == 0 {
        return Err(CliError::Usage("--models must be at least 1".to_string()));
    }
    if !args.yaw_rate.is_finite() {
        return Err(CliError::Usage("--yaw-rate must be a finite number".to_string()));
    }

    apply_overrides(&mut config, &args, verbose, log_dir);
    let _logging = init_logging(&config.logging)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    runtime.block_on(simulate(args, config))
}

fn apply_overrides(
    config: &mut TrackerConfig,
    args: &SimulateArgs,
    verbose: u8,
    log_dir: Option<PathBuf>,
) {
    if let Some(tracking) = args.tracking {
        config.strategy.tracking = tracking;
    }
    if let Some(detection) = args.detection {
        config.strategy.detection = detection;
    }
    if args.refine {
        config.strategy.area_refinement = true;
    }
    match verbose {
        0 => {}
        1 => config.logging.filter = "objtrack=debug,info".to_string(),
        _ => config.logging.filter = "trace".to_string(),
    }
    if log_dir.is_some() {
        config.logging.directory = log_dir;
    }
}

async fn simulate(args: SimulateArgs, config: TrackerConfig) -> Result<(), CliError> {
    let (sender, queue) = event_queue();
    let backend = Arc::new(SimulatedBackend::new(sender.clone()));
    backend.fail_next(args.fail_first);

    let catalog = demo_catalog(args.models);
    for (index, model_id) in catalog.model_ids().into_iter().enumerate() {
        backend.add_object(SceneObject::new(
            model_id,
            Pose::at(ring_position(index, args.models)),
            OBJECT_COVERAGE,
        ));
    }

    let camera = Arc::new(SharedCamera::new(Some(Pose::identity())));
    let mut diagnostics = start_diagnostics(&config.diagnostics)?;

    let tracker = ObjectTracker::new(
        config,
        TrackerServices::new(backend.clone(), Arc::new(catalog), camera.clone()),
        sender,
        queue,
    );
    let metrics = tracker.metrics();
    let status = tracker.shared_status();

    let token = CancellationToken::new();
    {
        let token = token.clone();
        ctrlc::set_handler(move || token.cancel())?;
    }

    tracing::info!(
        models = args.models,
        duration_secs = args.duration,
        "Starting simulation"
    );
    let orbit = tokio::spawn(orbit_camera(camera, args.yaw_rate, token.clone()));
    let tracker_task = tokio::spawn(tracker.run(token.clone()));

    if args.duration > 0 {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_secs(args.duration)) => token.cancel(),
        }
    } else {
        token.cancelled().await;
    }

    if let Err(e) = tracker_task.await {
        tracing::warn!(error = %e, "Tracker task ended abnormally");
    }
    if let Err(e) = orbit.await {
        tracing::warn!(error = %e, "Camera task ended abnormally");
    }

    if let Some(capture) = diagnostics.as_mut() {
        capture.stop_session().await;
        capture.upload_pending().await;
    }

    let status = status.get();
    let snapshot = metrics.snapshot();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&json_report(&status, &snapshot)?)?);
    } else {
        print_report(&status, &snapshot);
    }
    Ok(())
}

fn demo_catalog(count: usize) -> InMemoryCatalog {
    let mut catalog = InMemoryCatalog::new();
    for i in 0..count {
        let size = Vector3::new(0.4 + 0.2 * i as f32, 0.4 + 0.1 * i as f32, 0.5);
        catalog.insert(
            ModelEntry::new(
                ModelId::random(),
                OrientedBox::axis_aligned(Vector3::zeros(), size),
                0.5,
            )
            .with_name(format!("demo-{}", i)),
        );
    }
    catalog
}

/// Evenly spaced point on the ring around the origin.
fn ring_position(index: usize, count: usize) -> Vector3<f32> {
    let angle = TAU * index as f32 / count as f32;
    Vector3::new(RING_RADIUS * angle.sin(), 0.0, RING_RADIUS * angle.cos())
}

fn start_diagnostics(config: &DiagnosticsConfig) -> Result<Option<DiagnosticsCapture>, CliError> {
    let Some(directory) = &config.directory else {
        return Ok(None);
    };
    if !capture_enabled(directory, &config.sentinel_filename) {
        tracing::debug!(directory = %directory.display(), "Diagnostics sentinel absent");
        return Ok(None);
    }
    let mut capture = DiagnosticsCapture::new(Arc::new(DirectoryStore::new(directory)));
    capture.start_session()?;
    Ok(Some(capture))
}

async fn orbit_camera(camera: Arc<SharedCamera>, yaw_rate_degrees: f32, token: CancellationToken) {
    let start = Instant::now();
    let mut interval = tokio::time::interval(ORBIT_STEP);

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => break,

            _ = interval.tick() => {
                let yaw = (start.elapsed().as_secs_f32() * yaw_rate_degrees).to_radians();
                let orientation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw);
                camera.set(Some(Pose::new(Vector3::zeros(), orientation)));
            }
        }
    }
}

fn print_report(status: &TrackerStatus, metrics: &TelemetrySnapshot) {
    println!("Simulation finished");
    println!("===================");
    println!();
    println!("  Backend:     {}", status.backend_status);
    println!(
        "  Strategies:  tracking {}, detection {}",
        status.tracking_strategy, status.detection_strategy
    );
    println!("  Tracked:     {} instance(s)", status.tracked_count());
    println!(
        "  Detections:  {} attempted, {:.0}% succeeded",
        metrics.detections_attempted,
        metrics.detection_success_rate() * 100.0
    );
    println!("  Totals:      {}", metrics);

    if status.instances.is_empty() {
        return;
    }
    println!();
    for instance in status.instances.iter() {
        let position = instance
            .pose
            .map(|p| format!("({:.2}, {:.2}, {:.2})", p.position.x, p.position.y, p.position.z))
            .unwrap_or_else(|| "(not located)".to_string());
        println!(
            "  {}  model {}  {:<8} coverage {:.2}  {}",
            instance.instance_id, instance.model_id, instance.mode, instance.coverage, position
        );
    }
}

fn json_report(
    status: &TrackerStatus,
    metrics: &TelemetrySnapshot,
) -> Result<serde_json::Value, CliError> {
    let instances: Vec<serde_json::Value> = status
        .instances
        .iter()
        .map(|instance| {
            serde_json::json!({
                "instance_id": instance.instance_id.to_string(),
                "model_id": instance.model_id.to_string(),
                "mode": instance.mode.as_str(),
                "coverage": instance.coverage,
                "position": instance.pose.map(|p| [p.position.x, p.position.y, p.position.z]),
            })
        })
        .collect();

    Ok(serde_json::json!({
        "backend_status": status.backend_status.to_string(),
        "tracking_strategy": status.tracking_strategy.to_string(),
        "detection_strategy": status.detection_strategy.to_string(),
        "metrics": serde_json::to_value(metrics)?,
        "instances": instances,
    }))
}
