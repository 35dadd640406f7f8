//! Main navigation executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Request frames from both cameras
//!         - Hand each frame to the navigation loop, which runs a cycle for the active camera:
//!             - Feature extraction
//!             - Navigation control and visual servoing
//!             - Velocity command and diagnostics publishing
//!     - On Ctrl-C, or on a fatal navigation error, stop the robot and end the session

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::{WrapErr, eyre}};
use log::{debug, error, info, warn};
use std::{
    path::PathBuf,
    sync::{Arc, atomic::{AtomicBool, Ordering}},
    thread,
    time::{Duration, Instant}
};
use structopt::StructOpt;

// Internal
use comms_if::{eqpt::cam::{CamId, ImageFormat}, net::zmq};
use nav_lib::{
    cam_client::{CamClient, CamClientError},
    diag_server::DiagServer,
    feature::{replay::ReplayExtractor, FeatureParams},
    nav_ctrl::{LineConfirmation, NavCtrl, Params as NavCtrlParams},
    nav_loop::{NavLoop, NavLoopError},
    params::NavExecParams,
    vel_client::VelClient
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Crop row navigation executable
#[derive(Debug, StructOpt)]
#[structopt(name = "nav_exec")]
struct Opt {
    /// Executable parameter file, relative to the params directory
    #[structopt(short, long, default_value = "nav_exec.toml")]
    params: String,

    /// Recorded feature extractor results to replay, overrides the parameter file
    #[structopt(short, long, parse(from_os_str))]
    replay: Option<PathBuf>,

    /// Run without sending velocity commands
    #[structopt(short, long)]
    debug: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    let opt = Opt::from_args();

    // Initialise session
    let session = Session::new(
        "nav_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Crop Row Navigation Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let exec_params: NavExecParams = util::params::load(&opt.params)
        .wrap_err("Could not load nav_exec params")?;
    exec_params.validate()
        .wrap_err("Invalid nav_exec params")?;

    let nav_ctrl_params: NavCtrlParams = util::params::load(&exec_params.nav_ctrl_params)
        .wrap_err("Could not load nav_ctrl params")?;

    let feature_params: FeatureParams = util::params::load(&exec_params.feature_params)
        .wrap_err("Could not load feature params")?;
    feature_params.validate()
        .wrap_err("Invalid feature params")?;

    let debug_mode = opt.debug || exec_params.debug;

    info!("Exec parameters loaded");

    // Keep a record of exactly what this session ran with
    for (path, result) in [
        ("params/nav_exec.json", session.save_json("params/nav_exec.json", &exec_params)),
        ("params/nav_ctrl.json", session.save_json("params/nav_ctrl.json", &nav_ctrl_params)),
        ("params/feature.json", session.save_json("params/feature.json", &feature_params)),
    ].iter() {
        if let Err(e) = result {
            warn!("Could not save the {} parameter snapshot: {}", path, e);
        }
    }

    // ---- INITIALISE NAVIGATION ----

    // Replay file from the command line, otherwise from the params relative to the root
    let replay_path = match (&opt.replay, &exec_params.replay_path) {
        (Some(p), _) => p.clone(),
        (None, Some(p)) => {
            let mut path = host::get_sw_root()
                .wrap_err("The software root environment variable is not set")?;
            path.push(p);
            path
        },
        (None, None) => return Err(eyre!(
            "No feature extractor available, provide a replay file with --replay or in the \
            nav_exec parameters"
        ))
    };

    info!("Replaying feature extractor results from {:?}", replay_path);
    let extractor = ReplayExtractor::from_path(&replay_path, feature_params)
        .wrap_err("Failed to load the replay file")?;

    let require_confirmation = nav_ctrl_params.require_mode_confirmation;
    let mut nav_ctrl = NavCtrl::new(nav_ctrl_params, extractor)
        .wrap_err("Failed to initialise NavCtrl")?;
    if require_confirmation {
        nav_ctrl = nav_ctrl.with_confirmation(Box::new(LineConfirmation::stdin()));
    }

    info!("NavCtrl init complete");

    // ---- INITIALISE NETWORK ----

    let zmq_ctx = zmq::Context::new();

    let vel_client = VelClient::new(&zmq_ctx, &exec_params.net)
        .wrap_err("Failed to initialise the velocity client")?;
    info!("Velocity client initialised");

    // Diagnostics are optional
    let diag_server = match DiagServer::new(&zmq_ctx, &exec_params.net) {
        Ok(d) => {
            info!("Diagnostics server initialised");
            Some(d)
        },
        Err(e) => {
            warn!("Diagnostics server unavailable, continuing without it: {}", e);
            None
        }
    };

    let mut cam_client = CamClient::new(&zmq_ctx, &exec_params.net)
        .wrap_err("Failed to initialise the camera client")?;
    info!("Camera client initialised");

    let nav_loop = NavLoop::new(
        nav_ctrl,
        vel_client,
        diag_server,
        debug_mode,
        exec_params.image_resize_ratio,
        ImageFormat::Jpeg(exec_params.diag_jpeg_quality)
    );
    nav_loop.start_archiving(&session)
        .wrap_err("Failed to start archiving")?;

    // ---- SIGNAL HANDLING ----

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }).wrap_err("Failed to set the Ctrl-C handler")?;

    info!("Initialisation complete, starting main loop\n");

    // ---- MAIN LOOP ----

    let cycle_period = Duration::from_secs_f64(exec_params.cycle_period_s);
    let mut result = Ok(());

    while running.load(Ordering::SeqCst) {
        let cycle_start = Instant::now();

        // Ask for new frames, if the last request is still outstanding keep waiting for it
        match cam_client.request_frames(ImageFormat::Png) {
            Ok(()) | Err(CamClientError::WaitingForResponse) => (),
            Err(e) => warn!("Could not request camera frames: {}", e)
        }

        let images = match cam_client.receive_images() {
            Ok(i) => i,
            Err(e) => {
                warn!("Could not recieve camera frames: {}", e);
                None
            }
        };

        if let Some(mut images) = images {
            // Frames from the inactive camera are cached first so a hand-off in this cycle can
            // use them
            let active = match nav_loop.active_camera() {
                Ok(c) => c,
                Err(e) => {
                    result = Err(e);
                    break
                }
            };

            for cam in [active.other(), active].iter() {
                if let Some(img) = images.remove(cam) {
                    if let Err(e) = nav_loop.on_frame(*cam, &img.image) {
                        result = Err(e);
                        break
                    }
                }
            }

            if result.is_err() {
                break
            }
        }

        // Sleep until the end of the cycle
        let elapsed = cycle_start.elapsed();
        if elapsed < cycle_period {
            thread::sleep(cycle_period - elapsed);
        }
        else {
            debug!(
                "Cycle overran by {:.06} s",
                (elapsed - cycle_period).as_secs_f64()
            );
        }
    }

    // ---- SHUTDOWN ----

    match &result {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => error!("Navigation stopped: {}", e)
    }

    nav_loop.halt().wrap_err("Failed to halt the navigation loop")?;

    if let Ok(state) = nav_loop.with_nav_ctrl(|nc| nc.state().clone()) {
        info!(
            "Final mode {} ({}), {} camera active",
            state.mode,
            state.phase.name(),
            CamId::from_front_flag(state.active_cam_front)
        );
    }

    session.exit();

    result.map_err(|e: NavLoopError| Report::new(e))
}
