//! Navigation control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use image::{GrayImage, RgbImage};
use log::{debug, info, warn};
use serde::Serialize;

// Internal
use super::{ModeConfirmation, NavCtrlError, NavMode, Params};
use crate::{
    feature::FeatureExtractor,
    vs_ctrl::{self, CameraModel, ConfigurationError, PoseError}
};
use comms_if::eqpt::{cam::CamId, vel::ControlCommand};
use util::{
    archive::{Archived, Archiver, ArchiveError},
    maths::clamp,
    params,
    session::{self, Session}
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Navigation control state machine.
pub struct NavCtrl<E: FeatureExtractor> {
    params: Params,

    cam: CameraModel,

    extractor: E,

    confirmation: Option<Box<dyn ModeConfirmation + Send>>,

    state: ControllerState,

    report: StatusReport,
    arch_report: Archiver,
}

/// The state carried from one cycle to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    /// Current navigation mode
    pub mode: NavMode,

    /// Direction of travel, `+1` forward and `-1` backward
    pub travel_dir: i8,

    /// Direction of rotation, `-1` in exiting modes and `+1` otherwise
    pub rotation_dir: i8,

    /// True if the front camera is the active one
    pub active_cam_front: bool,

    /// Most recent scaled angular commands, oldest first.
    ///
    /// Units: radians/second
    pub omega_history: VecDeque<f64>,

    /// Number of consecutive cycles in which no row was found
    pub num_consec_no_detection: u64,

    /// Number of consecutive failed extractor initialisations
    pub num_init_failures: u32,

    /// Phase of the current mode
    pub phase: NavPhase,
}

/// Output of a single navigation cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleOutput {
    /// Command for the base, `None` if nothing should be sent this cycle
    pub cmd: Option<ControlCommand>,

    /// True if the active camera changed during the cycle
    pub camera_switch: bool,

    /// True if the cycle should be run again straight away on the new active camera's image
    pub rerun: bool,

    /// Overlay graphic from the feature extractor
    pub graphic: Option<RgbImage>,

    /// Binary vegetation mask from the feature extractor
    pub mask: Option<GrayImage>,

    /// Status report for the cycle
    pub report: StatusReport,
}

/// Status report for NavCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// Session time of the cycle
    pub time_s: f64,

    /// Mode at the end of the cycle
    pub nav_mode: u8,

    /// Phase at the end of the cycle
    pub phase: &'static str,

    pub active_cam_front: bool,

    /// True if the extractor found a row this cycle
    pub found: bool,

    /// Control law output before scaling and limiting
    pub omega_raw_rads: f64,

    /// Commanded angular velocity
    pub omega_rads: f64,

    /// Commanded forward velocity
    pub linear_ms: f64,

    /// Commanded sideways velocity
    pub lateral_ms: f64,

    /// True if the angular command was limited
    pub omega_limited: bool,

    /// True if the forward command was limited
    pub linear_limited: bool,

    pub travel_dir: i8,

    pub rotation_dir: i8,

    pub num_consec_no_detection: u64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Phase within the current navigation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavPhase {
    /// Following the crop row with visual servoing
    FollowingRow,

    /// Crawling sideways at the end of a row, waiting for the tracked features to converge on
    /// the next row
    Turning {
        /// Direction of the sideways crawl, `+1` left and `-1` right
        search_dir: i8,

        /// Number of search cycles so far
        num_search_cycles: u64,
    },

    /// A mode change is waiting for operator confirmation
    AwaitingConfirmation {
        pending: PendingAction
    },
}

/// Action taken once a mode change has been confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    /// Hand over to the other camera and keep following
    CameraHandoff,

    /// Stop and start an end of row turn
    BeginTurn,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<E: FeatureExtractor> NavCtrl<E> {
    /// Initialise the NavCtrl module.
    ///
    /// Expected init data is a path to the parameter file relative to the params directory.
    pub fn init(params_path: &str, extractor: E) -> Result<Self, NavCtrlError> {
        let params = params::load(params_path)
            .map_err(NavCtrlError::ParamLoadError)?;

        Self::new(params, extractor).map_err(NavCtrlError::ConfigError)
    }

    /// Create a new instance from already loaded parameters.
    pub fn new(params: Params, extractor: E) -> Result<Self, ConfigurationError> {
        params.validate()?;
        let cam = CameraModel::from_params(&params.camera)?;

        let state = ControllerState::new(params.initial_mode, params.omega_history_len);

        info!(
            "NavCtrl starting in mode {} with the {} camera",
            state.mode,
            state.active_camera()
        );

        Ok(Self {
            params,
            cam,
            extractor,
            confirmation: None,
            state,
            report: StatusReport::default(),
            arch_report: Archiver::default()
        })
    }

    /// Set the source of mode change confirmations.
    pub fn with_confirmation(mut self, confirmation: Box<dyn ModeConfirmation + Send>) -> Self {
        self.confirmation = Some(confirmation);
        self
    }

    /// Start archiving status reports into the session.
    pub fn init_archive(&mut self, session: &Session) -> Result<(), ArchiveError> {
        self.arch_report = Archiver::from_path(session, "nav_ctrl/status_report.csv")?;
        Ok(())
    }

    /// Run one navigation cycle on the active camera's image.
    pub fn proc(&mut self, image: &RgbImage) -> Result<CycleOutput, NavCtrlError> {
        self.report = StatusReport::default();
        self.extractor.set_image(image);

        let state = self.state.clone();

        let (state, mut output) = if !self.extractor.is_initialised() {
            match self.extractor.initialise() {
                Ok(()) => {
                    debug!("Feature extractor initialised");
                    let mut state = state;
                    state.num_init_failures = 0;
                    self.step(state, image.width())?
                },
                Err(e) => self.init_failed(state, e)?
            }
        }
        else {
            self.step(state, image.width())?
        };

        self.state = state;

        // Fill in the report
        self.report.time_s = session::get_elapsed_seconds();
        self.report.nav_mode = self.state.mode.index();
        self.report.phase = self.state.phase.name();
        self.report.active_cam_front = self.state.active_cam_front;
        self.report.travel_dir = self.state.travel_dir;
        self.report.rotation_dir = self.state.rotation_dir;
        self.report.num_consec_no_detection = self.state.num_consec_no_detection;
        if let Some(cmd) = output.cmd {
            self.report.linear_ms = cmd.linear_ms;
            self.report.lateral_ms = cmd.lateral_ms;
            self.report.omega_rads = cmd.angular_rads;
        }

        if output.graphic.is_none() {
            output.graphic = self.extractor.graphic();
        }
        output.report = self.report;

        let cmd = output.cmd.unwrap_or_default();
        info!(
            "m: {} p-cam: {} vel-x,y,z: {:.3}, {:.3}, {:.3} dir: {} rot: {}",
            self.state.mode,
            self.state.active_camera(),
            cmd.linear_ms,
            cmd.lateral_ms,
            cmd.angular_rads,
            self.state.travel_dir,
            self.state.rotation_dir
        );

        Ok(output)
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn camera_model(&self) -> &CameraModel {
        &self.cam
    }

    /// The camera whose images drive the state machine.
    pub fn active_camera(&self) -> CamId {
        self.state.active_camera()
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn extractor_mut(&mut self) -> &mut E {
        &mut self.extractor
    }
}

impl<E: FeatureExtractor> NavCtrl<E> {
    /// Run the current phase.
    fn step(
        &mut self,
        state: ControllerState,
        image_width: u32
    ) -> Result<(ControllerState, CycleOutput), NavCtrlError> {
        match state.phase {
            NavPhase::FollowingRow => Ok(self.phase_following(state, image_width)),
            NavPhase::Turning { search_dir, num_search_cycles } =>
                self.phase_turning(state, search_dir, num_search_cycles),
            NavPhase::AwaitingConfirmation { pending } =>
                Ok(self.phase_awaiting_confirmation(state, pending))
        }
    }

    /// The extractor could not be initialised, try the other camera on the next cycle.
    ///
    /// The mode is left alone, so if the other camera initialises the row is followed with the
    /// camera the mode does not normally use. The camera is brought back in line with the mode
    /// at the next mode change.
    fn init_failed(
        &mut self,
        mut state: ControllerState,
        error: crate::feature::ExtractorError
    ) -> Result<(ControllerState, CycleOutput), NavCtrlError> {
        state.num_init_failures += 1;

        warn!(
            "Feature extractor initialisation failed on the {} camera ({} in a row): {}",
            state.active_camera(),
            state.num_init_failures,
            error
        );

        if let Some(max) = self.params.max_init_attempts {
            if state.num_init_failures > max {
                return Err(NavCtrlError::InitAttemptsExceeded(state.num_init_failures))
            }
        }

        state.active_cam_front = !state.active_cam_front;
        info!("Switching to the {} camera", state.active_camera());

        Ok((state, CycleOutput {
            cmd: Some(ControlCommand::stop()),
            camera_switch: true,
            ..Default::default()
        }))
    }

    /// Follow the row, or advance the mode if it has been lost.
    fn phase_following(
        &mut self,
        state: ControllerState,
        image_width: u32
    ) -> (ControllerState, CycleOutput) {
        let detection = self.extractor.update_lines_at_windows();
        self.report.found = detection.found;

        if detection.found {
            let desired = PoseError::new(0.0, image_width as f64 / 2.0, 0.0);

            match vs_ctrl::compute_angular_velocity(
                &self.cam,
                &desired,
                &detection.pose,
                self.params.desired_linear_vel_ms
            ) {
                Ok(omega_raw) => return self.follow_row(state, omega_raw, detection.mask),
                Err(e) => {
                    warn!("Invalid row pose from the extractor, treating as no row: {}", e);
                    self.report.found = false;
                }
            }
        }

        self.row_lost(state, detection.mask)
    }

    fn follow_row(
        &mut self,
        mut state: ControllerState,
        omega_raw: f64,
        mask: Option<GrayImage>
    ) -> (ControllerState, CycleOutput) {
        state.rotation_dir = if state.mode.is_exiting() { -1 } else { 1 };
        state.num_consec_no_detection = 0;

        let omega = self.params.omega_scaler * omega_raw;
        let omega_clamped = clamp(
            &omega,
            &self.params.min_angular_vel_rads,
            &self.params.max_angular_vel_rads
        );

        let linear = self.params.base_forward_speed_ms * state.travel_dir as f64;
        let linear_clamped = clamp(
            &linear,
            &self.params.min_linear_vel_ms,
            &self.params.max_linear_vel_ms
        );

        state.push_omega(omega, self.params.omega_history_len);

        self.report.omega_raw_rads = omega_raw;
        self.report.omega_limited = omega_clamped != omega;
        self.report.linear_limited = linear_clamped != linear;

        (state, CycleOutput {
            cmd: Some(ControlCommand {
                linear_ms: linear_clamped,
                lateral_ms: 0.0,
                angular_rads: omega_clamped
            }),
            mask,
            ..Default::default()
        })
    }

    /// No row was found, move on to the next mode.
    fn row_lost(
        &mut self,
        mut state: ControllerState,
        mask: Option<GrayImage>
    ) -> (ControllerState, CycleOutput) {
        // Make sure there's always a last known command
        if state.omega_history.is_empty() {
            state.omega_history.push_back(0.0);
        }
        state.num_consec_no_detection += 1;

        let prev_mode = state.mode;
        state.mode = state.mode.next();
        warn!("No row found in mode {}, advancing to mode {}", prev_mode, state.mode);

        let pending = if state.mode.is_exiting() {
            PendingAction::CameraHandoff
        }
        else {
            PendingAction::BeginTurn
        };

        let (state, mut output) = if self.params.require_mode_confirmation {
            state.phase = NavPhase::AwaitingConfirmation { pending };
            (state, CycleOutput {
                cmd: Some(ControlCommand::stop()),
                ..Default::default()
            })
        }
        else {
            self.apply_pending(state, pending)
        };

        output.mask = mask;
        (state, output)
    }

    /// Carry out the action a mode change requires.
    fn apply_pending(
        &mut self,
        mut state: ControllerState,
        pending: PendingAction
    ) -> (ControllerState, CycleOutput) {
        let camera_switch = state.active_cam_front != state.mode.uses_front_camera();
        state.active_cam_front = state.mode.uses_front_camera();
        if camera_switch {
            info!("Switching to the {} camera", state.active_camera());
        }

        match pending {
            PendingAction::CameraHandoff => {
                self.extractor.reset();
                state.phase = NavPhase::FollowingRow;

                (state, CycleOutput {
                    cmd: None,
                    camera_switch,
                    rerun: true,
                    ..Default::default()
                })
            },
            PendingAction::BeginTurn => {
                info!("End of row, turning into mode {}", state.mode);
                self.extractor.detect_tracking_features(state.mode);
                state.phase = NavPhase::Turning {
                    search_dir: self.params.lateral_search_dir,
                    num_search_cycles: 0
                };

                (state, CycleOutput {
                    cmd: Some(ControlCommand::stop()),
                    camera_switch,
                    ..Default::default()
                })
            }
        }
    }

    /// Search sideways for the next row.
    fn phase_turning(
        &mut self,
        mut state: ControllerState,
        search_dir: i8,
        num_search_cycles: u64
    ) -> Result<(ControllerState, CycleOutput), NavCtrlError> {
        let tracking = self.extractor.match_tracking_features(state.mode);

        if tracking.converged {
            state.travel_dir = -state.travel_dir;
            self.extractor.reset();
            state.phase = NavPhase::FollowingRow;

            info!(
                "New row found after {} search cycles, direction of travel is now {}",
                num_search_cycles,
                state.travel_dir
            );

            let travel_dir = state.travel_dir;
            return Ok((state, CycleOutput {
                cmd: Some(ControlCommand {
                    linear_ms: self.params.exit_nudge_speed_ms * travel_dir as f64,
                    lateral_ms: 0.0,
                    angular_rads: 0.0
                }),
                graphic: tracking.overlay,
                ..Default::default()
            }))
        }

        let num_search_cycles = num_search_cycles + 1;
        if let Some(max) = self.params.max_turn_search_cycles {
            if num_search_cycles > max {
                return Err(NavCtrlError::TurnSearchExceeded(num_search_cycles))
            }
        }

        debug!("Searching sideways for the next row");
        state.phase = NavPhase::Turning {
            search_dir,
            num_search_cycles
        };

        Ok((state, CycleOutput {
            cmd: Some(ControlCommand {
                linear_ms: 0.0,
                lateral_ms: self.params.lateral_search_speed_ms * search_dir as f64,
                angular_rads: 0.0
            }),
            graphic: tracking.overlay,
            ..Default::default()
        }))
    }

    /// Hold still until the pending mode change is confirmed.
    fn phase_awaiting_confirmation(
        &mut self,
        state: ControllerState,
        pending: PendingAction
    ) -> (ControllerState, CycleOutput) {
        let confirmed = match self.confirmation.as_mut() {
            Some(c) => c.is_confirmed(state.mode),
            None => true
        };

        if confirmed {
            info!("Switched to mode {}", state.mode);
            self.apply_pending(state, pending)
        }
        else {
            (state, CycleOutput {
                cmd: Some(ControlCommand::stop()),
                ..Default::default()
            })
        }
    }
}

impl<E: FeatureExtractor> Archived for NavCtrl<E> {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(self.report)
    }
}

impl ControllerState {
    /// Initial state for the given mode.
    pub fn new(mode: NavMode, history_len: usize) -> Self {
        Self {
            mode,
            travel_dir: mode.travel_direction(),
            rotation_dir: 1,
            active_cam_front: mode.uses_front_camera(),
            omega_history: VecDeque::with_capacity(history_len),
            num_consec_no_detection: 0,
            num_init_failures: 0,
            phase: NavPhase::FollowingRow
        }
    }

    pub fn active_camera(&self) -> CamId {
        CamId::from_front_flag(self.active_cam_front)
    }

    pub fn is_turning(&self) -> bool {
        matches!(self.phase, NavPhase::Turning { .. })
    }

    /// Most recent angular command, if any.
    pub fn last_omega(&self) -> Option<f64> {
        self.omega_history.back().copied()
    }

    fn push_omega(&mut self, omega: f64, history_len: usize) {
        while self.omega_history.len() >= history_len {
            self.omega_history.pop_front();
        }
        self.omega_history.push_back(omega);
    }
}

impl NavPhase {
    pub fn name(&self) -> &'static str {
        match self {
            NavPhase::FollowingRow => "FollowingRow",
            NavPhase::Turning { .. } => "Turning",
            NavPhase::AwaitingConfirmation { .. } => "AwaitingConfirmation",
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
