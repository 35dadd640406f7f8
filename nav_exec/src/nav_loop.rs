//! # Navigation loop
//!
//! Frames from both cameras arrive independently. Every frame is cached, but only a frame from
//! the currently active camera runs a navigation cycle. The state machine and the frame cache sit
//! behind one mutex so only one cycle can be in flight and a camera switch is applied before any
//! other frame is looked at.
//!
//! When a cycle hands over to the other camera it asks for a rerun, which is done straight away
//! on the cached frame of the new camera, at most once per incoming frame.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{collections::HashMap, sync::Mutex};

use image::{imageops::{self, FilterType}, DynamicImage, RgbImage};
use log::{debug, warn};

use comms_if::eqpt::{
    cam::{CamId, CamImage, ImageFormat},
    diag::DiagPacket,
    vel::ControlCommand
};
use util::{archive::{ArchiveError, Archived}, session::{self, Session}};

use crate::{
    diag_server::DiagServerError,
    feature::{exg, FeatureExtractor},
    nav_ctrl::{CycleOutput, NavCtrl, NavCtrlError},
    vel_client::VelClientError
};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Destination of velocity commands.
pub trait CommandSink {
    fn send_command(&mut self, cmd: &ControlCommand) -> Result<(), VelClientError>;
}

/// Destination of cycle diagnostics.
pub trait DiagSink {
    fn send_diag(&mut self, packet: &DiagPacket) -> Result<(), DiagServerError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The frame driven navigation loop.
pub struct NavLoop<E, C, D>
where
    E: FeatureExtractor,
    C: CommandSink,
    D: DiagSink
{
    inner: Mutex<LoopInner<E, C, D>>
}

struct LoopInner<E, C, D>
where
    E: FeatureExtractor,
    C: CommandSink,
    D: DiagSink
{
    nav_ctrl: NavCtrl<E>,

    /// Latest frame from each camera, already resized
    frames: HashMap<CamId, RgbImage>,

    cmd_sink: C,
    diag_sink: Option<D>,

    debug: bool,
    archiving: bool,
    resize_ratio: f64,
    diag_format: ImageFormat,

    halted: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum NavLoopError {
    #[error("Navigation control error: {0}")]
    NavCtrlError(NavCtrlError),

    #[error("Could not start archiving: {0}")]
    ArchiveError(ArchiveError),

    #[error("The navigation loop lock was poisoned by a panicking cycle")]
    Poisoned,

    #[error("The navigation loop has been halted")]
    Halted,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<E, C, D> NavLoop<E, C, D>
where
    E: FeatureExtractor,
    C: CommandSink,
    D: DiagSink
{
    /// Create a new loop.
    ///
    /// In debug mode commands are never sent to `cmd_sink`, everything else runs as normal.
    pub fn new(
        nav_ctrl: NavCtrl<E>,
        cmd_sink: C,
        diag_sink: Option<D>,
        debug: bool,
        resize_ratio: f64,
        diag_format: ImageFormat
    ) -> Self {
        if debug {
            warn!("Debug mode enabled, velocity commands will not be sent");
        }

        Self {
            inner: Mutex::new(LoopInner {
                nav_ctrl,
                frames: HashMap::new(),
                cmd_sink,
                diag_sink,
                debug,
                archiving: false,
                resize_ratio,
                diag_format,
                halted: false
            })
        }
    }

    /// Archive the status report of every cycle into the session.
    pub fn start_archiving(&self, session: &Session) -> Result<(), NavLoopError> {
        let mut inner = self.inner.lock().map_err(|_| NavLoopError::Poisoned)?;

        inner.nav_ctrl.init_archive(session).map_err(NavLoopError::ArchiveError)?;
        inner.archiving = true;

        Ok(())
    }

    /// Handle a new frame from a camera.
    ///
    /// Returns the outputs of the cycles which were run, empty if the frame was only cached.
    pub fn on_frame(
        &self,
        cam: CamId,
        image: &DynamicImage
    ) -> Result<Vec<CycleOutput>, NavLoopError> {
        let mut inner = self.inner.lock().map_err(|_| NavLoopError::Poisoned)?;

        if inner.halted {
            return Err(NavLoopError::Halted)
        }

        let frame = resize(image, inner.resize_ratio);
        inner.frames.insert(cam, frame);

        // Wait for both cameras before starting
        if inner.frames.len() < 2 {
            debug!("Waiting for frames from both cameras");
            return Ok(Vec::new())
        }

        if cam != inner.nav_ctrl.active_camera() {
            return Ok(Vec::new())
        }

        let mut outputs = Vec::with_capacity(2);

        let output = inner.run_cycle()?;
        let rerun = output.rerun;
        outputs.push(output);

        if rerun {
            debug!("Rerunning cycle on the {} camera", inner.nav_ctrl.active_camera());
            outputs.push(inner.run_cycle()?);
        }

        Ok(outputs)
    }

    /// Stop the loop, sending a final stop command unless in debug mode.
    ///
    /// Frames handed to the loop after this are rejected.
    pub fn halt(&self) -> Result<(), NavLoopError> {
        let mut inner = self.inner.lock().map_err(|_| NavLoopError::Poisoned)?;

        inner.halted = true;

        if inner.debug {
            return Ok(())
        }

        if let Err(e) = inner.cmd_sink.send_command(&ControlCommand::stop()) {
            warn!("Could not send the final stop command: {}", e);
        }

        Ok(())
    }

    /// The camera currently driving navigation.
    pub fn active_camera(&self) -> Result<CamId, NavLoopError> {
        let inner = self.inner.lock().map_err(|_| NavLoopError::Poisoned)?;
        Ok(inner.nav_ctrl.active_camera())
    }

    /// Run a closure with access to the state machine.
    pub fn with_nav_ctrl<T, F: FnOnce(&NavCtrl<E>) -> T>(&self, f: F) -> Result<T, NavLoopError> {
        let inner = self.inner.lock().map_err(|_| NavLoopError::Poisoned)?;
        Ok(f(&inner.nav_ctrl))
    }

    /// Give back the parts of the loop.
    pub fn into_parts(self) -> Result<(NavCtrl<E>, C, Option<D>), NavLoopError> {
        let inner = self.inner.into_inner().map_err(|_| NavLoopError::Poisoned)?;
        Ok((inner.nav_ctrl, inner.cmd_sink, inner.diag_sink))
    }
}

impl<E, C, D> LoopInner<E, C, D>
where
    E: FeatureExtractor,
    C: CommandSink,
    D: DiagSink
{
    /// Run a cycle on the active camera's cached frame and route its outputs.
    fn run_cycle(&mut self) -> Result<CycleOutput, NavLoopError> {
        let cam = self.nav_ctrl.active_camera();

        // A frame from every camera is cached before the first cycle so this only misses if
        // the cache was cleared
        let frame = match self.frames.get(&cam) {
            Some(f) => f.clone(),
            None => return Ok(CycleOutput::default())
        };

        let output = match self.nav_ctrl.proc(&frame) {
            Ok(o) => o,
            Err(e) => {
                // Fatal, hold the robot before giving up
                if !self.debug {
                    if let Err(se) = self.cmd_sink.send_command(&ControlCommand::stop()) {
                        warn!("Could not send stop command: {}", se);
                    }
                }
                return Err(NavLoopError::NavCtrlError(e))
            }
        };

        if self.archiving {
            if let Err(e) = self.nav_ctrl.write() {
                warn!("Could not archive the NavCtrl status report: {}", e);
            }
        }

        if let Some(cmd) = output.cmd {
            if !self.debug {
                if let Err(e) = self.cmd_sink.send_command(&cmd) {
                    warn!("Could not send velocity command: {}", e);
                }
            }
        }

        if let Some(sink) = self.diag_sink.as_mut() {
            let packet = build_diag_packet(
                &output,
                &frame,
                self.nav_ctrl.active_camera(),
                self.diag_format
            );
            if let Err(e) = sink.send_diag(&packet) {
                warn!("Could not send diagnostics: {}", e);
            }
        }

        Ok(output)
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build the diagnostics packet for a cycle.
///
/// Images which fail to encode are left out of the packet.
pub fn build_diag_packet(
    output: &CycleOutput,
    frame: &RgbImage,
    active_cam: CamId,
    format: ImageFormat
) -> DiagPacket {
    let graphic = output.graphic.as_ref()
        .map(|g| DynamicImage::ImageRgb8(g.clone()));
    let mask = output.mask.as_ref()
        .map(|m| DynamicImage::ImageLuma8(m.clone()));
    let exg = DynamicImage::ImageLuma8(exg::excess_green(frame));

    DiagPacket {
        time_s: session::get_elapsed_seconds(),
        nav_mode: output.report.nav_mode,
        phase: output.report.phase.to_string(),
        active_cam,
        cmd: output.cmd,
        graphic: graphic.and_then(|i| encode("graphic", i, format)),
        // Masks are binary, JPEG would blur the edges
        mask: mask.and_then(|i| encode("mask", i, ImageFormat::Png)),
        exg: encode("exg", exg, format),
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn encode(
    name: &'static str,
    image: DynamicImage,
    format: ImageFormat
) -> Option<comms_if::eqpt::cam::CamFrame> {
    match CamImage::now(image).to_cam_frame(format) {
        Ok(f) => Some(f),
        Err(e) => {
            warn!("{}", DiagServerError::ImageEncodeError(name, e));
            None
        }
    }
}

/// Resize an image by the given ratio and convert it to RGB.
fn resize(image: &DynamicImage, ratio: f64) -> RgbImage {
    let rgb = image.to_rgb8();

    if ratio == 1.0 {
        return rgb
    }

    let width = ((rgb.width() as f64 * ratio).round() as u32).max(1);
    let height = ((rgb.height() as f64 * ratio).round() as u32).max(1);

    imageops::resize(&rgb, width, height, FilterType::Triangle)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        feature::{replay::{ReplayExtractor, ReplayRecord}, FeatureParams},
        nav_ctrl::{NavMode, NavPhase, Params}
    };
    use image::Rgb;

    #[derive(Default)]
    struct RecordingSink {
        cmds: Vec<ControlCommand>,
    }

    impl CommandSink for RecordingSink {
        fn send_command(&mut self, cmd: &ControlCommand) -> Result<(), VelClientError> {
            self.cmds.push(*cmd);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingDiag {
        packets: Vec<DiagPacket>,
    }

    impl DiagSink for RecordingDiag {
        fn send_diag(&mut self, packet: &DiagPacket) -> Result<(), DiagServerError> {
            self.packets.push(packet.clone());
            Ok(())
        }
    }

    fn record(found: bool, converged: bool) -> ReplayRecord {
        ReplayRecord {
            found,
            lateral: 0.0,
            depth: 8.0,
            heading: 0.0,
            converged
        }
    }

    fn nav_loop(
        mode: NavMode,
        records: Vec<ReplayRecord>,
        debug: bool
    ) -> NavLoop<ReplayExtractor, RecordingSink, RecordingDiag> {
        let params = Params {
            initial_mode: mode,
            ..Default::default()
        };
        let ext = ReplayExtractor::from_records(records, FeatureParams::default());
        let nav_ctrl = NavCtrl::new(params, ext).unwrap();

        NavLoop::new(
            nav_ctrl,
            RecordingSink::default(),
            Some(RecordingDiag::default()),
            debug,
            0.5,
            ImageFormat::Jpeg(50)
        )
    }

    fn frame() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 8, Rgb([100, 150, 80])))
    }

    #[test]
    fn test_waits_for_both_cameras() {
        let nl = nav_loop(NavMode::ForwardFront, vec![record(true, false)], false);

        assert!(nl.on_frame(CamId::Front, &frame()).unwrap().is_empty());
        assert_eq!(nl.on_frame(CamId::Front, &frame()).unwrap().len(), 0);

        // Back frame is cached but doesn't drive anything
        assert!(nl.on_frame(CamId::Back, &frame()).unwrap().is_empty());

        let outputs = nl.on_frame(CamId::Front, &frame()).unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].report.found);

        let (_, sink, diag) = nl.into_parts().unwrap();
        assert_eq!(sink.cmds.len(), 1);
        assert!((sink.cmds[0].linear_ms - 0.2).abs() < 1e-9);

        let diag = diag.unwrap();
        assert_eq!(diag.packets.len(), 1);
        assert_eq!(diag.packets[0].nav_mode, 1);
        assert_eq!(diag.packets[0].active_cam, CamId::Front);
        assert!(diag.packets[0].exg.is_some());
        assert!(diag.packets[0].mask.is_some());
    }

    #[test]
    fn test_inactive_camera_ignored() {
        let nl = nav_loop(NavMode::BackwardBack, vec![record(true, false)], false);

        nl.on_frame(CamId::Back, &frame()).unwrap();
        assert!(nl.on_frame(CamId::Front, &frame()).unwrap().is_empty());
        assert!(nl.on_frame(CamId::Front, &frame()).unwrap().is_empty());

        let (nav_ctrl, sink, _) = nl.into_parts().unwrap();
        assert!(sink.cmds.is_empty());
        assert_eq!(nav_ctrl.extractor().remaining(), 1);
    }

    #[test]
    fn test_handoff_reruns_on_new_camera() {
        let nl = nav_loop(
            NavMode::ForwardFront,
            vec![record(false, false), record(true, false)],
            false
        );

        nl.on_frame(CamId::Back, &frame()).unwrap();
        let outputs = nl.on_frame(CamId::Front, &frame()).unwrap();

        // Hand-off then straight into following on the back camera
        assert_eq!(outputs.len(), 2);
        assert!(outputs[0].rerun);
        assert!(outputs[0].camera_switch);
        assert!(outputs[0].cmd.is_none());
        assert!(outputs[1].cmd.is_some());
        assert_eq!(nl.active_camera().unwrap(), CamId::Back);

        // Front frames no longer drive the loop
        assert!(nl.on_frame(CamId::Front, &frame()).unwrap().is_empty());

        let (nav_ctrl, sink, diag) = nl.into_parts().unwrap();
        assert_eq!(nav_ctrl.state().mode, NavMode::ForwardBack);
        assert_eq!(sink.cmds.len(), 1);
        assert_eq!(diag.unwrap().packets.len(), 2);
    }

    #[test]
    fn test_debug_suppresses_commands() {
        let nl = nav_loop(
            NavMode::ForwardBack,
            vec![record(false, false), record(false, false), record(false, true)],
            true
        );

        nl.on_frame(CamId::Front, &frame()).unwrap();
        for _ in 0..3 {
            nl.on_frame(CamId::Back, &frame()).unwrap();
        }
        nl.halt().unwrap();

        let (nav_ctrl, sink, diag) = nl.into_parts().unwrap();

        // Transitions still happen
        assert_eq!(nav_ctrl.state().mode, NavMode::BackwardBack);
        assert_eq!(nav_ctrl.state().phase, NavPhase::FollowingRow);
        assert_eq!(nav_ctrl.state().travel_dir, -1);

        assert!(sink.cmds.is_empty());
        assert_eq!(diag.unwrap().packets.len(), 3);
    }

    #[test]
    fn test_halt_sends_stop() {
        let nl = nav_loop(NavMode::ForwardFront, vec![record(true, false)], false);

        nl.on_frame(CamId::Back, &frame()).unwrap();
        nl.on_frame(CamId::Front, &frame()).unwrap();
        nl.halt().unwrap();

        assert!(matches!(nl.on_frame(CamId::Front, &frame()), Err(NavLoopError::Halted)));

        let (_, sink, _) = nl.into_parts().unwrap();
        assert_eq!(sink.cmds.len(), 2);
        assert!(sink.cmds[1].is_stop());
    }

    #[test]
    fn test_fatal_error_stops_robot() {
        let params = Params {
            initial_mode: NavMode::ForwardFront,
            max_init_attempts: Some(0),
            ..Default::default()
        };
        let ext = ReplayExtractor::from_records(Vec::new(), FeatureParams::default());
        let nl = NavLoop::new(
            NavCtrl::new(params, ext).unwrap(),
            RecordingSink::default(),
            None::<RecordingDiag>,
            false,
            1.0,
            ImageFormat::Png
        );

        nl.on_frame(CamId::Back, &frame()).unwrap();
        assert!(matches!(
            nl.on_frame(CamId::Front, &frame()),
            Err(NavLoopError::NavCtrlError(NavCtrlError::InitAttemptsExceeded(1)))
        ));

        let (_, sink, _) = nl.into_parts().unwrap();
        assert_eq!(sink.cmds.len(), 1);
        assert!(sink.cmds[0].is_stop());
    }

    #[test]
    fn test_resize() {
        let img = frame();
        assert_eq!(resize(&img, 0.5).dimensions(), (16, 4));
        assert_eq!(resize(&img, 1.0).dimensions(), (32, 8));
        assert_eq!(resize(&img, 0.001).dimensions(), (1, 1));
    }
}
