//! Operator confirmation of mode changes

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    io::BufRead,
    sync::mpsc::{self, Receiver, TryRecvError},
    thread
};

use log::{info, warn};

use super::NavMode;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A source of confirmations for pending mode changes.
///
/// Polled once per cycle while a mode change is pending, so implementations must not block.
pub trait ModeConfirmation {
    /// Returns true once the change into `mode` has been confirmed.
    fn is_confirmed(&mut self, mode: NavMode) -> bool;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Confirms mode changes each time a line is read from an input, typically stdin.
///
/// Lines are read on a background thread. Lines entered while no change is pending are
/// discarded so a stray Enter cannot confirm a later change.
pub struct LineConfirmation {
    rx: Receiver<()>,

    /// Mode the operator has been prompted for
    prompted: Option<NavMode>,

    closed: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LineConfirmation {
    /// Confirm from lines of the given reader.
    pub fn new<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for line in reader.lines() {
                if line.is_err() || tx.send(()).is_err() {
                    break
                }
            }
        });

        Self {
            rx,
            prompted: None,
            closed: false
        }
    }

    /// Confirm from the process's standard input.
    pub fn stdin() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()))
    }
}

impl ModeConfirmation for LineConfirmation {
    fn is_confirmed(&mut self, mode: NavMode) -> bool {
        if self.prompted != Some(mode) {
            // Drop anything typed before the prompt
            while self.rx.try_recv().is_ok() {}

            info!("Press Enter to continue with mode {}", mode);
            self.prompted = Some(mode);
        }

        match self.rx.try_recv() {
            Ok(()) => {
                self.prompted = None;
                true
            },
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                if !self.closed {
                    warn!("Confirmation input closed, mode changes can no longer be confirmed");
                    self.closed = true;
                }
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
