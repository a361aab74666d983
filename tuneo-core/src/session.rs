//! # Session Module
//!
//! A session owns the pipeline worker thread for as long as the microphone
//! is in use.
//!
//! ## Architecture
//! - **Worker thread**: creates and starts the capture, then runs the
//!   [`PipelineDriver`] over incoming frames, one at a time
//! - **Communication**: crossbeam channels for frames, commands and
//!   published states, all bounded
//! - **Teardown**: stopping the session, or a capture fault, stops the
//!   capture and clears all tracking state before the thread exits

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{error, info, warn};

use crate::audio::{self, CaptureFeed, FrameReceiver};
use crate::config::{PipelineConfig, TunerConfig};
use crate::driver::{PipelineDriver, PipelineState};
use crate::error::{Result, TunerError};
use crate::pitch::PitchEstimator;

/// Creates the subscription channel for published states.
///
/// When the subscriber falls behind, the oldest unread state is discarded.
pub fn state_channel(depth: usize) -> (StateSender, Receiver<PipelineState>) {
    let (tx, rx) = crossbeam_channel::bounded(depth.max(1));
    (StateSender { tx, overflow: rx.clone() }, rx)
}

/// Publishing side of the state subscription.
#[derive(Debug, Clone)]
pub struct StateSender {
    tx: Sender<PipelineState>,
    overflow: Receiver<PipelineState>,
}

impl StateSender {
    pub fn publish(&self, state: PipelineState) {
        if let Err(TrySendError::Full(state)) = self.tx.try_send(state) {
            let _ = self.overflow.try_recv();
            let _ = self.tx.try_send(state);
        }
    }
}

#[derive(Debug)]
enum Command {
    UpdateConfig(TunerConfig),
    Stop,
}

/// Handle to a running tuner session.
///
/// Dropping the handle stops the session.
#[derive(Debug)]
pub struct Session {
    commands: Sender<Command>,
    thread_handle: Option<JoinHandle<Result<()>>>,
}

impl Session {
    /// Starts capture and the pipeline worker.
    ///
    /// The capture is built by `make_capture` on the worker thread, since
    /// audio streams are generally not `Send`. This call blocks until the
    /// capture has started or failed. On failure the worker exits without
    /// publishing anything and the capture error is returned.
    ///
    /// # Arguments
    /// * `make_capture` - Builds the frame source on the worker thread
    /// * `estimator` - Pitch estimator used for every frame
    /// * `tuner` - Initial user selection
    /// * `config` - Pitch tracker parameters
    /// * `states` - Where each processed frame's state is published
    pub fn start<C, F, E>(
        make_capture: F,
        estimator: E,
        tuner: TunerConfig,
        config: PipelineConfig,
        states: StateSender,
    ) -> Result<Self>
    where
        F: FnOnce() -> C + Send + 'static,
        C: CaptureFeed,
        E: PitchEstimator + Send + 'static,
    {
        let queue_depth = config.queue_depth;
        let drop_policy = config.drop_policy;
        let mut driver = PipelineDriver::new(config, tuner, estimator)?;

        let (command_tx, command_rx) = crossbeam_channel::bounded::<Command>(8);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);

        let thread_handle = thread::Builder::new()
            .name("tuneo-pipeline".into())
            .spawn(move || {
                let mut capture = make_capture();
                let (frames_tx, FrameReceiver { frames, mut faults }) =
                    audio::frame_channel(queue_depth, drop_policy);

                if let Err(e) = capture.start(frames_tx) {
                    error!("Fatal error starting audio: {}", e);
                    let _ = ready_tx.send(Err(e));
                    return Ok(());
                }
                driver.begin();
                let _ = ready_tx.send(Ok(()));

                let mut outcome = Ok(());
                let mut faults_closed = false;
                loop {
                    if faults_closed {
                        // Reporter gone with the sender; keep draining the frames.
                        faults = crossbeam_channel::never();
                        faults_closed = false;
                    }
                    crossbeam_channel::select! {
                        recv(faults) -> msg => match msg {
                            Ok(e) => {
                                error!("Capture failed, ending session: {}", e);
                                outcome = Err(e);
                                break;
                            }
                            Err(_) => faults_closed = true,
                        },
                        recv(frames) -> msg => match msg {
                            Ok(frame) => {
                                if let Some(state) = driver.process_frame(frame, || capture.sample_rate()) {
                                    states.publish(state);
                                }
                            }
                            Err(_) => {
                                warn!("Audio channel closed");
                                break;
                            }
                        },
                        recv(command_rx) -> msg => match msg {
                            Ok(Command::UpdateConfig(tuner)) => driver.apply_config(tuner),
                            Ok(Command::Stop) | Err(_) => {
                                info!("Received shutdown signal");
                                break;
                            }
                        },
                    }
                }

                capture.stop();
                driver.end();
                info!("Pipeline thread finished");
                outcome
            })
            .map_err(TunerError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Session started");
                Ok(Self {
                    commands: command_tx,
                    thread_handle: Some(thread_handle),
                })
            }
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread_handle.join();
                Err(TunerError::WorkerPanicked)
            }
        }
    }

    /// Sends a new user selection; applied before the next frame.
    pub fn update_config(&self, tuner: TunerConfig) {
        if self.commands.send(Command::UpdateConfig(tuner)).is_err() {
            warn!("Pipeline thread is gone, config update ignored");
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stops capture, clears all session state and joins the worker.
    ///
    /// Returns the capture error if the session had already ended on one.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(handle) = self.thread_handle.take() else {
            return Ok(());
        };
        let _ = self.commands.send(Command::Stop);
        handle.join().map_err(|_| TunerError::WorkerPanicked)?
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Error shutting down session: {}", e);
        }
    }
}
