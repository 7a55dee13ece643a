//! # Supervisor Module
//!
//! Runs the poll → classify → dispatch loop on a dedicated tokio task and owns
//! its start/stop lifecycle.
//!
//! ## Loop
//!
//! Each iteration checks the shared `running` flag, polls the device source,
//! classifies every sample and hands the resulting events to the drive mapper,
//! then waits out the rest of the poll period (16 ms by default, ~60 Hz).
//! Late iterations push the schedule back rather than bursting to catch up.
//!
//! ## Stopping
//!
//! - A failed poll is terminal: the mapper stops the robot once and the loop
//!   ends without polling again.
//! - Clearing the `running` flag ends the loop after the current iteration;
//!   the loop itself sends the final stop to the actuator.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::controller::classifier::EventClassifier;
use crate::controller::device::DeviceSource;
use crate::controller::drive_mapper::DriveMapper;

/// Default poll period (~60 Hz)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Why the poll loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Stop was requested
    Stopped,
    /// The controller went away
    Disconnected,
    /// The loop task panicked or was cancelled
    Aborted,
}

/// Everything the poll task owns while it runs
///
/// Dropping a pipeline that never delivered its final stop (the task
/// panicked or was cancelled, or the supervisor was dropped unstarted)
/// stops the robot.
struct Pipeline {
    source: Box<dyn DeviceSource>,
    classifier: EventClassifier,
    mapper: DriveMapper,
    settled: bool,
}

impl Pipeline {
    /// Final stop on a normal exit
    fn shutdown(&mut self) {
        self.mapper.shutdown();
        self.settled = true;
    }

    fn disconnect(&mut self) {
        self.mapper.handle_disconnect();
        self.settled = true;
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Polling ended abnormally, stopping robot");
            self.mapper.shutdown();
        }
    }
}

/// Requests a stop from any thread or task
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    /// Ask the loop to exit after its current iteration
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Owns the fixed-rate poll loop
///
/// # Examples
///
/// ```no_run
/// use drive_bridge::actuator::logging::LoggingActuator;
/// use drive_bridge::controller::classifier::EventClassifier;
/// use drive_bridge::controller::device::{EvdevSource, DEFAULT_NAME_HINTS};
/// use drive_bridge::controller::drive_mapper::DriveMapper;
/// use drive_bridge::supervisor::{Supervisor, DEFAULT_POLL_INTERVAL};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let hints: Vec<String> = DEFAULT_NAME_HINTS.iter().map(|h| h.to_string()).collect();
/// let source = EvdevSource::open(&hints)?;
/// let mapper = DriveMapper::new(Box::new(LoggingActuator::new()));
///
/// let mut supervisor = Supervisor::new(
///     Box::new(source),
///     EventClassifier::new(),
///     mapper,
///     DEFAULT_POLL_INTERVAL,
/// );
/// let exit = supervisor
///     .run_until(async {
///         let _ = tokio::signal::ctrl_c().await;
///     })
///     .await;
/// println!("Loop ended: {:?}", exit);
/// # Ok(())
/// # }
/// ```
pub struct Supervisor {
    pipeline: Option<Pipeline>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
    handle: Option<JoinHandle<LoopExit>>,
    last_exit: Option<LoopExit>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("running", &self.is_running())
            .field("poll_interval", &self.poll_interval)
            .field("last_exit", &self.last_exit)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(
        source: Box<dyn DeviceSource>,
        classifier: EventClassifier,
        mapper: DriveMapper,
        poll_interval: Duration,
    ) -> Self {
        Self {
            pipeline: Some(Pipeline {
                source,
                classifier,
                mapper,
                settled: false,
            }),
            running: Arc::new(AtomicBool::new(false)),
            poll_interval,
            handle: None,
            last_exit: None,
        }
    }

    /// Handle for stopping the loop from another context
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Whether the poll task is alive and has not been asked to stop
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Spawn the poll loop
    ///
    /// Calling it again while the loop exists is a no-op with a warning.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        let Some(pipeline) = self.pipeline.take() else {
            warn!("Controller already running");
            return;
        };

        info!(
            "Starting controller polling on {} every {:?}",
            pipeline.source.description(),
            self.poll_interval
        );
        if !pipeline.mapper.actuator_connected() {
            warn!("Actuator is not connected; motor commands will be dropped");
        }

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let poll_interval = self.poll_interval;
        self.handle = Some(tokio::spawn(poll_loop(pipeline, running, poll_interval)));
    }

    /// Stop the loop and wait for it to finish
    ///
    /// The loop sends the final stop to the actuator unless it already ended
    /// on a disconnection, which stopped the robot itself. If the loop was
    /// never started the stop is sent from here. A loop task that panics
    /// still stops the robot when its pipeline is dropped, and the exit is
    /// reported as [`LoopExit::Aborted`].
    pub async fn stop(&mut self) -> LoopExit {
        info!("Stopping controller polling...");
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.handle.take() {
            let exit = join_loop(handle).await;
            self.last_exit = Some(exit);
            return exit;
        }

        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.shutdown();
            self.last_exit = Some(LoopExit::Stopped);
            return LoopExit::Stopped;
        }

        debug!("Controller polling already stopped");
        self.last_exit.unwrap_or(LoopExit::Stopped)
    }

    /// Run until `shutdown` completes or the loop ends on its own
    ///
    /// Starts the loop if needed and always finishes with [`Supervisor::stop`].
    pub async fn run_until<F>(&mut self, shutdown: F) -> LoopExit
    where
        F: Future,
    {
        self.start();

        let finished = match self.handle.as_mut() {
            Some(handle) => tokio::select! {
                _ = shutdown => None,
                joined = handle => Some(joined),
            },
            None => None,
        };

        match finished {
            Some(joined) => {
                self.handle = None;
                let exit = match joined {
                    Ok(exit) => exit,
                    Err(e) => {
                        error!("Polling task failed: {}", e);
                        LoopExit::Aborted
                    }
                };
                self.running.store(false, Ordering::Release);
                self.last_exit = Some(exit);
                exit
            }
            None => {
                info!("Shutdown requested");
                self.stop().await
            }
        }
    }
}

async fn join_loop(handle: JoinHandle<LoopExit>) -> LoopExit {
    match handle.await {
        Ok(exit) => exit,
        Err(e) => {
            error!("Polling task failed: {}", e);
            LoopExit::Aborted
        }
    }
}

async fn poll_loop(
    mut pipeline: Pipeline,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
) -> LoopExit {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    while running.load(Ordering::Acquire) {
        match pipeline.source.poll().await {
            Ok(samples) => {
                for sample in &samples {
                    if let Some(event) = pipeline.classifier.classify(sample) {
                        pipeline.mapper.handle_event(event);
                    }
                }
            }
            Err(e) => {
                warn!("Controller disconnected! ({})", e);
                running.store(false, Ordering::Release);
                pipeline.disconnect();
                return LoopExit::Disconnected;
            }
        }

        ticker.tick().await;
    }

    pipeline.shutdown();
    LoopExit::Stopped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::mocks::RecordingActuator;
    use crate::actuator::ActuatorCommand;
    use crate::controller::device::mocks::ScriptedSource;
    use crate::controller::device::{ConnectionState, RawComponentSample};
    use std::sync::atomic::AtomicUsize;

    const TEST_INTERVAL: Duration = Duration::from_millis(1);

    fn supervisor_with(
        script: Vec<std::result::Result<Vec<RawComponentSample>, String>>,
    ) -> (Supervisor, RecordingActuator, Arc<AtomicUsize>) {
        let source = ScriptedSource::new(script);
        let polls = source.poll_count();
        let actuator = RecordingActuator::new();
        let mapper = DriveMapper::new(Box::new(actuator.clone()));
        let supervisor = Supervisor::new(
            Box::new(source),
            EventClassifier::new(),
            mapper,
            TEST_INTERVAL,
        );
        (supervisor, actuator, polls)
    }

    /// Yields one batch, then panics on the next poll.
    struct PanickingSource {
        polled: bool,
    }

    #[async_trait::async_trait]
    impl DeviceSource for PanickingSource {
        async fn poll(&mut self) -> crate::error::Result<Vec<RawComponentSample>> {
            if self.polled {
                panic!("device driver bug");
            }
            self.polled = true;
            Ok(vec![RawComponentSample::analog("y left", -1.0)])
        }

        fn connection_state(&self) -> ConnectionState {
            ConnectionState::Polling
        }

        fn description(&self) -> &str {
            "panicking source"
        }
    }

    async fn stop_after(handle: StopHandle, delay: Duration) {
        tokio::time::sleep(delay).await;
        handle.request_stop();
    }

    #[test]
    fn test_default_poll_interval() {
        assert_eq!(DEFAULT_POLL_INTERVAL, Duration::from_millis(16));
        // ~60 Hz
        assert_eq!(1000 / DEFAULT_POLL_INTERVAL.as_millis(), 62);
    }

    #[tokio::test]
    async fn test_samples_dispatched_in_order() {
        let (mut supervisor, actuator, _) = supervisor_with(vec![Ok(vec![
            RawComponentSample::digital("0", 1.0),
            RawComponentSample::analog("x axis left", 0.5),
            RawComponentSample::analog("y left", 0.05),
            RawComponentSample::analog("mystery", 0.9),
            RawComponentSample::digital("0", 0.0),
        ])]);

        tokio::spawn(stop_after(supervisor.stop_handle(), Duration::from_millis(20)));
        let exit = supervisor.run_until(std::future::pending::<()>()).await;

        assert_eq!(exit, LoopExit::Stopped);
        assert_eq!(
            actuator.commands(),
            vec![
                ActuatorCommand::Action("jump".to_string()),
                ActuatorCommand::Drive { left: -0.5, right: 0.5 },
                ActuatorCommand::Drive { left: 0.0, right: 0.0 },
                ActuatorCommand::Stop,
            ]
        );
    }

    #[tokio::test]
    async fn test_disconnect_stops_once_and_ends_loop() {
        let (mut supervisor, actuator, polls) = supervisor_with(vec![
            Ok(vec![RawComponentSample::analog("y left", -1.0)]),
            Err("unplugged".to_string()),
            Ok(vec![RawComponentSample::digital("0", 1.0)]),
        ]);

        let exit = supervisor.run_until(std::future::pending::<()>()).await;

        assert_eq!(exit, LoopExit::Disconnected);
        assert_eq!(polls.load(Ordering::SeqCst), 2);
        assert_eq!(
            actuator.commands(),
            vec![
                ActuatorCommand::Drive { left: 1.0, right: 1.0 },
                ActuatorCommand::Stop,
            ]
        );

        // A later stop does not add a second stop command
        assert_eq!(supervisor.stop().await, LoopExit::Disconnected);
        assert_eq!(actuator.stop_count(), 1);
        assert!(!supervisor.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_robot() {
        let (mut supervisor, actuator, _) =
            supervisor_with(vec![Ok(vec![RawComponentSample::analog("y left", -0.5)])]);

        let exit = supervisor
            .run_until(tokio::time::sleep(Duration::from_millis(10)))
            .await;

        assert_eq!(exit, LoopExit::Stopped);
        assert_eq!(actuator.stop_count(), 1);
        assert_eq!(actuator.commands().last(), Some(&ActuatorCommand::Stop));
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (mut supervisor, actuator, _) = supervisor_with(vec![]);

        supervisor.start();
        supervisor.start();
        assert!(supervisor.is_running());

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(supervisor.stop().await, LoopExit::Stopped);

        assert_eq!(actuator.stop_count(), 1);
        assert!(!supervisor.is_running());
    }

    #[tokio::test]
    async fn test_stop_from_another_task() {
        let (mut supervisor, actuator, polls) = supervisor_with(vec![]);
        supervisor.start();

        let handle = supervisor.stop_handle();
        let stopper = tokio::spawn(stop_after(handle, Duration::from_millis(10)));
        stopper.await.unwrap();

        assert_eq!(supervisor.stop().await, LoopExit::Stopped);
        assert!(polls.load(Ordering::SeqCst) >= 1);
        assert_eq!(actuator.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_without_start_still_stops_robot() {
        let (mut supervisor, actuator, polls) = supervisor_with(vec![]);

        assert_eq!(supervisor.stop().await, LoopExit::Stopped);

        assert_eq!(polls.load(Ordering::SeqCst), 0);
        assert_eq!(actuator.commands(), vec![ActuatorCommand::Stop]);
    }

    #[tokio::test]
    async fn test_panicking_loop_still_stops_robot() {
        let actuator = RecordingActuator::new();
        let mut supervisor = Supervisor::new(
            Box::new(PanickingSource { polled: false }),
            EventClassifier::new(),
            DriveMapper::new(Box::new(actuator.clone())),
            TEST_INTERVAL,
        );

        let exit = supervisor.run_until(std::future::pending::<()>()).await;

        assert_eq!(exit, LoopExit::Aborted);
        assert_eq!(
            actuator.commands(),
            vec![
                ActuatorCommand::Drive { left: 1.0, right: 1.0 },
                ActuatorCommand::Stop,
            ]
        );
    }

    #[test]
    fn test_dropping_unstarted_supervisor_stops_robot() {
        let (supervisor, actuator, _) = supervisor_with(vec![]);
        drop(supervisor);
        assert_eq!(actuator.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_restart_after_stop_is_noop() {
        let (mut supervisor, actuator, _) = supervisor_with(vec![]);
        supervisor.start();
        supervisor.stop().await;

        supervisor.start();
        assert!(!supervisor.is_running());
        assert_eq!(supervisor.stop().await, LoopExit::Stopped);
        assert_eq!(actuator.stop_count(), 1);
    }
}
