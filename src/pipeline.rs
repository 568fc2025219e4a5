//! The capture → detect → map → dispatch → render loop.
//!
//! [`Pipeline`] owns everything derived from a [`TrackerConfig`] and drives
//! one [`FrameSource`], one [`Detector`] and one [`FrameSink`] against an
//! opened [`DeviceSet`]. The loop is single-threaded and blocking; the only
//! way to end it from outside is a [`StopHandle`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::backend::DeviceDriver;
use crate::config::{IdlePoint, TrackerConfig};
use crate::devices::DeviceSet;
use crate::dispatch::FrameDispatcher;
use crate::error::Result;
use crate::mapping::CoordinateMapper;
use crate::pattern::FrameBuilder;
use crate::protocols::helios::{Frame, HeliosPoint};
use crate::types::{Detection, RunExit, RunStats, RunSummary};
use crate::vision::{Detector, FrameSink, FrameSource};

/// Requests a running pipeline to end after the current iteration.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// What one batch of detections produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// Detections that passed the region-of-interest filter.
    pub accepted: usize,
    /// Frames written, counted once per frame.
    pub frames_dispatched: usize,
    /// Whether the idle park point was written.
    pub idled: bool,
}

/// Smoothed iterations-per-second of the loop.
#[derive(Debug)]
struct LoopRate {
    last: Option<Instant>,
    fps: f32,
}

impl LoopRate {
    const SMOOTHING: f32 = 0.9;

    fn new() -> Self {
        Self { last: None, fps: 0.0 }
    }

    fn tick(&mut self) -> f32 {
        let now = Instant::now();
        if let Some(last) = self.last.replace(now) {
            let secs = now.duration_since(last).as_secs_f32();
            if secs > 0.0 {
                let instant = 1.0 / secs;
                self.fps = if self.fps == 0.0 {
                    instant
                } else {
                    self.fps * Self::SMOOTHING + instant * (1.0 - Self::SMOOTHING)
                };
            }
        }
        self.fps
    }
}

/// Configured tracking loop.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: TrackerConfig,
    builder: FrameBuilder,
    dispatcher: FrameDispatcher,
    stop: StopHandle,
}

impl Pipeline {
    /// Validate `config` and prepare the mapper, frame builder and dispatcher.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        let mapper = CoordinateMapper::new(config.mapping.clone())?;
        let builder = FrameBuilder::new(mapper, config.pattern, config.output.point_rate)
            .with_color(config.color.clone())
            .with_flags(config.output.write_flags);
        let dispatcher = FrameDispatcher::new(config.output.status_attempts);
        Ok(Self {
            config,
            builder,
            dispatcher,
            stop: StopHandle::new(),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn frame_builder(&self) -> &FrameBuilder {
        &self.builder
    }

    /// A handle that ends [`run`](Self::run) between iterations.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Whether a captured image matches the camera size the mapper was
    /// configured for.
    pub fn matches_frame_size(&self, width: u32, height: u32) -> bool {
        width == self.config.mapping.frame_width && height == self.config.mapping.frame_height
    }

    /// Status line shown after each rendered frame.
    pub fn status_line(&self, fps: f32) -> String {
        format!("{} | Network {:.0} FPS", self.config.network, fps)
    }

    /// Map and dispatch one frame's detections, writing the idle park point
    /// if nothing was sent.
    pub fn step<D: DeviceDriver>(
        &self,
        devices: &mut DeviceSet<D>,
        detections: &[Detection],
    ) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        for detection in detections {
            if let Some(roi) = &self.config.roi {
                if !roi.accepts(detection) {
                    log::trace!("skipping detection outside region of interest: {:?}", detection);
                    continue;
                }
            }
            outcome.accepted += 1;
            for frame in self.builder.build(detection) {
                self.dispatcher.dispatch(devices, &frame);
                outcome.frames_dispatched += 1;
            }
        }

        if outcome.frames_dispatched == 0 {
            if let Some(idle) = &self.config.output.idle_point {
                self.dispatcher.dispatch(devices, &idle_frame(idle));
                outcome.idled = true;
            }
        }
        outcome
    }

    /// Run until the source or sink ends, a stop is requested or the frame
    /// limit is reached.
    ///
    /// Capture timeouts are counted and skipped. Errors from the source,
    /// detector or sink end the run and are returned; the device set is left
    /// to its owner, which closes it on drop.
    pub fn run<S, T, K, D>(
        &self,
        source: &mut S,
        detector: &mut T,
        sink: &mut K,
        devices: &mut DeviceSet<D>,
    ) -> Result<RunSummary>
    where
        S: FrameSource,
        T: Detector<S::Image>,
        K: FrameSink<S::Image>,
        D: DeviceDriver,
    {
        let mut stats = RunStats::default();
        let mut rate = LoopRate::new();
        let mut size_warned = false;
        log::info!(
            "Tracking with pattern '{}' at {} pps on {} device(s)",
            self.builder.pattern(),
            self.config.output.point_rate,
            devices.count()
        );

        let exit = loop {
            if self.stop.is_stopped() {
                break RunExit::Stopped;
            }
            if let Some(max) = self.config.max_frames {
                if stats.frames_captured >= max {
                    break RunExit::FrameLimit;
                }
            }
            if !source.is_streaming() || !sink.is_streaming() {
                break RunExit::EndOfStream;
            }

            let image = match source.capture()? {
                Some(image) => image,
                None if !source.is_streaming() => break RunExit::EndOfStream,
                None => {
                    stats.capture_timeouts += 1;
                    log::warn!("capture timed out ({} so far)", stats.capture_timeouts);
                    continue;
                }
            };
            stats.frames_captured += 1;
            if !size_warned {
                if let Some((width, height)) = source.frame_size(&image) {
                    if !self.matches_frame_size(width, height) {
                        log::warn!(
                            "captured {}x{} frames but mapping expects {}x{}; points will be clamped",
                            width,
                            height,
                            self.config.mapping.frame_width,
                            self.config.mapping.frame_height
                        );
                        size_warned = true;
                    }
                }
            }

            let detections = detector.detect(&image)?;
            log::debug!(
                "frame {}: {} detection(s)",
                stats.frames_captured,
                detections.len()
            );
            let outcome = self.step(devices, &detections);
            stats.detections += outcome.accepted as u64;
            stats.frames_dispatched += outcome.frames_dispatched as u64;
            if outcome.idled {
                stats.idle_frames += 1;
            }

            sink.render(&image)?;
            let measured = rate.tick();
            let fps = detector.network_fps().unwrap_or(measured);
            sink.set_status(&self.status_line(fps))?;
        };

        log::info!(
            "Run ended ({}): {} frame(s), {} timeout(s), {} detection(s), {} frame(s) dispatched",
            exit,
            stats.frames_captured,
            stats.capture_timeouts,
            stats.detections,
            stats.frames_dispatched
        );
        Ok(RunSummary { exit, stats })
    }
}

/// Single blanked point at the park position.
pub fn idle_frame(idle: &IdlePoint) -> Frame {
    Frame::new(idle.pps, vec![HeliosPoint::blanked(idle.x, idle.y)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegionOfInterest;
    use crate::error::Error;
    use crate::pattern::PointPattern;
    use crate::protocols::simulated::{SimulatedDriver, SimulatorHandle};
    use crate::vision::{LogSink, ReplayDetector, ReplayFrame, ReplaySource};
    use std::io::Cursor;

    fn replay(lines: &[&str]) -> ReplaySource<Cursor<Vec<u8>>> {
        ReplaySource::from_reader(Cursor::new(lines.join("\n").into_bytes()), "test")
    }

    fn open(devices: usize) -> (DeviceSet<SimulatedDriver>, SimulatorHandle) {
        let sim = SimulatedDriver::new(devices);
        let handle = sim.handle();
        (DeviceSet::open(sim).unwrap(), handle)
    }

    const TWO_BOXES: &str = r#"{"width":800,"height":600,"detections":[{"left":100,"top":100,"right":200,"bottom":200,"confidence":0.9},{"left":500,"top":300,"right":600,"bottom":400,"confidence":0.8}]}"#;
    const EMPTY: &str = r#"{"width":800,"height":600,"detections":[]}"#;

    fn run_with(
        config: TrackerConfig,
        lines: &[&str],
        devices: usize,
    ) -> (RunSummary, SimulatorHandle) {
        let pipeline = Pipeline::new(config).unwrap();
        let (mut set, handle) = open(devices);
        let mut source = replay(lines);
        let mut detector = ReplayDetector::new(pipeline.config().threshold);
        let mut sink = LogSink::new();
        let summary = pipeline
            .run(&mut source, &mut detector, &mut sink, &mut set)
            .unwrap();
        (summary, handle)
    }

    #[test]
    fn corners_fan_out_to_every_device() {
        let (summary, handle) = run_with(TrackerConfig::default(), &[TWO_BOXES], 2);
        assert_eq!(summary.exit, RunExit::EndOfStream);
        assert_eq!(summary.stats.frames_captured, 1);
        assert_eq!(summary.stats.detections, 2);
        assert_eq!(summary.stats.frames_dispatched, 8);

        let writes = handle.writes();
        assert_eq!(writes.len(), 16);
        assert!(writes.iter().all(|w| w.frame.len() == 1 && w.frame.pps == 64_000));
        let devices: Vec<_> = writes.iter().take(4).map(|w| w.device).collect();
        assert_eq!(devices, vec![0, 1, 0, 1]);
    }

    #[test]
    fn outline_sends_one_five_point_frame() {
        let config = TrackerConfig {
            pattern: PointPattern::Outline,
            ..TrackerConfig::default()
        };
        let (summary, handle) = run_with(config, &[TWO_BOXES], 1);
        assert_eq!(summary.stats.frames_dispatched, 2);
        assert!(handle.writes().iter().all(|w| w.frame.len() == 5));
    }

    #[test]
    fn timeouts_are_counted_and_skipped() {
        let (summary, handle) = run_with(TrackerConfig::default(), &["null", "null", TWO_BOXES], 1);
        assert_eq!(summary.stats.capture_timeouts, 2);
        assert_eq!(summary.stats.frames_captured, 1);
        assert_eq!(handle.write_count(), 8);
    }

    #[test]
    fn idle_point_is_written_only_when_nothing_was_sent() {
        let mut config = TrackerConfig::default();
        config.output.idle_point = Some(IdlePoint::new(100, 100));
        let (summary, handle) = run_with(config, &[EMPTY, TWO_BOXES, EMPTY], 1);

        assert_eq!(summary.stats.idle_frames, 2);
        let writes = handle.writes();
        assert_eq!(writes.len(), 1 + 8 + 1);
        let idle = &writes[0].frame;
        assert_eq!(idle.pps, 3000);
        assert_eq!(idle.points, vec![HeliosPoint::blanked(100, 100)]);
        assert_eq!(writes[9].frame, *idle);
    }

    #[test]
    fn roi_and_threshold_filter_detections() {
        let mut config = TrackerConfig::default();
        config.roi = Some(RegionOfInterest::columns(240.0, 1000.0));
        config.threshold = 0.85;
        let (summary, handle) = run_with(config, &[TWO_BOXES], 1);
        // The 0.9 box is centered at x=150, the 0.8 box is below threshold.
        assert_eq!(summary.stats.detections, 0);
        assert_eq!(handle.write_count(), 0);
    }

    #[test]
    fn frame_limit_and_stop_end_the_run() {
        let config = TrackerConfig {
            max_frames: Some(2),
            ..TrackerConfig::default()
        };
        let (summary, _) = run_with(config, &[EMPTY, EMPTY, EMPTY, EMPTY], 1);
        assert_eq!(summary.exit, RunExit::FrameLimit);
        assert_eq!(summary.stats.frames_captured, 2);

        let pipeline = Pipeline::new(TrackerConfig::default()).unwrap();
        pipeline.stop_handle().stop();
        let (mut set, handle) = open(1);
        let summary = pipeline
            .run(
                &mut replay(&[TWO_BOXES]),
                &mut ReplayDetector::new(0.5),
                &mut LogSink::new(),
                &mut set,
            )
            .unwrap();
        assert_eq!(summary.exit, RunExit::Stopped);
        assert_eq!(summary.stats.frames_captured, 0);
        assert_eq!(handle.write_count(), 0);
    }

    struct FixedRateDetector;

    impl Detector<ReplayFrame> for FixedRateDetector {
        fn detect(&mut self, image: &ReplayFrame) -> Result<Vec<Detection>> {
            Ok(image.detections.clone())
        }

        fn network_fps(&self) -> Option<f32> {
            Some(42.4)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        rendered: usize,
        statuses: Vec<String>,
    }

    impl FrameSink<ReplayFrame> for RecordingSink {
        fn render(&mut self, _image: &ReplayFrame) -> Result<()> {
            self.rendered += 1;
            Ok(())
        }

        fn set_status(&mut self, status: &str) -> Result<()> {
            self.statuses.push(status.to_string());
            Ok(())
        }
    }

    #[test]
    fn status_line_prefers_network_fps() {
        let pipeline = Pipeline::new(TrackerConfig::default()).unwrap();
        let (mut set, _) = open(1);
        let mut sink = RecordingSink::default();
        pipeline
            .run(&mut replay(&[EMPTY, EMPTY]), &mut FixedRateDetector, &mut sink, &mut set)
            .unwrap();
        assert_eq!(sink.rendered, 2);
        assert_eq!(
            sink.statuses,
            vec!["ssd-mobilenet-v2 | Network 42 FPS"; 2]
        );
    }

    struct FailingDetector;

    impl Detector<ReplayFrame> for FailingDetector {
        fn detect(&mut self, _image: &ReplayFrame) -> Result<Vec<Detection>> {
            Err(Error::detector(std::io::Error::new(
                std::io::ErrorKind::Other,
                "engine lost",
            )))
        }
    }

    #[test]
    fn detector_error_propagates_and_devices_still_close() {
        let pipeline = Pipeline::new(TrackerConfig::default()).unwrap();
        let (mut set, handle) = open(1);
        let err = pipeline
            .run(
                &mut replay(&[TWO_BOXES]),
                &mut FailingDetector,
                &mut LogSink::new(),
                &mut set,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Detector(_)));
        assert!(!handle.is_closed());
        drop(set);
        assert!(handle.is_closed());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = TrackerConfig::default();
        config.output.point_rate = 1;
        assert!(matches!(
            Pipeline::new(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn recording_size_is_compared_with_mapping() {
        let pipeline = Pipeline::new(TrackerConfig::default()).unwrap();
        assert!(pipeline.matches_frame_size(800, 600));
        assert!(!pipeline.matches_frame_size(1280, 720));

        let wide = r#"{"width":1280,"height":720,"detections":[{"left":1100,"top":600,"right":1200,"bottom":700,"confidence":0.9}]}"#;
        let mut source = replay(&[wide, wide]);
        let (mut set, handle) = open(1);
        let summary = pipeline
            .run(
                &mut source,
                &mut ReplayDetector::new(0.5),
                &mut LogSink::new(),
                &mut set,
            )
            .unwrap();
        assert_eq!(summary.stats.frames_captured, 2);
        // Out-of-frame corners clamp to the device edge.
        assert!(handle
            .writes()
            .iter()
            .any(|w| w.frame.points[0].x == crate::protocols::helios::MAX_COORDINATE));
    }
}
