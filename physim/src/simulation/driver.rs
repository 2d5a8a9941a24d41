//! Fixed-grid time stepping and frame production
//!
//! A [`SimulationDriver`] owns the initial [`Engine`] and the time grid
//! (`n_steps` steps of size `h0`, a frame every `stride` steps). Frames are
//! pulled through [`SimulationDriver::frames`], a lazy iterator that starts
//! from a fresh copy of the initial engine on every call, or pushed into a
//! [`FrameSink`] with [`SimulationDriver::run`].
//!
//! After every step the whole state is checked for NaN/Inf. Any fatal
//! error ends the run and comes back as [`SimError::StepFailed`] carrying
//! the step index, the time and the flattened state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Result, SimError};
use crate::simulation::diagnostics::Diagnostics;
use crate::simulation::engine::Engine;
use crate::simulation::params::Parameters;
use crate::simulation::states::{Body, Particle, StateVector};

/// Snapshot of an engine's state
#[derive(Debug, Clone, PartialEq)]
pub enum FrameState {
    Vector(StateVector),
    Bodies(Vec<Body>),
    Particles(Vec<Particle>),
}

impl FrameState {
    pub fn as_vector(&self) -> Option<&StateVector> {
        match self {
            FrameState::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bodies(&self) -> Option<&[Body]> {
        match self {
            FrameState::Bodies(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_particles(&self) -> Option<&[Particle]> {
        match self {
            FrameState::Particles(p) => Some(p),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub step: usize, // steps taken before this snapshot
    pub time: f64,
    pub state: FrameState,
    pub diagnostics: Diagnostics,
}

impl Frame {
    fn capture<E: Engine>(step: usize, engine: &E) -> Self {
        Self {
            step,
            time: engine.time(),
            state: engine.snapshot(),
            diagnostics: engine.diagnostics(),
        }
    }
}

/// Cooperative early-stop flag shared between a driver and its callers.
///
/// Once set, running iterators finish before their next step. The flag
/// stays set until [`StopHandle::reset`].
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Consumer of emitted frames (renderer, recorder, logger)
pub trait FrameSink {
    fn accept(&mut self, frame: &Frame);
}

impl FrameSink for Vec<Frame> {
    fn accept(&mut self, frame: &Frame) {
        self.push(frame.clone());
    }
}

/// Writes every `every`-th frame's diagnostics at `info` level
#[derive(Debug, Clone)]
pub struct LogSink {
    every: usize,
    seen: usize,
}

impl LogSink {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
            seen: 0,
        }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(1)
    }
}

impl FrameSink for LogSink {
    fn accept(&mut self, frame: &Frame) {
        if self.seen % self.every == 0 {
            let d = &frame.diagnostics;
            info!(
                step = frame.step,
                time = frame.time,
                kinetic = ?d.kinetic,
                potential = ?d.potential,
                total = ?d.total_energy(),
                entropy = ?d.entropy,
                contacts = ?d.contacts,
                "frame"
            );
        }
        self.seen += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub steps: usize,
    pub frames: usize,
    pub final_time: f64,
    pub stopped_early: bool,
}

#[derive(Debug, Clone)]
pub struct SimulationDriver<E> {
    initial: E,
    dt: f64,
    n_steps: usize,
    stride: usize,
    stop: StopHandle,
}

impl<E: Engine> SimulationDriver<E> {
    pub fn new(engine: E, params: &Parameters) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            initial: engine,
            dt: params.h0,
            n_steps: params.n_steps(),
            stride: params.save_stride(),
            stop: StopHandle::default(),
        })
    }

    pub fn initial(&self) -> &E {
        &self.initial
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of frames a complete run emits, frame 0 included
    pub fn expected_frames(&self) -> usize {
        self.n_steps / self.stride + 1
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Lazy frame sequence from the initial state
    pub fn frames(&self) -> Frames<E> {
        Frames {
            engine: self.initial.clone(),
            dt: self.dt,
            n_steps: self.n_steps,
            stride: self.stride,
            stop: self.stop.clone(),
            step: 0,
            started: false,
            done: false,
            stopped_early: false,
        }
    }

    /// Run to the horizon (or until stopped), pushing every frame into `sink`
    pub fn run(&self, sink: &mut dyn FrameSink) -> Result<RunSummary> {
        info!(
            n_steps = self.n_steps,
            dt = self.dt,
            stride = self.stride,
            "starting run"
        );

        let mut frames = self.frames();
        let mut emitted = 0;
        for frame in frames.by_ref() {
            let frame = frame?;
            sink.accept(&frame);
            emitted += 1;
        }

        let summary = RunSummary {
            steps: frames.steps_taken(),
            frames: emitted,
            final_time: frames.time(),
            stopped_early: frames.stopped_early(),
        };
        if summary.stopped_early {
            warn!(steps = summary.steps, n_steps = self.n_steps, "run stopped early");
        }
        info!(
            steps = summary.steps,
            frames = summary.frames,
            final_time = summary.final_time,
            "run finished"
        );
        Ok(summary)
    }
}

/// Iterator over the frames of one run, see [`SimulationDriver::frames`].
/// Fused: after an error or the last frame it only returns `None`.
pub struct Frames<E> {
    engine: E,
    dt: f64,
    n_steps: usize,
    stride: usize,
    stop: StopHandle,
    step: usize,
    started: bool,
    done: bool,
    stopped_early: bool,
}

impl<E: Engine> Frames<E> {
    pub fn steps_taken(&self) -> usize {
        self.step
    }

    pub fn time(&self) -> f64 {
        self.engine.time()
    }

    pub fn stopped_early(&self) -> bool {
        self.stopped_early
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn fail(&mut self, step: usize, source: SimError) -> SimError {
        self.done = true;
        SimError::StepFailed {
            step,
            time: self.engine.time(),
            state: self.engine.flatten(),
            source: Box::new(source),
        }
    }
}

impl<E: Engine> Iterator for Frames<E> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            debug!(step = 0, time = self.engine.time(), "frame");
            return Some(Ok(Frame::capture(0, &self.engine)));
        }

        while self.step < self.n_steps {
            if self.stop.is_stopped() {
                self.done = true;
                self.stopped_early = true;
                return None;
            }

            let n = self.step + 1;
            if let Err(e) = self.engine.advance(self.dt) {
                return Some(Err(self.fail(n, e)));
            }
            self.step = n;

            if let Some((index, value)) = self.engine.first_non_finite() {
                return Some(Err(self.fail(n, SimError::NumericDivergence { index, value })));
            }

            if n % self.stride == 0 {
                debug!(step = n, time = self.engine.time(), "frame");
                return Some(Ok(Frame::capture(n, &self.engine)));
            }
        }

        self.done = true;
        None
    }
}

impl<E: Engine> std::iter::FusedIterator for Frames<E> {}
