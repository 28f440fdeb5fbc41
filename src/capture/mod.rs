use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::Builder;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::dozewatch::Config;
use crate::errors::*;
use crate::session::Event;
use crate::{debug, error, tags};

pub mod encode;
pub mod frameslot;
pub mod webcam;

// One raw YUYV sample from the camera.
#[derive(Debug, Clone)]
pub struct Frame {
	pub data: Vec<u8>,
	pub width: u32,
	pub height: u32,
	pub timestamp: u64,
}

pub type FrameReceiver = frameslot::Receiver<Arc<Frame>>;

// What to do when a tick fires while an earlier encode is still
// running. Concurrent lets both proceed and send whichever finishes,
// so frames may reach the service out of capture order.
// DropWhileBusy skips the new tick instead.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum OverlapPolicy {
	Concurrent,
	DropWhileBusy,
}

impl Default for OverlapPolicy {
	fn default() -> Self {
		OverlapPolicy::Concurrent
	}
}

// Tasks tracks in-flight encodes by tick id. Each task gets a
// cancel flag the worker checks before doing any work.
pub struct Tasks {
	policy: OverlapPolicy,
	in_flight: HashMap<u64, Arc<AtomicBool>>,
}

impl Tasks {
	pub fn new(policy: OverlapPolicy) -> Self {
		Self{
			policy: policy,
			in_flight: HashMap::new(),
		}
	}

	pub fn begin(&mut self, tick: u64) -> Option<Arc<AtomicBool>> {
		if self.policy == OverlapPolicy::DropWhileBusy && !self.in_flight.is_empty() {
			return None;
		}
		let cancel = Arc::new(AtomicBool::new(false));
		self.in_flight.insert(tick, cancel.clone());
		Some(cancel)
	}

	// False when the task was cancelled or never started; its
	// result must then be discarded.
	pub fn finish(&mut self, tick: u64) -> bool {
		match self.in_flight.remove(&tick) {
			Some(cancel) => !cancel.load(Ordering::SeqCst),
			None => false,
		}
	}

	pub fn cancel_all(&mut self) -> usize {
		let n = self.in_flight.len();
		for (_, cancel) in self.in_flight.drain() {
			cancel.store(true, Ordering::SeqCst);
		}
		n
	}

	pub fn in_flight(&self) -> usize {
		self.in_flight.len()
	}
}

pub struct Capture {
	surface: (u32, u32),
	quality: f32,
	interval: Duration,
	frames: Option<FrameReceiver>,
	next_due: Option<Instant>,
	ticks: u64,
	tasks: Tasks,
}

impl Capture {
	pub fn new(config: &Config) -> Self {
		Self{
			surface: config.capture_resolution,
			quality: config.jpeg_quality,
			interval: Duration::from_millis(config.capture_interval_ms),
			frames: None,
			next_due: None,
			ticks: 0,
			tasks: Tasks::new(config.overlap),
		}
	}

	pub fn start(&mut self, frames: FrameReceiver, now: Instant) {
		self.frames = Some(frames);
		self.next_due = Some(now + self.interval);
	}

	pub fn is_running(&self) -> bool {
		self.frames.is_some()
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.next_due
	}

	pub fn ticks(&self) -> u64 {
		self.ticks
	}

	#[cfg(test)]
	pub fn in_flight(&self) -> usize {
		self.tasks.in_flight()
	}

	// Fires the tick if it is due. Returns the tick id when an
	// encode was started for it.
	pub fn tick(&mut self, now: Instant, events: &Sender<Event>) -> Option<u64> {
		let due = self.next_due?;
		if now < due {
			return None;
		}

		// Ticks missed while the loop was busy are not replayed.
		let next = due + self.interval;
		self.next_due = Some(if next > now { next } else { now + self.interval });

		self.ticks += 1;
		let tick = self.ticks;

		let frame = match self.frames.as_ref().and_then(|f| f.latest()) {
			Some(frame) => frame,
			None => {
				debug!("no frame for tick", tags![
					("tick", &tick.to_string())
				]);
				return None;
			},
		};

		let cancel = match self.tasks.begin(tick) {
			Some(cancel) => cancel,
			None => {
				debug!("encode in flight - skipping tick", tags![
					("tick", &tick.to_string()),
					("in_flight", &self.tasks.in_flight().to_string())
				]);
				return None;
			},
		};

		debug!("encoding frame", tags![
			("tick", &tick.to_string()),
			("frame_timestamp", &frame.timestamp.to_string())
		]);
		if let Err(e) = spawn_encode(tick, frame, self.surface, self.quality,
									 cancel, events.clone()) {
			error!("couldn't start encode", tags![
				("tick", &tick.to_string()),
				("error", &e.to_string())
			]);
			self.tasks.finish(tick);
			return None;
		}
		Some(tick)
	}

	pub fn finish(&mut self, tick: u64) -> bool {
		self.tasks.finish(tick)
	}

	// Cancels outstanding encodes and lets go of the frame slot,
	// which tells the camera thread to stop.
	pub fn stop(&mut self) -> usize {
		self.frames.take();
		self.next_due = None;
		self.tasks.cancel_all()
	}
}

fn spawn_encode(tick: u64,
				frame: Arc<Frame>,
				surface: (u32, u32),
				quality: f32,
				cancel: Arc<AtomicBool>,
				events: Sender<Event>) -> Result<()> {
	Builder::new()
		.name(format!("encode_{}", tick))
		.spawn(move || {
			if cancel.load(Ordering::SeqCst) {
				return;
			}

			let jpeg = match encode::encode(&frame, surface, quality) {
				Ok(jpeg) => Some(jpeg),
				Err(e) => {
					error!("couldn't encode frame", tags![
						("tick", &tick.to_string()),
						("error", &e.to_string())
					]);
					None
				},
			};

			// The session may already be gone.
			let _ = events.send(Event::Encoded{tick: tick, jpeg: jpeg});
		})?;
	Ok(())
}
