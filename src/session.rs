use std::io::{self, Write};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{Builder, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Local;

use crate::capture::{webcam, Capture, FrameReceiver};
use crate::dozewatch::Dozewatch;
use crate::errors::*;
use crate::interpret::{self, Locale};
use crate::render::chart::{Chart, HistoryBuffer, PngSurface, Surface};
use crate::render::log::LogPanel;
use crate::transport::{Channel, ConnState, Socket};
use crate::{debug, error, info, tags, warn};

// Upper bound on how long the loop waits for an event before it
// polls the socket again.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

// Everything that happens to a session arrives as one of these,
// posted from whichever thread produced it.
pub enum Event {
	Connected(Box<dyn Socket>),
	ConnectFailed(String),
	Status(ConnState),
	Inbound(String),
	CameraGranted(FrameReceiver),
	CameraDenied(String),
	Encoded{tick: u64, jpeg: Option<Vec<u8>>},
	Teardown,
}

// Session is the only owner of the mutable client state. It runs
// on a single thread; other threads talk to it through `events`.
pub struct Session {
	d: Arc<Dozewatch>,
	events: Sender<Event>,
	queue: Receiver<Event>,
	channel: Channel,
	capture: Capture,
	history: HistoryBuffer,
	chart: Chart,
	panel: LogPanel,
}

impl Session {
	pub fn new(d: Arc<Dozewatch>,
			   events: Sender<Event>,
			   queue: Receiver<Event>,
			   out: Box<dyn Write + Send>,
			   surface: Box<dyn Surface>) -> Self {
		let config = &d.config;
		Self{
			channel: Channel::new(config.endpoint.clone(), events.clone()),
			capture: Capture::new(config),
			history: HistoryBuffer::new(config.history_depth),
			chart: Chart::new(surface, config.ear_threshold),
			panel: LogPanel::new(out, config.locale),
			events: events,
			queue: queue,
			d: d,
		}
	}

	#[cfg(test)]
	pub fn history(&self) -> &HistoryBuffer {
		&self.history
	}

	#[cfg(test)]
	pub fn panel(&self) -> &LogPanel {
		&self.panel
	}

	#[cfg(test)]
	pub fn channel(&self) -> &Channel {
		&self.channel
	}

	// Opens the connection and asks for the camera. Both answer
	// later through the event queue.
	pub fn start(&mut self) -> Result<()> {
		self.channel.connect()?;
		webcam::request(self.d.clone(), self.events.clone())?;
		Ok(())
	}

	pub fn run(&mut self) {
		loop {
			let wait = match self.capture.deadline() {
				Some(due) => due
					.saturating_duration_since(Instant::now())
					.min(POLL_INTERVAL),
				None => POLL_INTERVAL,
			};

			match self.queue.recv_timeout(wait) {
				Ok(Event::Teardown) => break,
				Ok(ev) => {
					self.handle(ev);
					// Drain the backlog before the next tick.
					if !self.pump() {
						return;
					}
				},
				Err(RecvTimeoutError::Timeout) => {},
				Err(RecvTimeoutError::Disconnected) => break,
			}

			self.capture.tick(Instant::now(), &self.events);
			self.channel.poll();
		}

		self.teardown();
	}

	// Handles whatever is queued without waiting. Returns false
	// once a teardown has been seen.
	pub fn pump(&mut self) -> bool {
		while let Ok(ev) = self.queue.try_recv() {
			if let Event::Teardown = ev {
				self.teardown();
				return false;
			}
			self.handle(ev);
		}
		true
	}

	fn handle(&mut self, ev: Event) {
		match ev {
			Event::Connected(socket) => self.channel.attach(socket),
			Event::ConnectFailed(reason) => self.channel.fail(&reason),
			Event::Status(state) => self.on_status(state),
			Event::Inbound(payload) => self.on_inbound(&payload),
			Event::CameraGranted(frames) => self.on_camera_granted(frames),
			Event::CameraDenied(reason) => self.on_camera_denied(&reason),
			Event::Encoded{tick, jpeg} => self.on_encoded(tick, jpeg),
			Event::Teardown => {},
		}
	}

	fn on_status(&mut self, state: ConnState) {
		info!("connection", tags![
			("state", state.as_str())
		]);
		let line = state.describe(self.panel.locale());
		if let Err(e) = self.panel.status(line) {
			error!("couldn't write to panel", tags![
				("error", &e.to_string())
			]);
		}
	}

	fn on_inbound(&mut self, payload: &str) {
		let msg = match interpret::decode(payload) {
			Ok(msg) => msg,
			Err(e) => {
				info!("received message", tags![
					("payload", payload),
					("error", &e.to_string())
				]);
				return;
			},
		};

		if let Some(note) = msg.message.as_ref() {
			debug!("service note", tags![
				("message", note)
			]);
		}

		let tier = interpret::classify(&msg.result);
		debug!("classified", tags![
			("tier", tier.as_str())
		]);
		if let Err(e) = self.panel.append(&msg.result, tier, Local::now().time()) {
			error!("couldn't write to panel", tags![
				("error", &e.to_string())
			]);
		}

		if let Some(ear) = msg.result.ear {
			self.history.push(ear);
			if let Err(e) = self.chart.redraw(&self.history) {
				error!("couldn't redraw chart", tags![
					("error", &e.to_string())
				]);
			}
		}
	}

	fn on_camera_granted(&mut self, frames: FrameReceiver) {
		if self.capture.is_running() {
			warn!("camera granted twice - ignoring");
			return;
		}
		let msg = match self.panel.locale() {
			Locale::En => "camera connected",
			Locale::Ko => "카메라 연결됨",
		};
		if let Err(e) = self.panel.alert(msg) {
			error!("couldn't write to panel", tags![
				("error", &e.to_string())
			]);
		}
		self.capture.start(frames, Instant::now());
	}

	// Capture never starts for this session.
	fn on_camera_denied(&mut self, reason: &str) {
		let msg = match self.panel.locale() {
			Locale::En => format!("camera access failed: {}", reason),
			Locale::Ko => format!("카메라 접근 실패: {}", reason),
		};
		let written = self.panel.alert(&msg)
			.and_then(|_| self.panel.error_line(&msg));
		if let Err(e) = written {
			error!("couldn't write to panel", tags![
				("error", &e.to_string())
			]);
		}
	}

	fn on_encoded(&mut self, tick: u64, jpeg: Option<Vec<u8>>) {
		if !self.capture.finish(tick) {
			return;
		}
		if let Some(jpeg) = jpeg {
			let len = jpeg.len();
			if !self.channel.send(jpeg) {
				debug!("frame dropped", tags![
					("tick", &tick.to_string()),
					("state", self.channel.state().as_str()),
					("bytes", &len.to_string())
				]);
			}
		}
	}

	pub fn teardown(&mut self) {
		let cancelled = self.capture.stop();
		self.channel.close();

		// Only the closing status line is still worth showing.
		while let Ok(ev) = self.queue.try_recv() {
			if let Event::Status(state) = ev {
				self.on_status(state);
			}
		}

		info!("shutdown complete", tags![
			("cancelled_encodes", &cancelled.to_string()),
			("ticks", &self.capture.ticks().to_string()),
			("frames_sent", &self.channel.sent().to_string()),
			("frames_dropped", &self.channel.dropped().to_string()),
			("entries", &self.panel.entries().to_string()),
			("ear_samples", &self.history.len().to_string()),
			("chart_redraws", &self.chart.redraws().to_string())
		]);
	}
}

pub struct SessionRAII{
	handle: Option<JoinHandle<()>>,
	events: Sender<Event>,
}

impl SessionRAII {
	pub fn new(d: Arc<Dozewatch>) -> Result<Self> {
		let (events, queue) = channel();
		let tx = events.clone();

		let handle = Builder::new()
			.name("session".to_string())
			.spawn(move || start_session(d, tx, queue))?;

		Ok(Self{
			handle: Some(handle),
			events: events,
		})
	}

	// False once the session thread has exited on its own.
	pub fn is_alive(&self) -> bool {
		match self.handle.as_ref() {
			Some(handle) => !handle.is_finished(),
			None => false,
		}
	}
}

impl Drop for SessionRAII {
	fn drop(&mut self) {
		if let Err(e) = self.events.send(Event::Teardown) {
			error!("couldn't send teardown to session", tags![
				("error", &e.to_string())
			]);
		}
		if let Some(handle) = self.handle.take() {
			if handle.join().is_err() {
				error!("session thread panicked");
			}
		}
	}
}

fn start_session(d: Arc<Dozewatch>,
				 events: Sender<Event>,
				 queue: Receiver<Event>) {
	let surface = PngSurface::new(d.config.chart_path.clone(),
								  d.config.chart_resolution);
	let mut session = Session::new(d, events, queue,
								   Box::new(io::stdout()), Box::new(surface));

	info!("session started");
	if let Err(e) = session.start() {
		error!("session crashed", tags![
			("error", &e.to_string())
		]);
		session.teardown();
		return;
	}
	session.run();
}
