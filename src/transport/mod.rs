use std::sync::mpsc::Sender;
use std::thread::Builder;

use crate::errors::*;
use crate::interpret::Locale;
use crate::session::Event;
use crate::{debug, error, info, tags};

pub mod ws;
use ws::WsSocket;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnState {
	Connecting,
	Open,
	Closed,
	Error,
}

impl ConnState {
	pub fn is_terminal(self) -> bool {
		self == ConnState::Closed || self == ConnState::Error
	}

	pub fn as_str(self) -> &'static str {
		match self {
			ConnState::Connecting => "connecting",
			ConnState::Open => "open",
			ConnState::Closed => "closed",
			ConnState::Error => "error",
		}
	}

	// The line written to the log panel on entering this state.
	pub fn describe(self, locale: Locale) -> &'static str {
		match (self, locale) {
			(ConnState::Connecting, Locale::En) => "connecting to analysis service",
			(ConnState::Connecting, Locale::Ko) => "WebSocket 연결 중",
			(ConnState::Open, Locale::En) => "websocket connected",
			(ConnState::Open, Locale::Ko) => "WebSocket 연결됨",
			(ConnState::Closed, Locale::En) => "websocket closed",
			(ConnState::Closed, Locale::Ko) => "WebSocket 연결 종료됨",
			(ConnState::Error, Locale::En) => "websocket error",
			(ConnState::Error, Locale::Ko) => "WebSocket 오류 발생",
		}
	}
}

#[derive(Debug, PartialEq)]
pub enum Received {
	Nothing,
	Payload(String),
	// A binary frame of this many bytes. The service only speaks
	// text, so these are never interpreted.
	NonText(usize),
	Closed,
}

// A connected, non-blocking message socket.
pub trait Socket: Send {
	// Ok(false) means the socket dropped the payload without failing.
	fn send_binary(&mut self, data: Vec<u8>) -> Result<bool>;
	fn poll(&mut self) -> Result<Received>;
	fn close(&mut self) -> Result<()>;
}

// Channel owns the one connection of a session. Status changes and
// inbound payloads are posted to the session's event queue in the
// order they happen.
pub struct Channel {
	url: String,
	state: ConnState,
	socket: Option<Box<dyn Socket>>,
	events: Sender<Event>,
	sent: u64,
	dropped: u64,
}

impl Channel {
	pub fn new(url: String, events: Sender<Event>) -> Self {
		Self{
			url: url,
			state: ConnState::Connecting,
			socket: None,
			events: events,
			sent: 0,
			dropped: 0,
		}
	}

	pub fn state(&self) -> ConnState {
		self.state
	}

	pub fn sent(&self) -> u64 {
		self.sent
	}

	pub fn dropped(&self) -> u64 {
		self.dropped
	}

	// Starts the connection attempt in the background. The result
	// comes back as Event::Connected or Event::ConnectFailed.
	pub fn connect(&mut self) -> Result<()> {
		let _ = self.events.send(Event::Status(ConnState::Connecting));

		let url = self.url.clone();
		let events = self.events.clone();
		info!("connecting", tags![
			("url", &url)
		]);
		Builder::new()
			.name("connector".to_string())
			.spawn(move || {
				let ev = match WsSocket::connect(&url) {
					Ok(socket) => Event::Connected(Box::new(socket)),
					Err(e) => Event::ConnectFailed(e.to_string()),
				};
				let _ = events.send(ev);
			})?;
		Ok(())
	}

	pub fn attach(&mut self, mut socket: Box<dyn Socket>) {
		if self.state != ConnState::Connecting {
			// Torn down while the handshake was in progress.
			let _ = socket.close();
			return;
		}
		self.socket = Some(socket);
		self.transition(ConnState::Open);
	}

	pub fn fail(&mut self, reason: &str) {
		error!("connection failed", tags![
			("url", &self.url),
			("error", reason)
		]);
		self.socket.take();
		self.transition(ConnState::Error);
	}

	// Sends only while open. Anything else drops the payload
	// without telling the caller why.
	pub fn send(&mut self, data: Vec<u8>) -> bool {
		if self.state != ConnState::Open {
			self.dropped += 1;
			return false;
		}

		let result = match self.socket.as_mut() {
			Some(socket) => socket.send_binary(data),
			None => {
				self.dropped += 1;
				return false;
			},
		};

		match result {
			Ok(true) => {
				self.sent += 1;
				true
			},
			Ok(false) => {
				self.dropped += 1;
				false
			},
			Err(e) => {
				self.fail(&e.to_string());
				self.dropped += 1;
				false
			},
		}
	}

	// Drains everything readable right now.
	pub fn poll(&mut self) {
		loop {
			let received = match self.socket.as_mut() {
				Some(socket) => socket.poll(),
				None => return,
			};

			match received {
				Ok(Received::Nothing) => return,
				Ok(Received::Payload(text)) => {
					let _ = self.events.send(Event::Inbound(text));
				},
				Ok(Received::NonText(len)) => {
					info!("received message", tags![
						("url", &self.url),
						("binary_bytes", &len.to_string()),
						("error", "not a text frame")
					]);
				},
				Ok(Received::Closed) => {
					info!("closed by peer", tags![
						("url", &self.url)
					]);
					self.socket.take();
					self.transition(ConnState::Closed);
					return;
				},
				Err(e) => {
					self.fail(&e.to_string());
					return;
				},
			}
		}
	}

	pub fn close(&mut self) {
		if let Some(mut socket) = self.socket.take() {
			if let Err(e) = socket.close() {
				error!("couldn't close websocket", tags![
					("error", &e.to_string())
				]);
			}
		}
		self.transition(ConnState::Closed);
	}

	fn transition(&mut self, to: ConnState) {
		if self.state.is_terminal() || self.state == to {
			return;
		}
		debug!("connection state", tags![
			("from", self.state.as_str()),
			("to", to.as_str())
		]);
		self.state = to;
		let _ = self.events.send(Event::Status(to));
	}
}
