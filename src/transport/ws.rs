use std::io::ErrorKind::WouldBlock;
use std::net::TcpStream;

use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::errors::*;
use crate::transport::{Received, Socket};
use crate::{info, warn, tags};

pub struct WsSocket {
	ws: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl WsSocket {
	// Blocks until the handshake completes; there is no timeout.
	pub fn connect(url: &str) -> Result<Self> {
		let (mut ws, response) = tungstenite::connect(url)?;
		info!("websocket handshake complete", tags![
			("url", url),
			("status", response.status().as_str())
		]);

		// From here on the session loop polls the socket.
		match ws.get_mut() {
			MaybeTlsStream::Plain(s) => s.set_nonblocking(true)?,
			MaybeTlsStream::Rustls(s) => s.get_mut().set_nonblocking(true)?,
			_ => {
				return Err(Error::boxed(ErrorType::UnsupportedStream,
					"unknown websocket stream type"));
			},
		}

		Ok(Self{ws: ws})
	}
}

fn would_block(e: &tungstenite::Error) -> bool {
	match e {
		tungstenite::Error::Io(e) => e.kind() == WouldBlock,
		_ => false,
	}
}

impl Socket for WsSocket {
	fn send_binary(&mut self, data: Vec<u8>) -> Result<bool> {
		match self.ws.send(Message::Binary(data)) {
			Ok(()) => Ok(true),
			// Queued inside tungstenite; flushed on a later poll.
			Err(ref e) if would_block(e) => Ok(true),
			Err(tungstenite::Error::WriteBufferFull(_)) => {
				warn!("write buffer full - frame dropped");
				Ok(false)
			},
			Err(e) => Err(e.into()),
		}
	}

	fn poll(&mut self) -> Result<Received> {
		match self.ws.flush() {
			Ok(()) => {},
			Err(ref e) if would_block(e) => {},
			Err(tungstenite::Error::ConnectionClosed) => return Ok(Received::Closed),
			Err(e) => return Err(e.into()),
		}

		loop {
			match self.ws.read() {
				Ok(Message::Text(text)) => return Ok(Received::Payload(text)),
				Ok(Message::Binary(data)) => return Ok(Received::NonText(data.len())),
				Ok(Message::Close(_)) => return Ok(Received::Closed),
				// Pings are answered by tungstenite itself.
				Ok(_) => {},
				Err(ref e) if would_block(e) => return Ok(Received::Nothing),
				Err(tungstenite::Error::ConnectionClosed) |
				Err(tungstenite::Error::AlreadyClosed) => return Ok(Received::Closed),
				Err(e) => return Err(e.into()),
			}
		}
	}

	fn close(&mut self) -> Result<()> {
		match self.ws.close(None) {
			Ok(()) => Ok(()),
			Err(ref e) if would_block(e) => Ok(()),
			Err(tungstenite::Error::ConnectionClosed) |
			Err(tungstenite::Error::AlreadyClosed) => Ok(()),
			Err(e) => Err(e.into()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::TcpListener;
	use std::sync::mpsc::channel;
	use std::thread::{self, JoinHandle};
	use std::time::{Duration, Instant};

	// Runs `script` against the first client on a loopback listener,
	// then keeps the connection up until the client lets go.
	fn serve<F>(script: F) -> (String, JoinHandle<()>)
	where F: FnOnce(&mut WebSocket<TcpStream>) + Send + 'static {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let url = format!("ws://{}/ws", listener.local_addr().unwrap());
		let handle = thread::spawn(move || {
			let (stream, _) = listener.accept().unwrap();
			let mut ws = tungstenite::accept(stream).unwrap();
			script(&mut ws);
			while ws.read().is_ok() {}
		});
		(url, handle)
	}

	fn next(socket: &mut WsSocket) -> Received {
		let deadline = Instant::now() + Duration::from_secs(5);
		loop {
			match socket.poll().unwrap() {
				Received::Nothing => {
					assert!(Instant::now() < deadline, "nothing arrived");
					thread::sleep(Duration::from_millis(5));
				},
				received => return received,
			}
		}
	}

	#[test]
	fn poll_returns_nothing_until_text_arrives() {
		let (go, wait) = channel::<()>();
		let (url, server) = serve(move |ws| {
			wait.recv().unwrap();
			ws.send(Message::Text("{\"result\":{}}".to_string())).unwrap();
		});
		let mut socket = WsSocket::connect(&url).unwrap();

		// Would hang here if the stream were still blocking.
		assert_eq!(socket.poll().unwrap(), Received::Nothing);

		go.send(()).unwrap();
		assert_eq!(next(&mut socket), Received::Payload("{\"result\":{}}".to_string()));

		drop(socket);
		server.join().unwrap();
	}

	#[test]
	fn binary_frames_are_not_payloads() {
		let body = br#"{"result":{"direction":"back","action":"sitting","sleep_status":"awake","ear":0.25}}"#;
		let (url, server) = serve(move |ws| {
			ws.send(Message::Binary(body.to_vec())).unwrap();
		});
		let mut socket = WsSocket::connect(&url).unwrap();

		assert_eq!(next(&mut socket), Received::NonText(body.len()));

		drop(socket);
		server.join().unwrap();
	}

	#[test]
	fn peer_close_is_reported() {
		let (url, server) = serve(|ws| {
			ws.close(None).unwrap();
		});
		let mut socket = WsSocket::connect(&url).unwrap();

		assert_eq!(next(&mut socket), Received::Closed);

		drop(socket);
		server.join().unwrap();
	}

	#[test]
	fn sent_frames_reach_the_peer() {
		let (got, seen) = channel();
		let (url, server) = serve(move |ws| {
			got.send(ws.read().unwrap()).unwrap();
			got.send(ws.read().unwrap()).unwrap();
		});
		let mut socket = WsSocket::connect(&url).unwrap();

		assert!(socket.send_binary(vec![0xff, 0xd8, 0xff]).unwrap());
		let first = seen.recv_timeout(Duration::from_secs(5)).unwrap();
		assert_eq!(first, Message::Binary(vec![0xff, 0xd8, 0xff]));

		socket.close().unwrap();
		let second = seen.recv_timeout(Duration::from_secs(5)).unwrap();
		assert!(matches!(second, Message::Close(_)));

		drop(socket);
		server.join().unwrap();
	}
}
