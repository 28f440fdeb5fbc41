// Key value logging macros

use std::io::Write;
use std::sync::OnceLock;
use std::thread;

use chrono::{Local, SecondsFormat};

pub type Tags<'a> = Vec<(&'static str, &'a str)>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
	Debug,
	Info,
	Warn,
	Error,
}

impl Level {
	fn as_str(self) -> &'static str {
		match self {
			Level::Debug => "debug",
			Level::Info => "info",
			Level::Warn => "warn",
			Level::Error => "error",
		}
	}

	fn parse(s: &str) -> Option<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"debug" => Some(Level::Debug),
			"info" => Some(Level::Info),
			"warn" => Some(Level::Warn),
			"error" => Some(Level::Error),
			_ => None,
		}
	}
}

// The tags macro is essentially the same as vec![]
// Where the elements are of type (&'static str, &str)

#[macro_export]
macro_rules! tags {
	($($x:expr),* $(,)?) => {
		vec![
			$($x),*
		]
	};
}

#[macro_export]
macro_rules! debug {
	($msg:expr) => {
		$crate::ltsv::log($crate::ltsv::Level::Debug, $msg, $crate::ltsv::Tags::new())
	};
	($msg:expr, $kvs:expr) => {
		$crate::ltsv::log($crate::ltsv::Level::Debug, $msg, $kvs)
	};
}

#[macro_export]
macro_rules! info {
	($msg:expr) => {
		$crate::ltsv::log($crate::ltsv::Level::Info, $msg, $crate::ltsv::Tags::new())
	};
	($msg:expr, $kvs:expr) => {
		$crate::ltsv::log($crate::ltsv::Level::Info, $msg, $kvs)
	};
}

#[macro_export]
macro_rules! warn {
	($msg:expr) => {
		$crate::ltsv::log($crate::ltsv::Level::Warn, $msg, $crate::ltsv::Tags::new())
	};
	($msg:expr, $kvs:expr) => {
		$crate::ltsv::log($crate::ltsv::Level::Warn, $msg, $kvs)
	};
}

#[macro_export]
macro_rules! error {
	($msg:expr) => {
		$crate::ltsv::log($crate::ltsv::Level::Error, $msg, $crate::ltsv::Tags::new())
	};
	($msg:expr, $kvs:expr) => {
		$crate::ltsv::log($crate::ltsv::Level::Error, $msg, $kvs)
	};
}

// DOZEWATCH_LOG picks the lowest level written, default info.
fn threshold() -> Level {
	static THRESHOLD: OnceLock<Level> = OnceLock::new();
	*THRESHOLD.get_or_init(|| {
		std::env::var("DOZEWATCH_LOG")
			.ok()
			.and_then(|s| Level::parse(&s))
			.unwrap_or(Level::Info)
	})
}

fn ltsv_encode(buf: &mut String, key: &str, value: &str) {
	// Encode the key
	for c in key.chars() {
		if c == '\\' || c == '\n' || c == '\t' || c == '=' {
			buf.push('\\');
		}
		buf.push(c)
	}

	buf.push('=');

	for c in value.chars() {
		if c == '\\' || c == '\n' || c == '\t' || c == '=' {
			buf.push('\\');
		}
		buf.push(c)
	}
}

fn format_line(level: Level, msg: &str, tags: &[(&str, &str)]) -> String {
	let mut log_line = String::with_capacity(1024);

	let now = Local::now().to_rfc3339_opts(SecondsFormat::Millis, false);
	ltsv_encode(&mut log_line, "time", &now);

	log_line.push('\t');
	ltsv_encode(&mut log_line, "thread",
				thread::current()
					.name()
					.unwrap_or("unnamed"));

	log_line.push('\t');
	ltsv_encode(&mut log_line, "level", level.as_str());

	log_line.push('\t');
	ltsv_encode(&mut log_line, "msg", msg);

	for (key, value) in tags.iter() {
		log_line.push('\t');
		ltsv_encode(&mut log_line, key, value);
	}
	log_line
}

// stdout belongs to the log panel so diagnostics go to stderr.
pub fn log(level: Level,
		   msg: &str,
		   tags: Tags) {
	if level < threshold() {
		return;
	}

	let line = format_line(level, msg, &tags);
	let stderr = std::io::stderr();
	let mut handle = stderr.lock();
	let _ = writeln!(handle, "{}", line);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn escapes_separators_in_values() {
		let mut buf = String::new();
		ltsv_encode(&mut buf, "payload", "a\tb=c\nd");
		assert_eq!(buf, "payload=a\\\tb\\=c\\\nd");
	}

	#[test]
	fn line_has_fixed_prefix_then_tags() {
		let line = format_line(Level::Warn, "dropped frame", &[("tick", "7")]);
		let fields: Vec<&str> = line.split('\t').collect();

		assert_eq!(fields.len(), 5);
		assert!(fields[0].starts_with("time="));
		assert!(fields[1].starts_with("thread="));
		assert_eq!(fields[2], "level=warn");
		assert_eq!(fields[3], "msg=dropped frame");
		assert_eq!(fields[4], "tick=7");
	}

	#[test]
	fn parses_levels_loosely() {
		assert_eq!(Level::parse(" DEBUG "), Some(Level::Debug));
		assert_eq!(Level::parse("error"), Some(Level::Error));
		assert_eq!(Level::parse("loud"), None);
		assert!(Level::Debug < Level::Error);
	}
}
