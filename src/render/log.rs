// The log panel is the terminal: entries are written to the end of
// the sink and flushed so the newest one is always in view. Nothing
// written is ever rewritten.

use std::io::Write;

use chrono::NaiveTime;

use crate::errors::*;
use crate::interpret::{AnalysisResult, Locale, Tier};
use crate::render::Rgb;

const RESET: &str = "\x1b[0m";

pub struct LogPanel {
	out: Box<dyn Write + Send>,
	locale: Locale,
	entries: usize,
	lines: usize,
}

impl LogPanel {
	pub fn new(out: Box<dyn Write + Send>, locale: Locale) -> Self {
		Self{
			out: out,
			locale: locale,
			entries: 0,
			lines: 0,
		}
	}

	pub fn locale(&self) -> Locale {
		self.locale
	}

	// Number of analysis entries appended so far. Status lines
	// and alerts are not counted.
	pub fn entries(&self) -> usize {
		self.entries
	}

	pub fn lines(&self) -> usize {
		self.lines
	}

	pub fn status(&mut self, line: &str) -> Result<()> {
		self.write_line(&format!("-- {}", line))
	}

	pub fn alert(&mut self, msg: &str) -> Result<()> {
		self.write_line(&format!("\x1b[1m!! {}{}", msg, RESET))
	}

	pub fn error_line(&mut self, msg: &str) -> Result<()> {
		self.write_line(&format!("xx {}", msg))
	}

	pub fn append(&mut self,
				  result: &AnalysisResult,
				  tier: Tier,
				  at: NaiveTime) -> Result<()> {
		let body = format_entry(result, self.locale, at);
		self.write_line(&paint(&body, tier.color()))?;
		self.entries += 1;
		Ok(())
	}

	fn write_line(&mut self, line: &str) -> Result<()> {
		writeln!(self.out, "{}", line)?;
		self.out.flush()?;
		self.lines += 1;
		Ok(())
	}
}

pub fn format_entry(result: &AnalysisResult, locale: Locale, at: NaiveTime)
	-> String {

	let ear = match result.ear {
		Some(ear) => format!("{}", ear),
		None => "-".to_string(),
	};

	let (direction, action, sleep) = match locale {
		Locale::En => ("direction", "action", "sleep"),
		Locale::Ko => ("방향", "자세", "상태"),
	};

	format!("[{}] {}: {} | {}: {} | {}: {} | EAR: {}",
			at.format("%H:%M:%S"),
			direction, result.direction.label(locale),
			action, result.action.label(locale),
			sleep, result.sleep_status.label(locale),
			ear)
}

// 24-bit background with white foreground.
fn paint(text: &str, bg: Rgb) -> String {
	format!("\x1b[48;2;{};{};{}m\x1b[97m {} {}", bg.0, bg.1, bg.2, text, RESET)
}
