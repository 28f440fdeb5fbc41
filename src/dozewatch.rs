use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::capture::OverlapPolicy;
use crate::errors::*;
use crate::interpret::Locale;

// The capture constants and the EAR threshold are shared with the
// analysis service and must match its own configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
	pub endpoint: String,
	pub webcam_device: String,
	pub webcam_interval: (u32, u32),
	pub webcam_resolution: (u32, u32),
	pub capture_resolution: (u32, u32),
	pub capture_interval_ms: u64,
	pub jpeg_quality: f32,
	pub ear_threshold: f64,
	pub history_depth: usize,
	pub chart_path: PathBuf,
	pub chart_resolution: (u32, u32),
	pub locale: Locale,
	pub overlap: OverlapPolicy,
}

impl Default for Config {
	fn default() -> Self {
		Self{
			endpoint: "wss://localhost:8000/ws".to_string(),
			webcam_device: "/dev/video0".to_string(),
			webcam_interval: (1, 30),
			webcam_resolution: (640, 480),
			capture_resolution: (480, 360),
			capture_interval_ms: 500,
			jpeg_quality: 0.8,
			ear_threshold: 0.3,
			history_depth: 50,
			chart_path: PathBuf::from("ear_chart.png"),
			chart_resolution: (480, 150),
			locale: Locale::En,
			overlap: OverlapPolicy::Concurrent,
		}
	}
}

impl Config {
	pub fn load(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)?;
		Ok(serde_json::from_str(&content)?)
	}

	pub fn validate(&self) -> Result<()> {
		let invalid = |detail: &str| -> Result<()> {
			Err(Error::boxed(ErrorType::InvalidConfig, detail))
		};

		if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
			return invalid("endpoint must be a ws:// or wss:// url");
		}
		if self.capture_interval_ms == 0 {
			return invalid("captureIntervalMs must be positive");
		}
		if !(self.jpeg_quality > 0.0 && self.jpeg_quality <= 1.0) {
			return invalid("jpegQuality must be in (0, 1]");
		}
		if !(self.ear_threshold >= 0.0 && self.ear_threshold <= 1.0) {
			return invalid("earThreshold must be in [0, 1]");
		}
		if self.history_depth == 0 {
			return invalid("historyDepth must be positive");
		}
		if self.capture_resolution.0 == 0 || self.capture_resolution.1 == 0 {
			return invalid("captureResolution must be non-zero");
		}
		if self.chart_resolution.0 == 0 || self.chart_resolution.1 == 0 {
			return invalid("chartResolution must be non-zero");
		}
		// YUYV packs pixels in pairs.
		if self.webcam_resolution.0 % 2 != 0 {
			return invalid("webcamResolution width must be even");
		}
		Ok(())
	}
}

// Dozewatch is the validated configuration shared by all threads.
#[derive(Debug)]
pub struct Dozewatch {
	pub config: Config,
}

impl Dozewatch {
	pub fn new(config: Config) -> Result<Self> {
		config.validate()?;
		Ok(Self{
			config: config,
		})
	}
}
