use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use std::thread;

use clap::Parser;

mod errors;
use errors::*;
mod dozewatch;
use dozewatch::{Config, Dozewatch};
mod session;
use session::SessionRAII;
mod capture;
use capture::OverlapPolicy;
mod interpret;
use interpret::Locale;
mod render;
mod transport;

mod ltsv;

/// Stream webcam frames to a drowsiness analysis service and
/// show what it sees.
#[derive(Parser, Debug)]
#[command(name = "dozewatch", version)]
struct Args {
	/// JSON configuration file
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Analysis service endpoint (ws:// or wss://)
	#[arg(short, long)]
	url: Option<String>,

	/// V4L2 capture device
	#[arg(short, long)]
	device: Option<String>,

	/// Where the EAR chart PNG is written
	#[arg(long)]
	chart: Option<PathBuf>,

	#[arg(long, value_enum)]
	locale: Option<Locale>,

	/// What to do when a capture tick fires while another is encoding
	#[arg(long, value_enum)]
	overlap: Option<OverlapPolicy>,
}

impl Args {
	fn into_config(self) -> Result<Config> {
		let mut config = match &self.config {
			Some(path) => {
				info!("loading config", tags![
					("path", &path.display().to_string())
				]);
				Config::load(path)?
			},
			None => Config::default(),
		};

		if let Some(url) = self.url {
			config.endpoint = url;
		}
		if let Some(device) = self.device {
			config.webcam_device = device;
		}
		if let Some(chart) = self.chart {
			config.chart_path = chart;
		}
		if let Some(locale) = self.locale {
			config.locale = locale;
		}
		if let Some(overlap) = self.overlap {
			config.overlap = overlap;
		}
		Ok(config)
	}
}

fn run() -> Result<()> {
	let config = Args::parse().into_config()?;
	info!("dozewatch started", tags![
		("endpoint", &config.endpoint),
		("webcam_device", &config.webcam_device)
	]);
	let d = Arc::new(Dozewatch::new(config)?);

	// Ctrl-C handler
	let running = Arc::new(AtomicBool::new(true));
	let r = running.clone();

	ctrlc::set_handler(move || {
		info!("received ctrlc - closing");
		r.store(false, Ordering::SeqCst);
	})?;

	// Dropping this tears the session down.
	let session = SessionRAII::new(d)?;

	// poll for shutdown twenty times per second
	while running.load(Ordering::SeqCst) {
		if !session.is_alive() {
			warn!("session ended - closing");
			break;
		}
		thread::sleep(Duration::from_millis(50));
	}

	Ok(())
}

fn main() {
	if let Err(e) = run() {
		error!("something went wrong", tags![
			("error", &e.to_string())
		]);
	}
}
