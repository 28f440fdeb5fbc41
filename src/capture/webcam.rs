use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::Builder;

use rscam::Camera;

use crate::capture::frameslot::{self, frameslot};
use crate::capture::Frame;
use crate::dozewatch::Dozewatch;
use crate::errors::*;
use crate::session::Event;
use crate::{error, info, tags};

// Give up on a camera that keeps failing mid-session.
const MAX_CONSECUTIVE_ERRORS: u32 = 30;

// Ask for the camera once. The answer arrives on the session's
// event queue as CameraGranted or CameraDenied; on success this
// thread stays behind to keep the frame slot fresh.
pub fn request(d: Arc<Dozewatch>, events: Sender<Event>) -> Result<()> {
	Builder::new()
		.name("camera".to_string())
		.spawn(move || {
			let camera = match open(&d) {
				Ok(camera) => camera,
				Err(e) => {
					error!("couldn't open camera", tags![
						("webcam_device", &d.config.webcam_device),
						("error", &e.to_string())
					]);
					let _ = events.send(Event::CameraDenied(e.to_string()));
					return;
				},
			};

			let (sender, receiver) = frameslot();
			if events.send(Event::CameraGranted(receiver)).is_err() {
				// Session finished before the grant came through.
				return;
			}

			info!("capture started");
			webcam_run(camera, sender);
		})?;
	Ok(())
}

fn open(d: &Dozewatch) -> Result<Camera> {
	info!("opening camera", tags![
		("webcam_device", &d.config.webcam_device),
		("webcam_interval", &format!("{:?}", &d.config.webcam_interval)),
		("webcam_resolution", &format!("{:?}", &d.config.webcam_resolution))
	]);
	let mut camera = Camera::new(&d.config.webcam_device)?;
	let config = rscam::Config{
		interval: d.config.webcam_interval,
		resolution: d.config.webcam_resolution,
		format: b"YUYV",
		nbuffers: 2,
		field: rscam::FIELD_NONE,
	};

	camera.start(&config)?;

	// Check it's working
	for _ in 0..3 {
		camera.capture()?;
	}

	Ok(camera)
}

fn webcam_run(camera: Camera,
			  mut sender: frameslot::Sender<Arc<Frame>>) {
	let mut failures = 0;

	loop {
		match camera.capture() {
			Err(e) => {
				failures += 1;
				error!("couldn't read frame", tags![
					("error", &e.to_string()),
					("consecutive", &failures.to_string())
				]);
				if failures >= MAX_CONSECUTIVE_ERRORS {
					break;
				}
			},
			Ok(frame) => {
				failures = 0;
				let (width, height) = frame.resolution;
				let sample = Arc::new(Frame{
					data: frame.to_vec(),
					width: width,
					height: height,
					timestamp: frame.get_timestamp(),
				});

				// No receivers left means the session has let go.
				if sender.publish(sample) == 0 {
					break;
				}
			},
		}
	}

	// Dropping the camera stops streaming and closes the device.
	info!("camera released");
}
