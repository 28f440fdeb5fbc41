use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, RgbImage};

use crate::capture::Frame;
use crate::errors::*;

// Rasterize a camera frame onto a `surface`-sized RGB image and
// compress it. `quality` is in (0, 1].
pub fn encode(frame: &Frame, surface: (u32, u32), quality: f32)
	-> Result<Vec<u8>> {

	let rgb = yuyv_to_rgb(&frame.data, frame.width, frame.height)?;

	let rgb = if (rgb.width(), rgb.height()) == surface {
		rgb
	} else {
		imageops::resize(&rgb, surface.0, surface.1, FilterType::Triangle)
	};

	let mut jpeg = Vec::with_capacity((surface.0 * surface.1 / 4) as usize);
	let mut enc = JpegEncoder::new_with_quality(&mut jpeg, jpeg_quality(quality));
	enc.encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?;
	Ok(jpeg)
}

pub fn jpeg_quality(quality: f32) -> u8 {
	(quality * 100.0).round().max(1.0).min(100.0) as u8
}

// YUYV 4:2:2 packs two pixels into four bytes sharing U and V.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<RgbImage> {
	let (w, h) = (width as usize, height as usize);
	if w % 2 != 0 || yuyv.len() != w * h * 2 {
		return Err(Error::boxed(ErrorType::InvalidFrame,
			format!("{} bytes for {}x{} yuyv", yuyv.len(), width, height)));
	}

	let clamp = |v: i32| -> u8 { v.max(0).min(255) as u8 };
	let mut rgb = Vec::with_capacity(w * h * 3);

	for px in yuyv.chunks_exact(4) {
		let y0 = px[0] as i32 - 16;
		let u = px[1] as i32 - 128;
		let y1 = px[2] as i32 - 16;
		let v = px[3] as i32 - 128;

		for y in [y0, y1].iter() {
			rgb.push(clamp((298 * y + 409 * v + 128) >> 8));
			rgb.push(clamp((298 * y - 100 * u - 208 * v + 128) >> 8));
			rgb.push(clamp((298 * y + 516 * u + 128) >> 8));
		}
	}

	match RgbImage::from_raw(width, height, rgb) {
		Some(img) => Ok(img),
		None => Err(Error::boxed(ErrorType::InvalidFrame,
			"rgb buffer size mismatch")),
	}
}
