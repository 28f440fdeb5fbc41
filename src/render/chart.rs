use std::collections::VecDeque;
use std::path::PathBuf;

use plotters::prelude::{
	BitMapBackend, IntoDrawingArea, PathElement, RGBColor, ShapeStyle,
};

use crate::errors::*;
use crate::render::Rgb;

const BACKGROUND: Rgb = Rgb(0x11, 0x11, 0x11);
const THRESHOLD_COLOR: Rgb = Rgb(0x44, 0x44, 0x44);
const LINE_COLOR: Rgb = Rgb(0x00, 0xea, 0xff);

// HistoryBuffer keeps the most recent `capacity` readings,
// oldest first.
pub struct HistoryBuffer {
	values: VecDeque<f64>,
	capacity: usize,
}

impl HistoryBuffer {
	pub fn new(capacity: usize) -> Self {
		Self{
			values: VecDeque::with_capacity(capacity + 1),
			capacity: capacity,
		}
	}

	pub fn push(&mut self, value: f64) {
		self.values.push_back(value);
		while self.values.len() > self.capacity {
			self.values.pop_front();
		}
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	#[cfg(test)]
	pub fn last(&self) -> Option<f64> {
		self.values.back().copied()
	}

	pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
		self.values.iter().copied()
	}
}

// A drawing surface in pixel space, origin top left.
pub trait Surface: Send {
	fn size(&self) -> (u32, u32);
	fn clear(&mut self);
	fn stroke(&mut self, points: &[(f64, f64)], color: Rgb);
	fn present(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
	pub threshold: [(f64, f64); 2],
	pub line: Vec<(f64, f64)>,
}

// x advances by width / capacity per sample so a partially
// filled buffer only covers the left part of the chart.
pub fn plot(history: &HistoryBuffer, threshold: f64, size: (u32, u32)) -> Plot {
	let width = size.0 as f64;
	let height = size.1 as f64;
	let depth = history.capacity().max(1) as f64;

	let threshold_y = height * (1.0 - threshold);

	let line = history
		.iter()
		.enumerate()
		.map(|(i, v)| (i as f64 * width / depth, height * (1.0 - v)))
		.collect();

	Plot{
		threshold: [(0.0, threshold_y), (width, threshold_y)],
		line: line,
	}
}

pub struct Chart {
	surface: Box<dyn Surface>,
	threshold: f64,
	redraws: u64,
}

impl Chart {
	pub fn new(surface: Box<dyn Surface>, threshold: f64) -> Self {
		Self{
			surface: surface,
			threshold: threshold,
			redraws: 0,
		}
	}

	pub fn redraws(&self) -> u64 {
		self.redraws
	}

	pub fn redraw(&mut self, history: &HistoryBuffer) -> Result<()> {
		let p = plot(history, self.threshold, self.surface.size());

		self.surface.clear();
		self.surface.stroke(&p.threshold, THRESHOLD_COLOR);
		if !history.is_empty() {
			self.surface.stroke(&p.line, LINE_COLOR);
		}
		self.redraws += 1;
		self.surface.present()
	}
}

// PngSurface records strokes and renders them with plotters
// into a PNG on present.
pub struct PngSurface {
	path: PathBuf,
	size: (u32, u32),
	strokes: Vec<(Vec<(i32, i32)>, Rgb)>,
}

impl PngSurface {
	pub fn new(path: PathBuf, size: (u32, u32)) -> Self {
		Self{
			path: path,
			size: size,
			strokes: vec![],
		}
	}
}

fn to_plotters(c: Rgb) -> RGBColor {
	RGBColor(c.0, c.1, c.2)
}

fn render_error<E: std::fmt::Debug>(e: E) -> Box<Error> {
	Error::boxed(ErrorType::ChartRender, format!("{:?}", e))
}

impl Surface for PngSurface {
	fn size(&self) -> (u32, u32) {
		self.size
	}

	fn clear(&mut self) {
		self.strokes.clear();
	}

	fn stroke(&mut self, points: &[(f64, f64)], color: Rgb) {
		let points = points
			.iter()
			.map(|&(x, y)| (x.round() as i32, y.round() as i32))
			.collect();
		self.strokes.push((points, color));
	}

	fn present(&mut self) -> Result<()> {
		let root = BitMapBackend::new(&self.path, self.size)
			.into_drawing_area();
		root.fill(&to_plotters(BACKGROUND)).map_err(render_error)?;

		for (points, color) in self.strokes.iter() {
			let style = ShapeStyle::from(&to_plotters(*color)).stroke_width(2);
			root.draw(&PathElement::new(points.clone(), style))
				.map_err(render_error)?;
		}

		root.present().map_err(render_error)?;
		Ok(())
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;
	use std::sync::{Arc, Mutex};

	// Records what was drawn since the last clear.
	#[derive(Clone, Default)]
	pub struct Recorder {
		pub strokes: Arc<Mutex<Vec<(Vec<(f64, f64)>, Rgb)>>>,
		pub presents: Arc<Mutex<u32>>,
	}

	impl Surface for Recorder {
		fn size(&self) -> (u32, u32) {
			(500, 200)
		}

		fn clear(&mut self) {
			self.strokes.lock().unwrap().clear();
		}

		fn stroke(&mut self, points: &[(f64, f64)], color: Rgb) {
			self.strokes.lock().unwrap().push((points.to_vec(), color));
		}

		fn present(&mut self) -> Result<()> {
			*self.presents.lock().unwrap() += 1;
			Ok(())
		}
	}

	#[test]
	fn never_exceeds_capacity() {
		let mut h = HistoryBuffer::new(50);
		for i in 0..120 {
			h.push(i as f64);
			assert!(h.len() <= 50);
		}
		assert_eq!(h.len(), 50);
		assert_eq!(h.iter().next(), Some(70.0));
		assert_eq!(h.last(), Some(119.0));
	}

	#[test]
	fn keeps_last_fifty_of_repeating_pattern_in_order() {
		let pattern = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
		let pushed: Vec<f64> = pattern.iter().copied().cycle().take(60).collect();

		let mut h = HistoryBuffer::new(50);
		for v in pushed.iter() {
			h.push(*v);
		}

		let kept: Vec<f64> = h.iter().collect();
		assert_eq!(kept, pushed[10..].to_vec());
	}

	#[test]
	fn threshold_depends_only_on_height() {
		let empty = HistoryBuffer::new(50);
		let mut full = HistoryBuffer::new(50);
		for _ in 0..50 {
			full.push(0.9);
		}

		let a = plot(&empty, 0.3, (500, 200));
		let b = plot(&full, 0.3, (500, 200));

		assert_eq!(a.threshold, b.threshold);
		assert!((a.threshold[0].1 - 140.0).abs() < 1e-9);
		assert_eq!(a.threshold[1].0, 500.0);
	}

	#[test]
	fn points_compress_left_until_full() {
		let mut h = HistoryBuffer::new(50);
		h.push(0.5);
		h.push(0.25);

		let p = plot(&h, 0.3, (500, 200));
		assert_eq!(p.line, vec![(0.0, 100.0), (10.0, 150.0)]);
	}

	#[test]
	fn redraw_clears_then_draws_threshold_and_line() {
		let rec = Recorder::default();
		let mut chart = Chart::new(Box::new(rec.clone()), 0.3);
		let mut h = HistoryBuffer::new(50);

		chart.redraw(&h).unwrap();
		assert_eq!(rec.strokes.lock().unwrap().len(), 1);

		h.push(0.31);
		chart.redraw(&h).unwrap();

		let strokes = rec.strokes.lock().unwrap();
		assert_eq!(strokes.len(), 2);
		assert_eq!(strokes[0].1, THRESHOLD_COLOR);
		assert_eq!(strokes[1].1, LINE_COLOR);
		assert_eq!(*rec.presents.lock().unwrap(), 2);
		assert_eq!(chart.redraws(), 2);
	}

	#[test]
	fn png_surface_writes_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("ear.png");
		let mut chart = Chart::new(Box::new(PngSurface::new(path.clone(), (120, 60))), 0.3);

		let mut h = HistoryBuffer::new(50);
		h.push(0.2);
		h.push(0.4);
		chart.redraw(&h).unwrap();

		assert!(std::fs::metadata(&path).unwrap().len() > 0);
	}
}
