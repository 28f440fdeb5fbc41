// frameslot is a conflation channel holding only the newest value.
// Neither publish nor latest blocks on the other side. There is one
// Sender and any number of Receivers; the Sender learns how many
// Receivers remain on every publish, which is how the camera thread
// finds out nobody is watching any more.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

struct Slot<T: Clone> {
	data: [RwLock<Option<T>>; 2],
	dropped_sender: AtomicBool,
	ind: AtomicU8,
	num_receivers: AtomicU8,
}

pub struct Sender<T: Clone>{
	slot: Arc<Slot<T>>,
	ind: u8,
}

pub struct Receiver<T: Clone>{
	slot: Arc<Slot<T>>,
}

pub fn frameslot<T: Clone>() -> (Sender<T>, Receiver<T>) {
	let slot = Arc::new(Slot{
		data: [RwLock::new(None), RwLock::new(None)],
		dropped_sender: AtomicBool::new(false),
		ind: AtomicU8::new(0),
		num_receivers: AtomicU8::new(1),
	});

	(Sender{slot: slot.clone(), ind: 0}, Receiver{slot: slot})
}

impl<T: Clone> Drop for Sender<T> {
	fn drop(&mut self) {
		self.slot.dropped_sender.store(true, Ordering::SeqCst);
	}
}

impl<T: Clone> Sender<T> {
	// Returns the number of live receivers.
	pub fn publish(&mut self, data: T) -> u8 {
		{
			let mut x = self.slot.data[self.ind as usize].write()
				.unwrap_or_else(|e| e.into_inner());
			*x = Some(data);
		}

		self.slot.ind.store(self.ind, Ordering::SeqCst);
		self.ind = (self.ind + 1) % 2;
		self.slot.num_receivers.load(Ordering::SeqCst)
	}
}

impl<T: Clone> Receiver<T> {
	// None until something is published, and again once the
	// sender has gone away.
	pub fn latest(&self) -> Option<T> {
		if self.is_closed() {
			return None;
		}
		let ind = self.slot.ind.load(Ordering::SeqCst);
		let x = self.slot.data[ind as usize].read()
			.unwrap_or_else(|e| e.into_inner());
		x.clone()
	}

	pub fn is_closed(&self) -> bool {
		self.slot.dropped_sender.load(Ordering::SeqCst)
	}
}

impl<T: Clone> Clone for Receiver<T> {
	fn clone(&self) -> Self {
		self.slot.num_receivers.fetch_add(1, Ordering::SeqCst);
		Self{
			slot: self.slot.clone(),
		}
	}
}

impl<T: Clone> Drop for Receiver<T> {
	fn drop(&mut self) {
		self.slot.num_receivers.fetch_sub(1, Ordering::SeqCst);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_until_first_publish() {
		let (mut sx, rx) = frameslot::<u32>();
		assert_eq!(rx.latest(), None);

		sx.publish(7);
		assert_eq!(rx.latest(), Some(7));
	}

	#[test]
	fn newest_value_wins() {
		let (mut sx, rx) = frameslot();
		for i in 0..5u32 {
			sx.publish(i);
		}
		assert_eq!(rx.latest(), Some(4));
		// Reading does not consume.
		assert_eq!(rx.latest(), Some(4));
	}

	#[test]
	fn publish_reports_receivers() {
		let (mut sx, rx) = frameslot();
		let rx2 = rx.clone();
		assert_eq!(sx.publish(1u8), 2);

		drop(rx);
		drop(rx2);
		assert_eq!(sx.publish(2u8), 0);
	}

	#[test]
	fn closed_after_sender_drops() {
		let (mut sx, rx) = frameslot();
		sx.publish(String::from("frame"));
		drop(sx);

		assert!(rx.is_closed());
		assert_eq!(rx.latest(), None);
	}
}
