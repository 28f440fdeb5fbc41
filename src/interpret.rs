// Response interpretation: decoding inbound analysis messages
// and classifying them into display tiers.
//
// The analysis service labels its results in either English or
// Korean. Both spellings decode into the same semantic value and
// the panel renders them back through `label(locale)`.

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::*;
use crate::render::Rgb;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
	En,
	Ko,
}

impl Default for Locale {
	fn default() -> Self {
		Locale::En
	}
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Direction {
	Front,
	Back,
	RightSide,
	LeftSide,
	Unknown,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Action {
	Sitting,
	Standing,
	Unknown,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum SleepStatus {
	Awake,
	Sleeping,
	Unknown,
}

impl From<String> for Direction {
	fn from(s: String) -> Self {
		match s.trim() {
			"front" | "정면" => Direction::Front,
			"back" | "등짐" => Direction::Back,
			"right side" | "오른쪽 측면" => Direction::RightSide,
			"left side" | "왼쪽 측면" => Direction::LeftSide,
			_ => Direction::Unknown,
		}
	}
}

impl Direction {
	pub fn label(self, locale: Locale) -> &'static str {
		use Direction::*;
		match (self, locale) {
			(Front, Locale::En) => "front",
			(Front, Locale::Ko) => "정면",
			(Back, Locale::En) => "back",
			(Back, Locale::Ko) => "등짐",
			(RightSide, Locale::En) => "right side",
			(RightSide, Locale::Ko) => "오른쪽 측면",
			(LeftSide, Locale::En) => "left side",
			(LeftSide, Locale::Ko) => "왼쪽 측면",
			(Unknown, Locale::En) => "unknown",
			(Unknown, Locale::Ko) => "알 수 없음",
		}
	}
}

impl From<String> for Action {
	fn from(s: String) -> Self {
		match s.trim() {
			"sitting" | "앉음" => Action::Sitting,
			"standing" | "서있음" => Action::Standing,
			_ => Action::Unknown,
		}
	}
}

impl Action {
	pub fn label(self, locale: Locale) -> &'static str {
		use Action::*;
		match (self, locale) {
			(Sitting, Locale::En) => "sitting",
			(Sitting, Locale::Ko) => "앉음",
			(Standing, Locale::En) => "standing",
			(Standing, Locale::Ko) => "서있음",
			(Unknown, Locale::En) => "unknown",
			(Unknown, Locale::Ko) => "알 수 없음",
		}
	}
}

impl From<String> for SleepStatus {
	fn from(s: String) -> Self {
		match s.trim() {
			"awake" | "깨어있음" => SleepStatus::Awake,
			"sleeping" | "자는 중" => SleepStatus::Sleeping,
			_ => SleepStatus::Unknown,
		}
	}
}

impl SleepStatus {
	pub fn label(self, locale: Locale) -> &'static str {
		use SleepStatus::*;
		match (self, locale) {
			(Awake, Locale::En) => "awake",
			(Awake, Locale::Ko) => "깨어있음",
			(Sleeping, Locale::En) => "sleeping",
			(Sleeping, Locale::Ko) => "자는 중",
			(Unknown, Locale::En) => "unknown",
			(Unknown, Locale::Ko) => "알 수 없음",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AnalysisResult {
	pub direction: Direction,
	pub action: Action,
	pub sleep_status: SleepStatus,
	#[serde(default, deserialize_with = "lenient_ear")]
	pub ear: Option<f64>,
}

// A message from the analysis service. `message` is a free-form
// receipt note ("N bytes received") and is optional.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Inbound {
	#[serde(default)]
	pub message: Option<String>,
	pub result: AnalysisResult,
}

// Anything other than a finite number (null, a string, an object)
// reads as absent so the rest of the entry still renders.
fn lenient_ear<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<serde_json::Value>::deserialize(deserializer)?;
	Ok(value
		.and_then(|v| v.as_f64())
		.filter(|v| v.is_finite()))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tier {
	Sleep,
	Away,
	Sit,
	Default,
}

impl Tier {
	pub fn color(self) -> Rgb {
		match self {
			Tier::Sleep => Rgb(0x90, 0x20, 0x20),
			Tier::Away => Rgb(0xa5, 0x5e, 0x00),
			Tier::Sit => Rgb(0x20, 0x40, 0x80),
			Tier::Default => Rgb(0x33, 0x33, 0x33),
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Tier::Sleep => "sleep",
			Tier::Away => "away",
			Tier::Sit => "sit",
			Tier::Default => "default",
		}
	}
}

// First matching rule wins.
pub fn classify(result: &AnalysisResult) -> Tier {
	if result.sleep_status == SleepStatus::Sleeping {
		Tier::Sleep
	} else if result.direction == Direction::Back {
		Tier::Away
	} else if result.action == Action::Sitting {
		Tier::Sit
	} else {
		Tier::Default
	}
}

pub fn decode(payload: &str) -> Result<Inbound> {
	Ok(serde_json::from_str(payload)?)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn result(direction: Direction, action: Action, sleep_status: SleepStatus)
		-> AnalysisResult {

		AnalysisResult{
			direction: direction,
			action: action,
			sleep_status: sleep_status,
			ear: None,
		}
	}

	#[test]
	fn sleeping_outranks_facing_away() {
		let r = result(Direction::Back, Action::Sitting, SleepStatus::Sleeping);
		assert_eq!(classify(&r), Tier::Sleep);
	}

	#[test]
	fn facing_away_outranks_sitting() {
		let r = result(Direction::Back, Action::Sitting, SleepStatus::Awake);
		assert_eq!(classify(&r), Tier::Away);
	}

	#[test]
	fn sitting_then_default() {
		let r = result(Direction::Front, Action::Sitting, SleepStatus::Awake);
		assert_eq!(classify(&r), Tier::Sit);

		let r = result(Direction::LeftSide, Action::Standing, SleepStatus::Unknown);
		assert_eq!(classify(&r), Tier::Default);
	}

	#[test]
	fn decodes_reference_payload() {
		let msg = decode(r#"{"result":{"direction":"back","action":"sitting","sleep_status":"awake","ear":0.25}}"#)
			.unwrap();

		assert_eq!(msg.message, None);
		assert_eq!(msg.result.direction, Direction::Back);
		assert_eq!(msg.result.ear, Some(0.25));
		assert_eq!(classify(&msg.result), Tier::Away);
	}

	#[test]
	fn korean_labels_classify_like_english() {
		let ko = decode(r#"{"message":"2048 bytes received","result":{"direction":"등짐","action":"앉음","sleep_status":"자는 중","ear":null}}"#)
			.unwrap();
		let en = decode(r#"{"result":{"direction":"back","action":"sitting","sleep_status":"sleeping"}}"#)
			.unwrap();

		assert_eq!(ko.result, en.result);
		assert_eq!(ko.message.as_deref(), Some("2048 bytes received"));
		assert_eq!(classify(&ko.result), Tier::Sleep);
	}

	#[test]
	fn non_numeric_ear_reads_as_absent() {
		let msg = decode(r#"{"result":{"direction":"front","action":"standing","sleep_status":"awake","ear":"0.3"}}"#)
			.unwrap();
		assert_eq!(msg.result.ear, None);
	}

	#[test]
	fn rejects_non_conforming_payloads() {
		assert!(decode("hello from the server").is_err());
		assert!(decode(r#"{"message":"no result"}"#).is_err());
		assert!(decode(r#"{"result":{"direction":1,"action":"sitting","sleep_status":"awake"}}"#).is_err());
		assert!(decode(r#"{"result":{"action":"sitting","sleep_status":"awake"}}"#).is_err());
	}

	#[test]
	fn labels_round_trip_through_both_locales() {
		for d in [Direction::Front, Direction::Back, Direction::RightSide, Direction::LeftSide] {
			assert_eq!(Direction::from(d.label(Locale::Ko).to_string()), d);
			assert_eq!(Direction::from(d.label(Locale::En).to_string()), d);
		}
		assert_eq!(Action::from("서있음".to_string()), Action::Standing);
		assert_eq!(SleepStatus::from("깨어있음".to_string()).label(Locale::En), "awake");
	}
}
