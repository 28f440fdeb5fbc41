use thiserror::Error as ThisError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ErrorType{
	#[error("invalid_config")]
	InvalidConfig,
	#[error("invalid_frame")]
	InvalidFrame,
	#[error("unsupported_stream")]
	UnsupportedStream,
	#[error("chart_render")]
	ChartRender,
}

#[derive(Debug, ThisError)]
#[error("{error_type}: {detail}")]
pub struct Error{
	pub error_type: ErrorType,
	pub detail: String,
}

impl Error {
	pub fn boxed(error_type: ErrorType, detail: impl Into<String>)
		-> Box<Self> {

		Box::new(Self{
			error_type: error_type,
			detail: detail.into(),
		})
	}
}

// Errors cross thread boundaries (encode workers, connector)
// so the boxed form must be Send + Sync.
pub type Result<T> = std::result::Result<
	T, Box<dyn std::error::Error + Send + Sync>>;
