use std::sync::Arc;

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use derive_more::From;
use serde_json::json;
use serde_with::{serde_as, DisplayFromStr};
use nanoid::nanoid;

use crate::tools::log::{log_error, LogServiceType};

pub type Result<T> = core::result::Result<T, Error>;

#[serde_as]
#[derive(Debug, Serialize, From, strum_macros::AsRefStr)]
#[serde(tag = "type", content = "data")]
pub enum Error {
	Error { message: String },

	// -- Face models
	ModelNotFound(String),

	// -- Token
	AuthFail,
	AuthFailTokenWrongFormat,
	AuthFailInvalidToken,
	AuthFailExpiredToken,

	// -- Local folder and config.json
	ServerMalformatedConfigFile,
	ServerUnableToAccessServerLocalFolder,

	#[from]
	Model(#[serde_as(as = "DisplayFromStr")] crate::model::error::Error),

	#[from]
	Io(#[serde_as(as = "DisplayFromStr")] std::io::Error),

	#[from]
	Serde(#[serde_as(as = "DisplayFromStr")] serde_json::Error),

	#[from]
	ORT(#[serde_as(as = "DisplayFromStr")] ort::Error),

	#[from]
	Image(#[serde_as(as = "DisplayFromStr")] image::ImageError),
}

impl core::fmt::Display for Error {
	fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
		write!(fmt, "{self:?}")
	}
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let req_uuid = nanoid!();
		let (status_code, client_error) = self.client_status_and_error();
		if status_code.is_server_error() {
			log_error(LogServiceType::Other, format!("{} {:?}", req_uuid, self));
		}

		let body = json!({
			"error": {
				"type": client_error.as_ref(),
				"req_uuid": req_uuid,
			}
		});
		let mut response = (status_code, Json(body)).into_response();
		response.extensions_mut().insert(Arc::new(self));
		response
	}
}

impl Error {
	pub fn client_status_and_error(&self) -> (StatusCode, ClientError) {
		match self {
			Self::Model(err) => err.client_status_and_error(),
			Self::AuthFail | Self::AuthFailInvalidToken | Self::AuthFailTokenWrongFormat => (StatusCode::UNAUTHORIZED, ClientError::NO_AUTH),
			Self::AuthFailExpiredToken => (StatusCode::UNAUTHORIZED, ClientError::TOKEN_EXPIRED),
			_ => (StatusCode::INTERNAL_SERVER_ERROR, ClientError::SERVICE_ERROR),
		}
	}
}

#[derive(Debug, strum_macros::AsRefStr)]
#[allow(non_camel_case_types)]
pub enum ClientError {
	NO_AUTH,
	TOKEN_EXPIRED,
	NOT_FOUND,
	INVALID_PARAMS,
	SERVICE_ERROR,
}
