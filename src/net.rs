//! HTTP plumbing over the browser's `fetch`: the long-poll GET for narrative
//! output, form-encoded POSTs for pings and commands, and the error taxonomy
//! the poll loop keys its retry decision on.

use js_sys::Promise;
use serde::Deserialize;
use thiserror::Error;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortController, DomException, Headers, RequestInit, Response, UrlSearchParams};

use crate::window;


/// How long an `/output` request may hang before it is aborted and retried.
/// Long polls are expected to block server-side until output exists, so this
/// is generous.
pub const POLL_TIMEOUT_MS: i32 = 60_000;


/// One chunk of server output. `text` is an HTML fragment for the transcript;
/// `prompt` replaces the current input prompt. Either or both may be absent,
/// and unknown fields are ignored.
#[derive(Debug, Default, PartialEq, Deserialize)]
pub struct OutputChunk {
	#[serde(default)]
	pub text: Option<String>,
	#[serde(default)]
	pub prompt: Option<String>,
}


#[derive(Debug, Error)]
pub enum FetchError {
	#[error("request timed out")]
	Timeout,
	#[error("connection failed: {0}")]
	Connection(String),
	#[error("server returned status {0}")]
	Status(u16),
	#[error("malformed response: {0}")]
	Malformed(String),
}

impl FetchError {
	/// Only timeouts are worth retrying; everything else ends the poll loop.
	pub fn is_retryable(&self) -> bool {
		matches!(self, FetchError::Timeout)
	}
}


/// Long-polls `/output` for the next chunk. The session id travels as a query
/// parameter; the request is aborted after [`POLL_TIMEOUT_MS`], which surfaces
/// as the retryable [`FetchError::Timeout`].
pub async fn fetch_output(session: &str) -> Result<OutputChunk, FetchError> {
	let query = UrlSearchParams::new().map_err(setup_failure)?;
	query.append("session", session);
	let url = format!("/output?{}", String::from(query.to_string()));

	let init = RequestInit::new();
	init.set_method("GET");
	let headers = Headers::new().map_err(setup_failure)?;
	headers.append("Accept", "application/json").map_err(setup_failure)?;
	init.set_headers(headers.as_ref());

	let controller = AbortController::new().map_err(setup_failure)?;
	init.set_signal(Some(&controller.signal()));

	// Arm the timer that turns a hung long poll into an AbortError.
	let abort = Closure::once(move || controller.abort());
	let timer = window()
		.set_timeout_with_callback_and_timeout_and_arguments_0(abort.as_ref().unchecked_ref(), POLL_TIMEOUT_MS)
		.map_err(setup_failure)?;

	let fetched = JsFuture::from(window().fetch_with_str_and_init(&url, &init)).await;
	window().clear_timeout_with_handle(timer);
	drop(abort);

	let resp: Response = fetched
		.map_err(classify_rejection)?
		.dyn_into()
		.map_err(|_| FetchError::Malformed("fetch did not yield a Response".into()))?;
	if !resp.ok() {
		return Err(FetchError::Status(resp.status()));
	}

	let body = JsFuture::from(resp.json().map_err(|e| FetchError::Malformed(describe_js(&e)))?)
		.await
		.map_err(|e| FetchError::Malformed(describe_js(&e)))?;
	serde_wasm_bindgen::from_value(body).map_err(|e| FetchError::Malformed(e.to_string()))
}


/// POST with a form-encoded body. Used for `/ping` and `/input`; the response
/// body is ignored, and callers only log the error, if any.
pub async fn post_form(path: &str, fields: &[(&str, &str)]) -> Result<(), FetchError> {
	let body = UrlSearchParams::new().map_err(setup_failure)?;
	for (name, value) in fields {
		body.append(name, value);
	}

	let init = RequestInit::new();
	init.set_method("POST");
	init.set_body(body.as_ref());

	let resp: Response = JsFuture::from(window().fetch_with_str_and_init(path, &init))
		.await
		.map_err(classify_rejection)?
		.dyn_into()
		.map_err(|_| FetchError::Malformed("fetch did not yield a Response".into()))?;
	if resp.ok() {
		Ok(())
	} else {
		Err(FetchError::Status(resp.status()))
	}
}


/// Resolves after `ms` milliseconds on the browser's timer queue.
pub async fn sleep(ms: i32) {
	let promise = Promise::new(&mut |resolve, _reject| {
		if let Err(err) = window().set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms) {
			log::error!("failed to schedule timer: {err:?}");
		}
	});
	let _ = JsFuture::from(promise).await;
}


fn classify_rejection(err: JsValue) -> FetchError {
	if let Some(exception) = err.dyn_ref::<DomException>() {
		if exception.name() == "AbortError" {
			return FetchError::Timeout;
		}
	}
	FetchError::Connection(describe_js(&err))
}

fn setup_failure(err: JsValue) -> FetchError {
	FetchError::Connection(describe_js(&err))
}

fn describe_js(err: &JsValue) -> String {
	err.as_string().unwrap_or_else(|| format!("{err:?}"))
}


#[cfg(test)]
mod tests {
	use super::*;

	fn chunk(json: &str) -> OutputChunk {
		serde_json::from_str(json).expect("chunk should deserialize")
	}

	#[test]
	fn chunk_with_both_fields() {
		assert_eq!(
			chunk(r#"{"text": "<p>You see a room.</p>", "prompt": ">"}"#),
			OutputChunk {
				text: Some("<p>You see a room.</p>".into()),
				prompt: Some(">".into()),
			}
		);
	}

	#[test]
	fn chunk_with_text_only() {
		let c = chunk(r#"{"text": "<p>A door creaks.</p>"}"#);
		assert_eq!(c.text.as_deref(), Some("<p>A door creaks.</p>"));
		assert_eq!(c.prompt, None);
	}

	#[test]
	fn chunk_with_prompt_only() {
		let c = chunk(r#"{"prompt": "password:"}"#);
		assert_eq!(c.text, None);
		assert_eq!(c.prompt.as_deref(), Some("password:"));
	}

	#[test]
	fn empty_chunk_is_valid() {
		assert_eq!(chunk("{}"), OutputChunk::default());
	}

	#[test]
	fn unknown_fields_are_ignored() {
		let c = chunk(r#"{"text": "hi", "headers": "ignored", "flush": true}"#);
		assert_eq!(c.text.as_deref(), Some("hi"));
	}

	#[test]
	fn non_object_body_is_rejected() {
		assert!(serde_json::from_str::<OutputChunk>(r#""just a string""#).is_err());
		assert!(serde_json::from_str::<OutputChunk>("42").is_err());
	}

	#[test]
	fn only_timeouts_retry() {
		assert!(FetchError::Timeout.is_retryable());
		assert!(!FetchError::Connection("refused".into()).is_retryable());
		assert!(!FetchError::Status(500).is_retryable());
		assert!(!FetchError::Malformed("not json".into()).is_retryable());
	}

	#[test]
	fn error_display() {
		assert_eq!(FetchError::Timeout.to_string(), "request timed out");
		assert_eq!(FetchError::Status(502).to_string(), "server returned status 502");
		assert_eq!(
			FetchError::Malformed("expected an object".into()).to_string(),
			"malformed response: expected an object"
		);
	}
}
