//! The three asynchronous chains of the client: the output poll loop, the
//! keepalive ping loop, and fire-and-forget command submission. They share
//! the page handles and a stop flag, nothing else; ordering between them is
//! whatever the browser's scheduler produces.

use std::cell::Cell;
use std::rc::Rc;

use log::{debug, error, info};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::Document;

use crate::dom::{Page, user_echo_fragment};
use crate::net::{self, OutputChunk};


/// Interval between keepalive pings. The first ping fires one interval after
/// startup.
pub const PING_INTERVAL_MS: i32 = 10_000;

/// Appended to the transcript when the poll loop dies. The page needs a
/// reload to recover after this.
pub const CONNECTION_LOST_HTML: &str = "<p><i>Connection lost</i></p>";


/// Handle returned to page JavaScript. The page keeps it for the lifetime of
/// the session and routes its command form's `onsubmit` to
/// [`submit_command`](AdventureClient::submit_command).
#[wasm_bindgen]
pub struct AdventureClient {
	page: Page,
	session: String,
	stopped: Rc<Cell<bool>>,
}

impl AdventureClient {
	/// Resolves the page contract and reads the session id. Fails if any of
	/// the required elements is absent.
	pub fn attach(document: &Document) -> Result<AdventureClient, JsValue> {
		let page = Page::attach(document).map_err(|e| JsValue::from_str(&e.to_string()))?;
		let session = page.session_id();
		Ok(AdventureClient {
			page,
			session,
			stopped: Rc::new(Cell::new(false)),
		})
	}

	/// Spawns the poll and ping loops and focuses the command field.
	pub fn run(&self) {
		debug!("session id: {}", self.session);
		spawn_local(poll_loop(self.page.clone(), self.session.clone(), self.stopped.clone()));
		spawn_local(ping_loop(self.session.clone(), self.stopped.clone()));
		self.page.focus_command();
	}

	/// Echoes the command into the transcript, posts it to the server without
	/// waiting for the reply, then clears and refocuses the input field.
	pub fn send_command(&self, command: &str) {
		let prompt = self.page.prompt_text();
		self.page.append_transcript(&user_echo_fragment(&prompt, command));

		let session = self.session.clone();
		let command = command.to_owned();
		spawn_local(async move {
			if let Err(err) = net::post_form("/input", &[("command", &command), ("session", &session)]).await {
				debug!("command submission failed: {err}");
			}
		});

		self.page.clear_command();
		self.page.focus_command();
		self.page.scroll_command_into_view();
	}
}

#[wasm_bindgen]
impl AdventureClient {
	/// `onsubmit` handler for the command form. Always returns `false` so the
	/// browser never performs a real form submission.
	#[wasm_bindgen(js_name = submitCommand)]
	pub fn submit_command(&self) -> bool {
		self.send_command(&self.page.command_text());
		false
	}

	/// Stops both loops. In-flight requests finish but nothing new is issued.
	pub fn stop(&self) {
		info!("stopping client for this session");
		self.stopped.set(true);
	}
}


/// Long-polls `/output` until stopped or a fatal error. Each iteration issues
/// exactly one request; a timeout retries immediately and silently, anything
/// else renders the connection-lost notice and ends the loop for good.
async fn poll_loop(page: Page, session: String, stopped: Rc<Cell<bool>>) {
	while !stopped.get() {
		match net::fetch_output(&session).await {
			Ok(chunk) => render(&page, &chunk),
			Err(err) if err.is_retryable() => debug!("output poll timed out, retrying"),
			Err(err) => {
				error!("output poll failed: {err}");
				page.append_transcript(CONNECTION_LOST_HTML);
				break;
			},
		}
	}
}

/// Pings `/ping` every [`PING_INTERVAL_MS`] to keep the server-side session
/// alive. Outcomes are ignored; the next ping is scheduled unconditionally,
/// independent of the poll loop's fate.
async fn ping_loop(session: String, stopped: Rc<Cell<bool>>) {
	loop {
		net::sleep(PING_INTERVAL_MS).await;
		if stopped.get() {
			break;
		}
		if let Err(err) = net::post_form("/ping", &[("session", &session)]).await {
			debug!("keepalive ping failed: {err}");
		}
	}
}

/// Applies one output chunk to the page: `text` is appended to the
/// transcript, `prompt` replaces the prompt text.
fn render(page: &Page, chunk: &OutputChunk) {
	if let Some(text) = &chunk.text {
		page.append_transcript(text);
	}
	if let Some(prompt) = &chunk.prompt {
		page.set_prompt(prompt);
	}
	page.focus_command();
	page.scroll_command_into_view();
}
