mod client;
mod dom;
mod net;

use log::info;
use wasm_bindgen::prelude::*;

pub use client::{AdventureClient, CONNECTION_LOST_HTML, PING_INTERVAL_MS};
pub use dom::{DomError, Page, escape_html, user_echo_fragment};
pub use net::{FetchError, OutputChunk, POLL_TIMEOUT_MS};


/// Called by the page once the DOM is ready. Resolves the page contract,
/// starts the poll and ping loops, focuses the command field, and returns the
/// handle the page uses to submit commands:
///
/// ```js
/// const client = start();
/// document.querySelector("form").onsubmit = () => client.submitCommand();
/// ```
#[wasm_bindgen]
pub fn start() -> Result<AdventureClient, JsValue> {
	set_panic_hook();
	init_logging();
	info!("Starting adventure client...");

	let document = window().document().ok_or_else(|| JsValue::from_str("no document on window"))?;
	let client = AdventureClient::attach(&document)?;
	client.run();
	Ok(client)
}


pub(crate) fn window() -> web_sys::Window {
	web_sys::window().expect("no global `window` exists")
}


pub fn set_panic_hook() {
	// When the `console_error_panic_hook` feature is enabled, we can call the
	// `set_panic_hook` function at least once during initialization, and then
	// we will get better error messages if our code ever panics.
	//
	// For more details see
	// https://github.com/rustwasm/console_error_panic_hook#readme
	#[cfg(feature = "console_error_panic_hook")]
	console_error_panic_hook::set_once();
}

fn init_logging() {
	#[cfg(target_arch = "wasm32")]
	{
		console_log::init_with_level(log::Level::Debug).expect("Failed to initialize console_log");
	}

	#[cfg(not(target_arch = "wasm32"))]
	{
		env_logger::Builder::from_default_env().filter_level(log::LevelFilter::Debug).init();
	}
}
