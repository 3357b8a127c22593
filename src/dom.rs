//! The page contract: typed handles to the DOM elements the client works
//! with, resolved once at startup, plus escaping for untrusted text that ends
//! up in the transcript.
//!
//! The page must carry four elements: `input#session` (hidden, holds the
//! session id), `input#command` (player command entry), `#content` (the
//! transcript container) and `#input_text` (the current prompt). Missing or
//! mistyped elements fail [`Page::attach`] with a [`DomError`] naming the
//! offender.

use thiserror::Error;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlInputElement};

const SESSION_FIELD: &str = "session";
const COMMAND_FIELD: &str = "command";
const CONTENT_CONTAINER: &str = "content";
const PROMPT_ELEMENT: &str = "input_text";


#[derive(Debug, Error)]
pub enum DomError {
	#[error("required element `#{0}` is missing from the page")]
	MissingElement(&'static str),
	#[error("element `#{0}` is not the expected kind of element")]
	WrongElementKind(&'static str),
}


/// Handles to the elements the client manipulates. Cloned freely into the
/// async tasks; all clones alias the same DOM nodes.
#[derive(Clone)]
pub struct Page {
	session: HtmlInputElement,
	command: HtmlInputElement,
	content: Element,
	prompt: Element,
}

impl Page {
	pub fn attach(document: &Document) -> Result<Self, DomError> {
		Ok(Self {
			session: input_by_id(document, SESSION_FIELD)?,
			command: input_by_id(document, COMMAND_FIELD)?,
			content: element_by_id(document, CONTENT_CONTAINER)?,
			prompt: element_by_id(document, PROMPT_ELEMENT)?,
		})
	}

	pub fn session_id(&self) -> String {
		self.session.value()
	}

	pub fn command_text(&self) -> String {
		self.command.value()
	}

	pub fn clear_command(&self) {
		self.command.set_value("");
	}

	pub fn focus_command(&self) {
		let _ = self.command.focus();
	}

	/// Appends an HTML fragment at the end of the transcript. Prior content is
	/// never replaced or truncated.
	pub fn append_transcript(&self, html: &str) {
		if let Err(err) = self.content.insert_adjacent_html("beforeend", html) {
			log::error!("failed to append to transcript: {err:?}");
		}
	}

	/// Replaces the prompt text wholesale.
	pub fn set_prompt(&self, text: &str) {
		self.prompt.set_text_content(Some(text));
	}

	pub fn prompt_text(&self) -> String {
		self.prompt.text_content().unwrap_or_default()
	}

	/// Scrolls so the command field sits at the top of the viewport.
	pub fn scroll_command_into_view(&self) {
		self.command.scroll_into_view();
	}
}

fn element_by_id(document: &Document, id: &'static str) -> Result<Element, DomError> {
	document.get_element_by_id(id).ok_or(DomError::MissingElement(id))
}

fn input_by_id(document: &Document, id: &'static str) -> Result<HtmlInputElement, DomError> {
	element_by_id(document, id)?
		.dyn_into::<HtmlInputElement>()
		.map_err(|_| DomError::WrongElementKind(id))
}


/// Escapes the characters that are significant in an HTML context. Command
/// and prompt text are untrusted and must pass through here before being
/// interpolated into the transcript.
pub fn escape_html(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	for ch in text.chars() {
		match ch {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#39;"),
			_ => out.push(ch),
		}
	}
	out
}

/// The echo line appended to the transcript when the player submits a
/// command: the current prompt followed by the command text, both escaped.
pub fn user_echo_fragment(prompt: &str, command: &str) -> String {
	format!("<p class=\"user_response\">{} {}</p>", escape_html(prompt), escape_html(command))
}


#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn escape_passes_plain_text_through() {
		assert_eq!(escape_html("look at the mirror"), "look at the mirror");
		assert_eq!(escape_html(""), "");
	}

	#[test]
	fn escape_handles_significant_characters() {
		assert_eq!(escape_html("<script>"), "&lt;script&gt;");
		assert_eq!(escape_html("fish & chips"), "fish &amp; chips");
		assert_eq!(escape_html("say \"hi\""), "say &quot;hi&quot;");
		assert_eq!(escape_html("it's"), "it&#39;s");
	}

	#[test]
	fn escape_is_applied_left_to_right() {
		// `&` inside an already-started entity must not be double-resolved
		assert_eq!(escape_html("&lt;"), "&amp;lt;");
	}

	#[test]
	fn echo_fragment_joins_prompt_and_command() {
		assert_eq!(
			user_echo_fragment(">", "go north"),
			"<p class=\"user_response\">&gt; go north</p>"
		);
	}

	#[test]
	fn echo_fragment_escapes_hostile_command() {
		let fragment = user_echo_fragment(">", "<img src=x onerror=alert(1)>");
		assert!(!fragment.contains("<img"));
		assert!(fragment.contains("&lt;img src=x onerror=alert(1)&gt;"));
	}

	#[test]
	fn dom_errors_name_the_element() {
		assert_eq!(
			DomError::MissingElement("command").to_string(),
			"required element `#command` is missing from the page"
		);
		assert_eq!(
			DomError::WrongElementKind("session").to_string(),
			"element `#session` is not the expected kind of element"
		);
	}
}
