#![cfg(all(target_arch = "wasm32", feature = "web"))]

use std::{cell::RefCell, rc::Rc};
use vdom_runtime::{
	json::decode,
	opaque::Opaque,
	platform::{Cmd, Program, Runtime, Sub},
	scheduler::Scheduler,
	vdom::{Fact, Handler, Node},
	web::WebDom,
};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::HtmlElement;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn click() {
	tracing_wasm::set_as_global_default();

	let dom = Rc::new(RefCell::new(WebDom::for_window().unwrap()));
	let document = dom.borrow().document().clone();
	let body: web_sys::Node = document.body().unwrap().into();

	let view = |clicks: &Vec<String>| {
		let on_click = Handler::Normal(decode::map(
			|id: String| Opaque::new(id),
			&decode::at(&["target", "id"], &decode::string()),
		));
		Node::element(
			"button",
			vec![Fact::attribute("id", "test-button"), Fact::on("click", on_click)],
			vec![Node::text(clicks.len().to_string())],
		)
	};

	let program = Program::element(
		&Runtime::new(Scheduler::new()),
		(Vec::new(), Cmd::none()),
		|message: Opaque, clicks: &Vec<String>| {
			let mut clicks = clicks.clone();
			clicks.push(message.get());
			(clicks, Cmd::none())
		},
		|_| Sub::none(),
		view,
		dom,
		&body,
	)
	.unwrap();
	assert!(program.model().is_empty());

	let button: HtmlElement = document.get_element_by_id("test-button").unwrap().dyn_into().unwrap();
	button.click();
	button.click();

	assert_eq!(*program.model(), ["test-button", "test-button"]);
	assert_eq!(button.text_content().as_deref(), Some("2"));
}
