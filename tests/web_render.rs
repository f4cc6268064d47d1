#![cfg(all(target_arch = "wasm32", feature = "web"))]

use std::{cell::RefCell, rc::Rc, sync::Once};
use vdom_runtime::{
	json::decode,
	opaque::Opaque,
	vdom::{Fact, Handler, Node, Renderer},
	web::{virtualize, WebDom},
};
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{Element, HtmlElement};

wasm_bindgen_test_configure!(run_in_browser);

static LOG: Once = Once::new();

fn container(dom: &WebDom) -> Element {
	LOG.call_once(tracing_wasm::set_as_global_default);
	let document = dom.document();
	let container = document.create_element("div").unwrap();
	let body: HtmlElement = document.body().unwrap();
	body.append_child(&container).unwrap();
	container
}

fn list(count: usize) -> Node {
	Node::keyed(
		"ul",
		vec![Fact::attribute("class", "items")],
		(0..count)
			.rev()
			.map(|i| (i.to_string(), Node::element("li", vec![], vec![Node::text(i.to_string())])))
			.collect(),
	)
}

#[wasm_bindgen_test]
fn renders_and_patches_into_the_page() {
	let dom = Rc::new(RefCell::new(WebDom::for_window().unwrap()));
	let container = container(&dom.borrow());
	let parent: &web_sys::Node = &container;

	let mut renderer = Renderer::mount(dom.clone(), parent, list(1), Rc::new(|_: Opaque| ()));
	assert_eq!(container.inner_html(), r#"<ul class="items"><li>0</li></ul>"#);

	let first = container.query_selector("li").unwrap().unwrap();
	renderer.draw(list(3));
	assert_eq!(
		container.inner_html(),
		r#"<ul class="items"><li>2</li><li>1</li><li>0</li></ul>"#
	);
	assert!(container.query_selector("li:last-child").unwrap().unwrap().is_same_node(Some(&*first)));

	renderer.draw(Node::text("gone"));
	assert_eq!(container.inner_html(), "gone");
}

#[wasm_bindgen_test]
fn adopts_existing_markup() {
	let dom = Rc::new(RefCell::new(WebDom::for_window().unwrap()));
	let container = container(&dom.borrow());
	container.set_inner_html(r#"<p title="old">hello</p>"#);

	let root: web_sys::Node = container.first_child().unwrap();
	let current = virtualize(&root);
	let mut renderer = Renderer::adopt(dom, root.clone(), current, Rc::new(|_: Opaque| ()));

	renderer.draw(Node::element("p", vec![Fact::attribute("title", "new")], vec![Node::text("hello")]));
	assert!(renderer.root().is_same_node(Some(&root)));
	assert_eq!(container.inner_html(), r#"<p title="new">hello</p>"#);
}

#[wasm_bindgen_test]
fn replaced_subtrees_release_their_listeners() {
	let dom = Rc::new(RefCell::new(WebDom::for_window().unwrap()));
	let container = container(&dom.borrow());
	let parent: &web_sys::Node = &container;

	let button = || {
		Node::element(
			"div",
			vec![],
			vec![Node::element(
				"button",
				vec![Fact::on("click", Handler::Normal(decode::succeed(Opaque::unit())))],
				vec![Node::text("press")],
			)],
		)
	};
	let mut renderer = Renderer::mount(dom.clone(), parent, button(), Rc::new(|_: Opaque| ()));
	assert_eq!(dom.borrow().listener_count(), 1);

	renderer.draw(Node::text("gone"));
	assert_eq!(container.inner_html(), "gone");
	assert_eq!(dom.borrow().listener_count(), 0);

	renderer.draw(button());
	renderer.draw(Node::element("div", vec![], vec![]));
	assert_eq!(container.inner_html(), "<div></div>");
	assert_eq!(dom.borrow().listener_count(), 0);
}
