use serde_json::{json, Value};
use std::{cell::RefCell, rc::Rc};
use vdom_runtime::{
	json::decode,
	opaque::{Opaque, Tagger},
	platform::{Cmd, Manager, Program, Router, Runtime, Sub},
	scheduler::Scheduler,
	task::Task,
	vdom::{
		memory::{dispatch_event, MemoryDom},
		Dom, Fact, Handler, Node,
	},
};

fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

#[test]
fn effects_enqueued_during_dispatch_wait_for_the_current_batch() {
	init_tracing();
	let log = Rc::new(RefCell::new(Vec::<String>::new()));
	let runtime = Runtime::new(Scheduler::new());

	for home in vec!["a", "b"] {
		let on_effects = {
			let (log, runtime) = (log.clone(), runtime.clone());
			move |_: &Router, commands: Vec<Opaque>, _: Vec<Opaque>, state: Opaque| {
				for command in commands {
					let value = command.get::<i32>();
					log.borrow_mut().push(format!("recv {}:{}", home, value));
					if home == "a" && value == 1 {
						runtime.enqueue_effects(
							Cmd::batch(vec![Cmd::leaf("a", Opaque::new(2_i32)), Cmd::leaf("b", Opaque::new(2_i32))]),
							Sub::none(),
						);
					}
				}
				Task::Succeed(state)
			}
		};
		let cmd_map = {
			let log = log.clone();
			move |_: &Tagger, value: Opaque| {
				log.borrow_mut().push(format!("map {}:{}", home, value.get::<i32>()));
				value
			}
		};
		runtime
			.define_manager(home, Manager::new(Task::succeed(()), on_effects).cmd_map(cmd_map))
			.unwrap();
	}
	runtime.start(Rc::new(|_: Opaque| ())).unwrap();

	runtime.enqueue_effects(
		Cmd::batch(vec![Cmd::leaf("a", Opaque::new(1_i32)), Cmd::leaf("b", Opaque::new(1_i32))]),
		Sub::none(),
	);
	assert_eq!(
		*log.borrow(),
		["map a:1", "map b:1", "recv a:1", "recv b:1", "map a:2", "map b:2", "recv a:2", "recv b:2"]
	);
}

/// Echoes each command back to the program through its own mailbox.
fn echo_manager() -> Manager {
	Manager::new(Task::succeed(()), |router: &Router, commands: Vec<Opaque>, _: Vec<Opaque>, state: Opaque| {
		Task::sequence(commands.into_iter().map(|command| router.send_to_self(command)).collect())
			.map(move |_| state.clone())
	})
	.on_self_msg(|router: &Router, message: Opaque, state: Opaque| {
		router.send_to_app(message).map(move |_| state.clone())
	})
}

#[test]
fn workers_receive_messages_from_managers() {
	init_tracing();
	let runtime = Runtime::new(Scheduler::new());
	runtime.define_manager("echo", echo_manager()).unwrap();

	let program = Program::worker(
		&runtime,
		(Vec::new(), Cmd::leaf("echo", Opaque::new(1_i32))),
		|message: Opaque, seen: &Vec<i32>| {
			let value = message.get::<i32>();
			let mut seen = seen.clone();
			seen.push(value);
			let cmd = if value < 3 {
				Cmd::leaf("echo", Opaque::new(value + 1))
			} else {
				Cmd::none()
			};
			(seen, cmd)
		},
		|_| Sub::none(),
	)
	.unwrap();

	assert_eq!(*program.model(), [1, 2, 3]);
	assert!(runtime.scheduler().is_idle());
	assert!(runtime.process_of("echo").is_ok());
}

#[derive(Clone, Debug)]
struct Clicked;

#[derive(Clone, Debug)]
enum Msg {
	Increment,
	Set(i64),
}

#[test]
fn element_programs_talk_to_the_page_and_the_host() {
	init_tracing();
	let runtime = Runtime::new(Scheduler::new());
	let report = runtime.outgoing_port("report", |count: &i64| json!(count)).unwrap();
	let set = runtime.incoming_port("set", decode::int()).unwrap();

	let reported = Rc::new(RefCell::new(Vec::<Value>::new()));
	{
		let reported = reported.clone();
		report.subscribe(move |value| reported.borrow_mut().push(value.clone()));
	}

	let dom = Rc::new(RefCell::new(MemoryDom::new()));
	let body = dom.borrow_mut().create_element(None, "body");

	let on_button: Tagger = Rc::new(|message: Opaque| {
		let Clicked = message.get::<Clicked>();
		Opaque::new(Msg::Increment)
	});
	let view = move |count: &i64| {
		Node::element(
			"div",
			vec![],
			vec![Node::element(
				"button",
				vec![Fact::on("click", Handler::Normal(decode::succeed(Opaque::new(Clicked))))],
				vec![Node::text(count.to_string())],
			)
			.map(on_button.clone())],
		)
	};
	let subscription = set.subscribe(|value| Opaque::new(Msg::Set(value)));

	let program = Program::element(
		&runtime,
		(0_i64, Cmd::none()),
		move |message: Opaque, count: &i64| {
			let count = match message.get::<Msg>() {
				Msg::Increment => count + 1,
				Msg::Set(value) => value,
			};
			(count, report.cmd(count))
		},
		move |_| subscription.clone(),
		view,
		dom.clone(),
		&body,
	)
	.unwrap();

	let div = dom.borrow().children(body)[0];
	let button = dom.borrow().children(div)[0];
	dispatch_event(&dom, button, "click", &json!({}));
	assert_eq!(*program.model(), 1);

	set.send(&json!(10)).unwrap();
	assert_eq!(*program.model(), 10);

	assert_eq!(*reported.borrow(), [json!(1), json!(10)]);
	assert_eq!(dom.borrow().children(div), &[button]);
	assert_eq!(
		dom.borrow().to_markup(body),
		"<body><div><button @click>10</button></div></body>"
	);
}

#[test]
fn ports_refuse_values_before_start() {
	let runtime = Runtime::new(Scheduler::new());
	let set = runtime.incoming_port("set", decode::int()).unwrap();
	assert!(set.send(&json!(1)).is_err());
}
