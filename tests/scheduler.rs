use std::{cell::RefCell, rc::Rc};
use vdom_runtime::{
	opaque::Opaque,
	scheduler::{ProcessId, ProcessState, Scheduler},
	task::Task,
};

type Log = Rc<RefCell<Vec<String>>>;

fn log_messages(log: Log, name: &'static str) -> Task {
	Task::receive(move |message| {
		log.borrow_mut().push(format!("{} {}", name, message.get::<i32>()));
		log_messages(log.clone(), name)
	})
}

#[test]
fn work_queued_in_one_pass_runs_in_order() {
	let scheduler = Scheduler::new();
	let log = Log::default();

	let listener = scheduler.raw_spawn(log_messages(log.clone(), "listener"));

	let notify = {
		let scheduler = scheduler.clone();
		Task::binding(move |resolver| {
			scheduler.raw_send(listener, Opaque::new(1_i32));
			resolver.resolve(Task::succeed(()));
			None
		})
	};
	let follow_up = {
		let log = log.clone();
		Task::binding(move |resolver| {
			log.borrow_mut().push("follow-up".to_owned());
			resolver.resolve(Task::succeed(()));
			None
		})
	};

	let parent = {
		let scheduler_ = scheduler.clone();
		scheduler.raw_spawn(scheduler.spawn(notify).and_then(move |_| scheduler_.spawn(follow_up.clone())))
	};

	assert_eq!(*log.borrow(), ["listener 1", "follow-up"]);
	assert_eq!(scheduler.state(parent), ProcessState::Halted);
	assert_eq!(scheduler.state(listener), ProcessState::BlockedOnMailbox);
	assert!(scheduler.is_idle());
}

fn bounce(log: Log, name: &'static str, peer: Rc<RefCell<Option<ProcessId>>>, scheduler: Scheduler) -> Task {
	Task::receive(move |message| {
		let count = message.get::<i32>();
		log.borrow_mut().push(format!("{} {}", name, count));
		if count < 3 {
			let id = peer.borrow().expect("peer spawned");
			scheduler.raw_send(id, Opaque::new(count + 1));
		}
		bounce(log.clone(), name, peer.clone(), scheduler.clone())
	})
}

#[test]
fn processes_take_turns_at_their_mailboxes() {
	let scheduler = Scheduler::new();
	let log = Log::default();
	let (a_peer, b_peer) = (Rc::new(RefCell::new(None)), Rc::new(RefCell::new(None)));

	let a = scheduler.raw_spawn(bounce(log.clone(), "a", a_peer.clone(), scheduler.clone()));
	let b = scheduler.raw_spawn(bounce(log.clone(), "b", b_peer.clone(), scheduler.clone()));
	*a_peer.borrow_mut() = Some(b);
	*b_peer.borrow_mut() = Some(a);

	scheduler.raw_send(a, Opaque::new(0_i32));
	assert_eq!(*log.borrow(), ["a 0", "b 1", "a 2", "b 3"]);

	scheduler.raw_kill(b);
	scheduler.raw_send(b, Opaque::new(9_i32));
	assert_eq!(scheduler.state(b), ProcessState::Halted);
	assert_eq!(log.borrow().len(), 4);
}

#[test]
fn tasks_can_kill_other_processes() {
	let scheduler = Scheduler::new();
	let log = Log::default();
	let victim = scheduler.raw_spawn(log_messages(log.clone(), "victim"));

	scheduler.raw_spawn(scheduler.send(victim, Opaque::new(1_i32)).and_then({
		let scheduler = scheduler.clone();
		move |_| scheduler.kill(victim)
	}));

	assert_eq!(*log.borrow(), ["victim 1"]);
	assert_eq!(scheduler.state(victim), ProcessState::Halted);
}

#[test]
fn a_process_killing_itself_stops_at_once() {
	let scheduler = Scheduler::new();
	let log = Log::default();
	let own = Rc::new(RefCell::new(None::<ProcessId>));

	let id = scheduler.raw_spawn(Task::receive({
		let (scheduler, own, log) = (scheduler.clone(), own.clone(), log.clone());
		move |_| {
			scheduler.raw_kill(own.borrow().expect("spawned"));
			let log = log.clone();
			Task::succeed(()).and_then(move |_| {
				log.borrow_mut().push("ran after kill".to_owned());
				Task::succeed(())
			})
		}
	}));
	*own.borrow_mut() = Some(id);

	scheduler.raw_send(id, Opaque::new(0_i32));
	assert!(log.borrow().is_empty());
	assert_eq!(scheduler.state(id), ProcessState::Halted);
	assert_eq!(scheduler.live_processes(), 0);

	scheduler.raw_send(id, Opaque::new(1_i32));
	assert!(log.borrow().is_empty());
}

#[test]
fn finished_processes_are_released() {
	let scheduler = Scheduler::new();
	let ids: Vec<_> = (0..100)
		.map(|i| {
			if i % 2 == 0 {
				scheduler.raw_spawn(Task::succeed(()))
			} else {
				scheduler.raw_spawn(Task::fail(()))
			}
		})
		.collect();

	assert_eq!(scheduler.live_processes(), 0);
	assert!(ids.iter().all(|&id| scheduler.state(id) == ProcessState::Halted));
	assert!(scheduler.is_idle());
}
