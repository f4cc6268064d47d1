//! The update loop tying a model, its view and the effect bus together.

use super::{Cmd, Error, Runtime, SendToApp, Sub};
use crate::{
	opaque::Opaque,
	vdom::{Dom, Node, Renderer},
};
use core::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{instrument, trace};

/// Called with each new model, after `update` and before the resulting effects are dispatched.
pub type Stepper<M> = Box<dyn FnMut(&M)>;

struct Inner<M> {
	model: RefCell<Rc<M>>,
	update: Box<dyn Fn(Opaque, &M) -> (M, Cmd)>,
	subscriptions: Box<dyn Fn(&M) -> Sub>,
	stepper: RefCell<Option<Stepper<M>>>,
	runtime: Runtime,
}

/// A running program.
pub struct Program<M> {
	inner: Rc<Inner<M>>,
	send_to_app: SendToApp,
}

impl<M: 'static> Program<M> {
	/// Starts `runtime` with this program as the receiver of all messages, then dispatches the
	/// initial effects.
	///
	/// `stepper_builder` is called once with the initial model.
	///
	/// # Errors
	///
	/// Iff `runtime` was already started.
	pub fn initialize(
		runtime: &Runtime,
		init: (M, Cmd),
		update: impl Fn(Opaque, &M) -> (M, Cmd) + 'static,
		subscriptions: impl Fn(&M) -> Sub + 'static,
		stepper_builder: impl FnOnce(SendToApp, &M) -> Stepper<M>,
	) -> Result<Self, Error> {
		let (model, cmd) = init;
		let inner = Rc::new(Inner {
			model: RefCell::new(Rc::new(model)),
			update: Box::new(update),
			subscriptions: Box::new(subscriptions),
			stepper: RefCell::new(None),
			runtime: runtime.clone(),
		});

		let send_to_app: SendToApp = {
			let inner = Rc::downgrade(&inner);
			Rc::new(move |message: Opaque| receive(&inner, message))
		};

		let model = inner.model.borrow().clone();
		let stepper = stepper_builder(send_to_app.clone(), &model);
		*inner.stepper.borrow_mut() = Some(stepper);

		runtime.start(send_to_app.clone())?;
		let sub = (inner.subscriptions)(&model);
		runtime.enqueue_effects(cmd, sub);

		Ok(Self { inner, send_to_app })
	}

	/// A program without a view.
	///
	/// # Errors
	///
	/// Iff `runtime` was already started.
	pub fn worker(
		runtime: &Runtime,
		init: (M, Cmd),
		update: impl Fn(Opaque, &M) -> (M, Cmd) + 'static,
		subscriptions: impl Fn(&M) -> Sub + 'static,
	) -> Result<Self, Error> {
		Self::initialize(runtime, init, update, subscriptions, |_, _| Box::new(|_: &M| ()))
	}

	/// A program that renders `view` of each model into `container`.
	///
	/// Redraws happen synchronously after each update.
	///
	/// # Errors
	///
	/// Iff `runtime` was already started.
	pub fn element<D: Dom>(
		runtime: &Runtime,
		init: (M, Cmd),
		update: impl Fn(Opaque, &M) -> (M, Cmd) + 'static,
		subscriptions: impl Fn(&M) -> Sub + 'static,
		view: impl Fn(&M) -> Node + 'static,
		dom: Rc<RefCell<D>>,
		container: &D::Handle,
	) -> Result<Self, Error> {
		Self::initialize(runtime, init, update, subscriptions, |send_to_app, model| {
			let mut renderer = Renderer::mount(dom, container, view(model), send_to_app);
			Box::new(move |model: &M| renderer.draw(view(model)))
		})
	}

	#[must_use]
	pub fn model(&self) -> Rc<M> {
		self.inner.model.borrow().clone()
	}

	/// Feeds `message` to `update` as if a listener or manager had sent it.
	pub fn send(&self, message: Opaque) {
		(self.send_to_app)(message);
	}

	#[must_use]
	pub fn send_to_app(&self) -> SendToApp {
		self.send_to_app.clone()
	}

	#[must_use]
	pub fn runtime(&self) -> &Runtime {
		&self.inner.runtime
	}
}

#[instrument(skip(inner, message))]
fn receive<M>(inner: &Weak<Inner<M>>, message: Opaque) {
	let inner = match inner.upgrade() {
		Some(inner) => inner,
		None => {
			trace!("Dropped a message for a program that is gone.");
			return;
		}
	};

	let current = inner.model.borrow().clone();
	let (model, cmd) = (inner.update)(message, &current);
	let model = Rc::new(model);
	*inner.model.borrow_mut() = model.clone();

	let stepper = inner.stepper.borrow_mut().take();
	match stepper {
		Some(mut stepper) => {
			stepper(&model);
			let mut slot = inner.stepper.borrow_mut();
			if slot.is_none() {
				*slot = Some(stepper);
			}
		}
		None => trace!("Skipped a redraw: already drawing further up the stack."),
	}

	let sub = (inner.subscriptions)(&model);
	inner.runtime.enqueue_effects(cmd, sub);
}
