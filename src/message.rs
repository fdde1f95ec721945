use super::dispatch::Runnable;

pub(crate) enum WorkerMessage {
	Execute(Box<dyn Runnable>),
	Shutdown,
}
