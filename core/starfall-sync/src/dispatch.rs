//! Main-context dispatch queue.
//!
//! Callbacks that touch display or binding state must run on the host's
//! primary execution context. Background work never calls them directly;
//! it posts closures to a [`MainDispatcher`] and the host drains the
//! paired [`MainQueue`] from its primary loop. A single consumer, explicit
//! and inspectable, with no runtime-provided marshaling.

use tokio::sync::mpsc;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Creates a connected dispatcher/queue pair.
pub fn main_context() -> (MainDispatcher, MainQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MainDispatcher { tx }, MainQueue { rx })
}

/// Posts closures onto the primary execution context. Cheap to clone and
/// safe to use from any thread or task.
#[derive(Clone)]
pub struct MainDispatcher {
    tx: mpsc::UnboundedSender<Task>,
}

impl MainDispatcher {
    /// Enqueues a closure for the primary loop. If the queue side is gone
    /// (host shutting down) the closure is silently dropped.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        let _ = self.tx.send(Box::new(task));
    }
}

/// The consuming end, owned by the host's primary loop.
pub struct MainQueue {
    rx: mpsc::UnboundedReceiver<Task>,
}

impl MainQueue {
    /// Awaits and runs the next posted closure. Returns `false` once every
    /// dispatcher has been dropped and the queue is empty.
    pub async fn run_one(&mut self) -> bool {
        match self.rx.recv().await {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Runs everything currently queued without waiting. Returns how many
    /// closures ran.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Runs posted closures until every dispatcher is dropped.
    pub async fn run(&mut self) {
        while self.run_one().await {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn posted_tasks_run_in_order() {
        let (dispatcher, mut queue) = main_context();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            dispatcher.post(move || log.lock().unwrap().push(i));
        }
        assert_eq!(queue.drain(), 3);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn run_one_returns_false_after_all_dispatchers_drop() {
        let (dispatcher, mut queue) = main_context();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        dispatcher.post(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        drop(dispatcher);

        assert!(queue.run_one().await);
        assert!(!queue.run_one().await);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
