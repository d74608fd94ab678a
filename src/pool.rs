//! Worker Pool
//!
//! Fixed set of threads draining a shared job channel. Catalog commands and
//! database mounts run here so the router never waits on them.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{LaneError, Result};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    workers: Vec<Worker>,
    sender: Option<Sender<Job>>,
}

impl WorkerPool {
    /// Spawn `size` workers named `{name}-{i}`
    pub fn new(size: usize, name: &str) -> Result<Self> {
        if size == 0 {
            return Err(LaneError::Config("worker pool size must be > 0".to_string()));
        }

        let (sender, receiver) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            workers.push(Worker::spawn(i, format!("{}-{}", name, i), receiver.clone())?);
        }

        Ok(Self {
            workers,
            sender: Some(sender),
        })
    }

    /// Queue a job; fails only once the pool is shutting down
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| LaneError::Busy("worker pool is shut down".to_string()))?;
        sender
            .send(Box::new(f))
            .map_err(|_| LaneError::Busy("worker pool is shut down".to_string()))
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Jobs waiting for a free worker
    pub fn queued(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());

        for worker in self.workers.drain(..) {
            tracing::debug!("Shutting down worker {}", worker.id);
            if worker.thread.join().is_err() {
                tracing::warn!("Worker {} exited abnormally", worker.id);
            }
        }
    }
}

struct Worker {
    id: usize,
    thread: JoinHandle<()>,
}

impl Worker {
    fn spawn(id: usize, name: String, receiver: Receiver<Job>) -> Result<Self> {
        let thread = thread::Builder::new().name(name).spawn(move || {
            for job in receiver.iter() {
                // A panicking job must not take the worker down with it
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    tracing::error!("Worker {} recovered from a panicking job", id);
                }
            }
            tracing::debug!("Worker {} disconnected", id);
        })?;

        Ok(Self { id, thread })
    }
}
