//! Fixed-size worker pool used for listener dispatch.
//!
//! Jobs go through an unbounded `crossbeam` channel to `size` named threads.
//! Shutdown closes the channel, lets workers drain what is already queued,
//! and waits up to a deadline for them to exit. Workers still busy at the
//! deadline are detached.

use crate::error::OwlError;
use crate::Result;
use crossbeam::channel::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Outcome of [`WorkerPool::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Workers that exited before the deadline
    pub joined: usize,
    /// Workers still running at the deadline
    pub detached: usize,
}

impl DrainReport {
    pub fn is_complete(&self) -> bool {
        self.detached == 0
    }
}

/// Fixed set of named threads pulling jobs off one shared channel
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    exited: Receiver<usize>,
}

impl WorkerPool {
    /// Spawn `size` workers named `{name}-{index}`. A size of zero is raised
    /// to one.
    pub fn new(size: usize, name: &str) -> Result<Self> {
        let size = size.max(1);
        let (sender, receiver) = channel::unbounded::<Job>();
        let (exit_tx, exited) = channel::bounded::<usize>(size);

        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let receiver = receiver.clone();
            let exit_tx = exit_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || {
                    // Runs until every sender is gone and the queue is empty.
                    for job in receiver.iter() {
                        job();
                    }
                    let _ = exit_tx.send(index);
                })
                .map_err(|e| OwlError::WorkerPool(format!("failed to spawn worker {index}: {e}")))?;
            workers.push(handle);
        }

        debug!("Worker pool '{}' started with {} workers", name, size);
        Ok(Self {
            sender: Some(sender),
            workers,
            exited,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Jobs queued but not yet picked up by a worker.
    pub fn queued(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }

    /// Queue a job. Fails once the pool is shutting down.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| OwlError::WorkerPool("pool is shut down".to_string()))?;
        sender
            .send(Box::new(job))
            .map_err(|_| OwlError::WorkerPool("all workers have exited".to_string()))
    }

    /// Stop accepting work and wait up to `drain_timeout` for queued jobs to
    /// finish.
    pub fn shutdown(mut self, drain_timeout: Duration) -> DrainReport {
        self.sender.take();

        let deadline = Instant::now() + drain_timeout;
        let mut slots: Vec<Option<JoinHandle<()>>> = self.workers.drain(..).map(Some).collect();
        let mut joined = 0;

        while joined < slots.len() {
            match self.exited.recv_deadline(deadline) {
                Ok(index) => {
                    if let Some(handle) = slots.get_mut(index).and_then(Option::take) {
                        let _ = handle.join();
                    }
                    joined += 1;
                }
                Err(_) => break,
            }
        }

        let detached = slots.len() - joined;
        if detached > 0 {
            warn!(
                "⏰ {} dispatch worker(s) still busy after {:?}; detaching",
                detached, drain_timeout
            );
        }
        DrainReport { joined, detached }
    }
}
