// Runs one counter's reads on a dedicated thread so a stalled read costs that instance,
// not the whole tick. At most one read is outstanding per reader.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::CounterError;

pub(crate) struct BoundedReader<T> {
    instance: String,
    timeout: Duration,
    requests: Option<Sender<()>>,
    replies: Receiver<Result<T, CounterError>>,
    thread: Option<JoinHandle<()>>,
    pending: bool,
}

impl<T: Send + 'static> BoundedReader<T> {
    /// Moves `read` onto a new thread named after `label`. The thread, and whatever `read`
    /// owns, lives until the reader is dropped.
    pub(crate) fn spawn<F>(
        label: &str,
        instance: &str,
        timeout: Duration,
        mut read: F,
    ) -> Result<Self, CounterError>
    where
        F: FnMut() -> Result<T, CounterError> + Send + 'static,
    {
        let (requests, request_rx) = mpsc::channel::<()>();
        let (reply_tx, replies) = mpsc::channel();
        let thread = std::thread::Builder::new()
            .name(format!("counter-{}-{}", label, instance))
            .spawn(move || {
                while request_rx.recv().is_ok() {
                    if reply_tx.send(read()).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| CounterError::Unavailable {
                counter: label.to_string(),
                instance: instance.to_string(),
                reason: format!("reader thread: {}", e),
            })?;
        Ok(Self {
            instance: instance.to_string(),
            timeout,
            requests: Some(requests),
            replies,
            thread: Some(thread),
            pending: false,
        })
    }

    pub(crate) fn instance(&self) -> &str {
        &self.instance
    }

    /// Starts a read. When the previous read is still outstanding nothing is started and
    /// `false` is returned; a late reply that already arrived is discarded.
    pub(crate) fn begin(&mut self) -> bool {
        if self.pending {
            match self.replies.try_recv() {
                Ok(_) => self.pending = false,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return false,
            }
        }
        let sent = self
            .requests
            .as_ref()
            .is_some_and(|tx| tx.send(()).is_ok());
        self.pending = sent;
        sent
    }

    /// Waits until `deadline` for the read started by `begin`.
    pub(crate) fn finish(&mut self, started: bool, deadline: Instant) -> Result<T, CounterError> {
        if !started {
            return Err(CounterError::Read {
                instance: self.instance.clone(),
                reason: "previous read still outstanding".into(),
            });
        }
        let wait = deadline.saturating_duration_since(Instant::now());
        match self.replies.recv_timeout(wait) {
            Ok(reply) => {
                self.pending = false;
                reply
            }
            Err(RecvTimeoutError::Timeout) => Err(CounterError::TimedOut {
                instance: self.instance.clone(),
                timeout: self.timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => {
                self.pending = false;
                Err(CounterError::Read {
                    instance: self.instance.clone(),
                    reason: "reader thread exited".into(),
                })
            }
        }
    }

    /// `begin` + `finish` bounded by this reader's own timeout.
    pub(crate) fn read(&mut self) -> Result<T, CounterError> {
        let deadline = Instant::now() + self.timeout;
        let started = self.begin();
        self.finish(started, deadline)
    }
}

impl<T> Drop for BoundedReader<T> {
    fn drop(&mut self) {
        // Closing the request channel ends the thread's loop.
        self.requests.take();
        if let Some(thread) = self.thread.take()
            && !self.pending
        {
            // Idle: the thread exits at once and releases the counter before we return.
            let _ = thread.join();
        }
    }
}
