//! Blocking request dispatch onto a service worker.
//!
//! Requests travel to a dedicated worker thread over an mpsc channel. Each
//! carries a reply slot and a [`Rendezvous`]; the worker fills the slot and
//! notifies, the caller waits. A worker that finishes before the caller
//! starts waiting is fine: the rendezvous remembers the notification.

use crate::service::{KeystoreService, ServiceResponse};
use keystore_core::{Error, Rendezvous, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

type Job = Box<dyn FnOnce(&KeystoreService) + Send>;

struct Request {
    job: Job,
    done: Arc<Rendezvous>,
}

pub struct Dispatcher {
    sender: Option<Sender<Request>>,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Move `service` onto a new worker thread.
    pub fn spawn(service: KeystoreService) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Request>();
        let worker = thread::Builder::new()
            .name("keystore-worker".into())
            .spawn(move || {
                debug!("dispatch worker started");
                for request in receiver {
                    let job = request.job;
                    if panic::catch_unwind(AssertUnwindSafe(|| job(&service))).is_err() {
                        error!("service verb panicked");
                    }
                    request.done.notify();
                }
                debug!("dispatch worker stopped");
            })
            .map_err(|e| {
                error!(error = %e, "failed to spawn dispatch worker");
                Error::Failure
            })?;
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Run `verb` on the worker and block until it has produced a result.
    pub fn call<T, F>(&self, verb: F) -> ServiceResponse<T>
    where
        T: Send + 'static,
        F: FnOnce(&KeystoreService) -> Result<T> + Send + 'static,
    {
        ServiceResponse::from_result(self.execute(verb))
    }

    fn execute<T, F>(&self, verb: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&KeystoreService) -> Result<T> + Send + 'static,
    {
        let slot: Arc<Mutex<Option<Result<T>>>> = Arc::new(Mutex::new(None));
        let done = Arc::new(Rendezvous::new());

        let reply = Arc::clone(&slot);
        let job: Job = Box::new(move |service| {
            let result = verb(service);
            *reply.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
        });

        let sender = self.sender.as_ref().ok_or(Error::CommunicationFailure)?;
        sender
            .send(Request {
                job,
                done: Arc::clone(&done),
            })
            .map_err(|_| {
                error!("dispatch worker is gone");
                Error::CommunicationFailure
            })?;
        done.wait();

        let result = slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        result.unwrap_or(Err(Error::CommunicationFailure))
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("dispatch worker panicked");
            }
        }
    }
}
