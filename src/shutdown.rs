//! Cooperative shutdown signal
//!
//! One `ShutdownHandle` triggers, any number of `Shutdown` receivers observe.
//! Periodic tasks check the signal between cycles; an in-flight cycle is
//! allowed to finish.

use tokio::sync::watch;

/// Sending half
#[derive(Debug)]
pub struct ShutdownHandle {
    sender: watch::Sender<bool>,
}

/// Receiving half, cheap to clone
#[derive(Debug, Clone)]
pub struct Shutdown {
    receiver: watch::Receiver<bool>,
}

/// Create a linked handle and receiver.
pub fn channel() -> (ShutdownHandle, Shutdown) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownHandle { sender }, Shutdown { receiver })
}

impl ShutdownHandle {
    /// Signal every receiver. Idempotent.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once shutdown has been signalled.
    ///
    /// Also resolves if the handle is dropped, so orphaned tasks stop.
    pub async fn wait(&mut self) {
        let _ = self.receiver.wait_for(|triggered| *triggered).await;
    }
}
