//! Line handoff between the reader thread and the consumer.
//!
//! An unbounded FIFO over `std::sync::mpsc`. Neither side ever blocks: the
//! reader pushes, the consumer drains whatever is there at the moment.

use std::sync::mpsc::{self, Receiver, Sender};

/// Create a connected sender/receiver pair.
pub fn line_channel() -> (LineSender, LineReceiver) {
    let (tx, rx) = mpsc::channel();
    (LineSender { tx }, LineReceiver { rx })
}

/// Producer side. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LineSender {
    tx: Sender<String>,
}

impl LineSender {
    /// Enqueue a line. Returns `false` once the receiver is gone.
    pub fn push(&self, line: String) -> bool {
        self.tx.send(line).is_ok()
    }
}

/// Consumer side.
#[derive(Debug)]
pub struct LineReceiver {
    rx: Receiver<String>,
}

impl LineReceiver {
    /// Take every line queued right now, oldest first.
    pub fn drain(&self) -> Vec<String> {
        self.rx.try_iter().collect()
    }

    /// Take the oldest queued line, if any.
    pub fn try_pop(&self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}
