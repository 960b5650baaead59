//! Cross-thread event queue between a sweep worker and its consumer.
//!
//! A thin wrapper over an unbounded [`crossbeam_channel`], shaped as a
//! queue: producers push, the consumer polls with [`EventQueue::try_pop`]
//! on its own cadence. Cloning shares the same underlying channel, so one
//! handle can live on the worker thread while another stays with the UI
//! loop.

use crossbeam_channel::{unbounded, Receiver, Sender};

pub struct EventQueue<M> {
    tx: Sender<M>,
    rx: Receiver<M>,
}

impl<M> EventQueue<M> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Append an event. Never blocks; the queue is unbounded so a slow
    /// consumer delays delivery, not production.
    pub fn push(&self, event: M) {
        // Send fails only when every receiver is gone, and we hold one.
        let _ = self.tx.send(event);
    }

    /// Remove and return the oldest event, if any. Never blocks.
    pub fn try_pop(&self) -> Option<M> {
        self.rx.try_recv().ok()
    }

    pub fn has_items(&self) -> bool {
        !self.rx.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Discard everything currently queued.
    pub fn clear(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

impl<M> Clone for EventQueue<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<M> Default for EventQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}
