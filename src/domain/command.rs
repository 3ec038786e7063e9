//! Command Rate Limiting
//!
//! Velocity commands arrive from the host at whatever rate the publisher
//! chooses. They land in a [`CommandRegister`] and a [`CommandSampler`]
//! copies the register into the [`CommandQueue`] on a fixed period, which
//! is the cadence the BLE writer sees.

use crate::domain::models::Command;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, trace};

/// Single-slot cell holding the most recent command. Starts at stop.
#[derive(Debug, Clone)]
pub struct CommandRegister {
    slot: Arc<Mutex<Command>>,
}

impl Default for CommandRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegister {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Command::STOP)),
        }
    }

    pub fn set(&self, command: Command) {
        // A poisoned slot still holds a plain value, so keep using it
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = command;
    }

    pub fn get(&self) -> Command {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("command queue consumer has gone away")]
pub struct QueueClosed;

/// Create the producer and consumer ends of the command queue
pub fn command_queue() -> (CommandQueue, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandQueue { tx }, CommandReceiver { rx })
}

/// Producer end. Pushing never blocks.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: mpsc::UnboundedSender<Command>,
}

impl CommandQueue {
    pub fn push(&self, command: Command) -> Result<(), QueueClosed> {
        self.tx.send(command).map_err(|_| QueueClosed)
    }
}

/// Consumer end, owned by the BLE session
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<Command>,
}

impl CommandReceiver {
    /// Wait for the next command. Returns `None` once every producer is dropped.
    pub async fn pop(&mut self) -> Option<Command> {
        self.rx.recv().await
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Copies the register into the queue once per tick
#[derive(Debug, Clone)]
pub struct CommandSampler {
    register: CommandRegister,
    queue: CommandQueue,
}

impl CommandSampler {
    pub fn new(register: CommandRegister, queue: CommandQueue) -> Self {
        Self { register, queue }
    }

    /// Enqueue the current command. Failures are logged and the tick is dropped.
    pub fn sample_and_enqueue(&self) {
        let command = self.register.get();
        match self.queue.push(command) {
            Ok(()) => trace!("Sampled command: {:?}", command),
            Err(e) => error!("Dropping command tick: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_defaults_to_stop() {
        assert_eq!(CommandRegister::new().get(), Command::STOP);
    }

    #[tokio::test]
    async fn test_register_last_write_wins() {
        let register = CommandRegister::new();
        let (queue, mut receiver) = command_queue();
        let sampler = CommandSampler::new(register.clone(), queue);

        register.set(Command::new(1.0, 0.0, 0.0));
        register.set(Command::new(2.0, 0.0, 0.0));
        register.set(Command::new(3.0, 0.5, -0.5));
        sampler.sample_and_enqueue();

        assert_eq!(receiver.pop().await, Some(Command::new(3.0, 0.5, -0.5)));
        assert_eq!(receiver.len(), 0);
    }

    #[tokio::test]
    async fn test_queue_is_fifo() {
        let (queue, mut receiver) = command_queue();
        let a = Command::new(1.0, 0.0, 0.0);
        let b = Command::new(0.0, 1.0, 0.0);
        let c = Command::new(0.0, 0.0, 1.0);
        queue.push(a).unwrap();
        queue.push(b).unwrap();
        queue.push(c).unwrap();

        assert_eq!(receiver.pop().await, Some(a));
        assert_eq!(receiver.pop().await, Some(b));
        assert_eq!(receiver.pop().await, Some(c));
    }

    #[tokio::test]
    async fn test_identical_samples_are_not_deduplicated() {
        let register = CommandRegister::new();
        let (queue, mut receiver) = command_queue();
        let sampler = CommandSampler::new(register, queue);

        sampler.sample_and_enqueue();
        sampler.sample_and_enqueue();

        assert_eq!(receiver.len(), 2);
        assert_eq!(receiver.pop().await, Some(Command::STOP));
        assert_eq!(receiver.pop().await, Some(Command::STOP));
    }

    #[test]
    fn test_sampler_survives_closed_queue() {
        let (queue, receiver) = command_queue();
        drop(receiver);
        assert_eq!(queue.push(Command::STOP), Err(QueueClosed));

        let sampler = CommandSampler::new(CommandRegister::new(), queue);
        sampler.sample_and_enqueue();
    }
}
