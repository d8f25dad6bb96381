//! Event sources for the daemon loop.
//!
//! A background thread emits periodic ticks and another forwards lines typed
//! on stdin. Both feed one channel, so the main loop handles a single event
//! at a time and ticks can never overlap.

use color_eyre::Result;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Events that drive the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Time to run the pipeline.
    Tick,
    /// A line of user input.
    Command(String),
}

/// Receives events from the tick and stdin threads.
pub struct EventHandler {
    sender: mpsc::Sender<Event>,
    receiver: mpsc::Receiver<Event>,
    /// Commands pulled off the channel while coalescing ticks.
    pending: RefCell<VecDeque<Event>>,
}

impl EventHandler {
    /// Starts the tick thread.
    #[must_use]
    pub fn new(tick_rate: Duration) -> Self {
        let (sender, receiver) = mpsc::channel();

        let tx = sender.clone();
        thread::spawn(move || {
            let mut last_tick = Instant::now();
            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::ZERO);
                thread::sleep(timeout);

                if tx.send(Event::Tick).is_err() {
                    return;
                }
                last_tick = Instant::now();
            }
        });

        Self {
            sender,
            receiver,
            pending: RefCell::new(VecDeque::new()),
        }
    }

    /// Also forwards stdin lines as [`Event::Command`]s.
    #[must_use]
    pub fn with_stdin(self) -> Self {
        let tx = self.sender.clone();
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { return };
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                if tx.send(Event::Command(line)).is_err() {
                    return;
                }
            }
            log::debug!("stdin closed");
        });
        self
    }

    /// Blocks until the next event is available.
    ///
    /// # Errors
    ///
    /// Returns an error if the event channel is disconnected.
    pub fn next(&self) -> Result<Event> {
        if let Some(event) = self.pending.borrow_mut().pop_front() {
            return Ok(event);
        }
        Ok(self.receiver.recv()?)
    }

    /// Drops ticks that queued up while the last one ran, keeping commands.
    /// Returns how many ticks were dropped.
    pub fn drain_ticks(&self) -> usize {
        let mut dropped = 0;
        let mut pending = self.pending.borrow_mut();
        pending.retain(|e| {
            let tick = *e == Event::Tick;
            dropped += usize::from(tick);
            !tick
        });
        while let Ok(event) = self.receiver.try_recv() {
            match event {
                Event::Tick => dropped += 1,
                other => pending.push_back(other),
            }
        }
        if dropped > 0 {
            log::debug!("Coalesced {dropped} late ticks");
        }
        dropped
    }
}
