// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Bounded result queue between the drive interrupt and the main loop.
//!
//! Results cannot be published from interrupt context, so the interrupt pushes a tag for each
//! result that is ready and the main loop drains them in order. The queue is a lock-free
//! single-producer/single-consumer ring. The producer never blocks: when full, the newest entry is
//! dropped and counted.

use heapless::spsc::{Consumer, Producer, Queue};

use crate::fmt::warning;

/// Maximum number of pending results.
pub const RESULT_QUEUE_CAPACITY: usize = 16;

// heapless reserves one slot to tell full from empty
const SLOTS: usize = RESULT_QUEUE_CAPACITY + 1;

/// Kind of result waiting to be published.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResultTag {
    ActiveCapReady,
    ScanCapReady,
    GroupCapReady,
    ElectrodesAckReady,
}

/// Backing storage for the queue. Split once into its two ends.
pub struct ResultQueue {
    queue: Queue<ResultTag, SLOTS>,
}

impl ResultQueue {
    pub const fn new() -> Self {
        Self { queue: Queue::new() }
    }

    /// Split into the interrupt-side producer and main-loop consumer.
    pub fn split(&mut self) -> (ResultProducer<'_>, ResultConsumer<'_>) {
        let (producer, consumer) = self.queue.split();
        (
            ResultProducer {
                producer,
                dropped: 0,
                high_water: 0,
            },
            ResultConsumer { consumer },
        )
    }
}

impl Default for ResultQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Interrupt-side end of the queue.
pub struct ResultProducer<'a> {
    producer: Producer<'a, ResultTag, SLOTS>,
    dropped: u32,
    high_water: usize,
}

impl<'a> ResultProducer<'a> {
    /// Push a result tag. Returns `false` (and drops the tag) if the queue is full.
    pub fn push(&mut self, tag: ResultTag) -> bool {
        match self.producer.enqueue(tag) {
            Ok(()) => {
                self.high_water = self.high_water.max(self.producer.len());
                true
            }
            Err(tag) => {
                self.dropped = self.dropped.wrapping_add(1);
                warning!("result queue full, dropped {}", tag);
                false
            }
        }
    }

    /// Number of tags dropped because the queue was full.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Largest fill level observed.
    #[inline]
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.producer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Main-loop end of the queue.
pub struct ResultConsumer<'a> {
    consumer: Consumer<'a, ResultTag, SLOTS>,
}

impl<'a> ResultConsumer<'a> {
    /// Pop the oldest tag.
    #[inline]
    pub fn pop(&mut self) -> Option<ResultTag> {
        self.consumer.dequeue()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
