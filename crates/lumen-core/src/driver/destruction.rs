// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Deferred destruction keyed by submission index.
//!
//! Every command buffer handed to the GPU gets a monotonically increasing
//! [`SubmissionIndex`]. Teardown of an object is attached to the submission that
//! is recording when `destroy` is called, since that submission may still
//! reference the object, and runs once the backend reports it as retired.

use std::collections::VecDeque;
use std::fmt;

/// Monotonic id of a GPU submission. Index 0 means "nothing submitted yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SubmissionIndex(pub u64);

impl SubmissionIndex {
    /// The submission after this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SubmissionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A pending teardown, run with mutable access to the backend context `C`.
pub type Retirement<C> = Box<dyn FnOnce(&mut C) + Send>;

/// FIFO of teardowns waiting for their submission to retire.
pub struct DestructionQueue<C> {
    pending: VecDeque<(SubmissionIndex, Retirement<C>)>,
    retired: u64,
}

impl<C> DestructionQueue<C> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            retired: 0,
        }
    }

    /// Runs `teardown` once submission `after` has retired.
    ///
    /// Indices must be scheduled in non-decreasing order.
    pub fn schedule(&mut self, after: SubmissionIndex, teardown: impl FnOnce(&mut C) + Send + 'static) {
        debug_assert!(
            self.pending.back().is_none_or(|(last, _)| *last <= after),
            "submission indices must not go backwards"
        );
        self.pending.push_back((after, Box::new(teardown)));
    }

    /// Runs every teardown whose submission is at or below `completed`, in the
    /// order they were scheduled. Returns how many ran.
    pub fn retire(&mut self, completed: SubmissionIndex, context: &mut C) -> usize {
        let mut count = 0;
        while self
            .pending
            .front()
            .is_some_and(|(index, _)| *index <= completed)
        {
            if let Some((_, teardown)) = self.pending.pop_front() {
                teardown(context);
                count += 1;
            }
        }
        self.retired += count as u64;
        count
    }

    /// Runs every pending teardown regardless of GPU progress. Only valid once the
    /// device is idle.
    pub fn drain_all(&mut self, context: &mut C) -> usize {
        let count = self.pending.len();
        while let Some((_, teardown)) = self.pending.pop_front() {
            teardown(context);
        }
        self.retired += count as u64;
        count
    }

    /// Number of teardowns still waiting.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` when nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total number of teardowns run so far.
    pub fn retired_count(&self) -> u64 {
        self.retired
    }
}

impl<C> Default for DestructionQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_is_freed_before_its_submission_retires() {
        let mut freed: Vec<&'static str> = Vec::new();
        let mut queue = DestructionQueue::new();
        queue.schedule(SubmissionIndex(1), |freed: &mut Vec<_>| freed.push("vb"));
        queue.schedule(SubmissionIndex(2), |freed: &mut Vec<_>| freed.push("texture"));

        assert_eq!(queue.retire(SubmissionIndex(0), &mut freed), 0);
        assert!(freed.is_empty());

        assert_eq!(queue.retire(SubmissionIndex(1), &mut freed), 1);
        assert_eq!(freed, ["vb"]);

        assert_eq!(queue.retire(SubmissionIndex(5), &mut freed), 1);
        assert_eq!(freed, ["vb", "texture"]);
        assert!(queue.is_empty());
        assert_eq!(queue.retired_count(), 2);
    }

    #[test]
    fn test_same_submission_runs_in_schedule_order() {
        let mut order = Vec::new();
        let mut queue = DestructionQueue::new();
        for i in 0..5 {
            queue.schedule(SubmissionIndex(3), move |order: &mut Vec<i32>| order.push(i));
        }
        queue.retire(SubmissionIndex(3), &mut order);
        assert_eq!(order, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_drain_all_runs_everything_once() {
        let mut count = 0u32;
        let mut queue = DestructionQueue::new();
        queue.schedule(SubmissionIndex(10), |count: &mut u32| *count += 1);
        queue.schedule(SubmissionIndex(11), |count: &mut u32| *count += 1);
        assert_eq!(queue.drain_all(&mut count), 2);
        assert_eq!(queue.drain_all(&mut count), 0);
        assert_eq!(count, 2);
    }
}
