//! FIFO ring buffer with one writer cursor and independent reader cursors
//!
//! The buffer holds `depth` slots. A reader whose cursor equals the writer
//! cursor has nothing left to read; the buffer is full for that reader when
//! the writer is one slot behind it. Slots keep their content after being
//! read so the history can still be searched by time or position.
//!
//! This type holds no lock. [`crate::Channel`] wraps it in a mutex and adds
//! the blocking waits.

use isl_core::log::msg;
use isl_core::{is_event_time, step_tolerance, IslError, IslResult, OverflowPolicy, Value};

/// One buffered sample
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub value: Value,
    pub time: f64,
    pub step: f64,
}

/// Result of a time-matched read
#[derive(Clone, Debug, PartialEq)]
pub enum TimedRead {
    /// A matching entry
    Found(Entry),
    /// Nothing matches yet, a later write may
    Pending,
    /// The requested time lies in a gap of the history
    Missing,
}

/// FIFO configuration
#[derive(Clone, Debug)]
pub struct FifoConfig {
    /// Number of slots
    pub depth: usize,
    /// Maximum attached readers
    pub max_readers: usize,
    /// Relative step tolerance for time matching
    pub step_tolerance: f64,
    /// Step recorded by plain writes
    pub original_step: f64,
    /// Non-waiting write on a full buffer
    pub overflow_policy: OverflowPolicy,
}

impl Default for FifoConfig {
    fn default() -> Self {
        FifoConfig {
            depth: 16,
            max_readers: 16,
            step_tolerance: isl_core::DEFAULT_STEP_TOLERANCE,
            original_step: isl_core::EVENT_STEP,
            overflow_policy: OverflowPolicy::DropOldest,
        }
    }
}

/// Multi-reader ring buffer
#[derive(Debug)]
pub struct Fifo {
    slots: Vec<Entry>,
    writer: usize,
    /// Reader cursors; slot 0 exists before any reader attaches
    readers: Vec<usize>,
    nb_readers: usize,
    config: FifoConfig,
}

impl Fifo {
    /// Create a buffer whose slots hold `initial` at `start_time`
    pub fn new(config: FifoConfig, initial: Value, start_time: f64) -> IslResult<Self> {
        if config.depth < 2 {
            return Err(IslError::ValidationError(format!(
                "fifo depth must be at least 2, got {}",
                config.depth
            )));
        }
        let slot = Entry {
            value: initial,
            time: start_time,
            step: config.original_step,
        };
        Ok(Fifo {
            slots: vec![slot; config.depth],
            writer: 0,
            readers: vec![0; config.max_readers.max(1)],
            nb_readers: 0,
            config,
        })
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn writer_index(&self) -> usize {
        self.writer
    }

    #[inline]
    pub fn nb_readers(&self) -> usize {
        self.nb_readers
    }

    pub fn reader_index(&self, reader: usize) -> Option<usize> {
        if reader < self.nb_readers {
            Some(self.readers[reader])
        } else {
            None
        }
    }

    pub fn config(&self) -> &FifoConfig {
        &self.config
    }

    /// Attach a reader; its cursor starts where the slot was left
    pub fn add_reader(&mut self) -> IslResult<usize> {
        if self.nb_readers >= self.readers.len() {
            tracing::warn!(
                msg_id = msg::FIFO_READER_LIMIT,
                max = self.readers.len(),
                "reader limit reached"
            );
            return Err(IslError::AllocationError(format!(
                "at most {} readers per output",
                self.readers.len()
            )));
        }
        let id = self.nb_readers;
        self.nb_readers += 1;
        Ok(id)
    }

    /// Entries written but not yet read by `reader`
    #[inline]
    pub fn unread(&self, reader: usize) -> usize {
        (self.writer + self.depth() - self.readers[reader]) % self.depth()
    }

    #[inline]
    pub fn is_empty_for(&self, reader: usize) -> bool {
        self.writer == self.readers[reader]
    }

    #[inline]
    pub fn is_full_for(&self, reader: usize) -> bool {
        self.unread(reader) == self.depth() - 1
    }

    /// Full when any attached reader (or the initial slot) has no room left
    pub fn is_full(&self) -> bool {
        (0..self.tracked()).any(|r| self.is_full_for(r))
    }

    fn tracked(&self) -> usize {
        self.nb_readers.max(1)
    }

    #[inline]
    fn wrap(&self, index: isize) -> usize {
        index.rem_euclid(self.depth() as isize) as usize
    }

    /// Publish an entry at the writer cursor
    ///
    /// On a full buffer `overwrite` applies the overflow policy: with
    /// `DropOldest` every lagging reader loses its oldest unread entry.
    pub fn push(&mut self, value: Value, time: f64, step: f64, overwrite: bool) -> IslResult<()> {
        if self.is_full() {
            if !overwrite || self.config.overflow_policy == OverflowPolicy::Reject {
                return Err(IslError::FifoFull);
            }
            for r in 0..self.tracked() {
                if self.is_full_for(r) {
                    self.readers[r] = (self.readers[r] + 1) % self.depth();
                    tracing::debug!(msg_id = msg::FIFO_OVERWRITE, reader = r, time, "oldest entry dropped");
                }
            }
        }
        let w = self.writer;
        self.slots[w] = Entry { value, time, step };
        self.writer = (w + 1) % self.depth();
        Ok(())
    }

    /// Republish the last written value at a new time and step
    pub fn push_last(&mut self, time: f64, step: f64, overwrite: bool) -> IslResult<()> {
        let last = self.wrap(self.writer as isize - 1);
        let value = self.slots[last].value.clone();
        self.push(value, time, step, overwrite)
    }

    /// Read and consume the entry under the reader cursor
    pub fn pop(&mut self, reader: usize) -> IslResult<Entry> {
        if self.is_empty_for(reader) {
            return Err(IslError::FifoEmpty);
        }
        let r = self.readers[reader];
        self.readers[reader] = (r + 1) % self.depth();
        Ok(self.slots[r].clone())
    }

    fn advance(&mut self, reader: usize) {
        self.readers[reader] = (self.readers[reader] + 1) % self.depth();
    }

    /// Read the entry applicable at `in_time`
    ///
    /// Entries whose successor is already due are consumed. An entry whose
    /// time is within tolerance of `in_time`, or whose `[t, t + step)` interval
    /// contains it, is returned and consumed. A request older than the cursor
    /// is answered from the history without consuming anything.
    pub fn read_at_time(&mut self, reader: usize, in_time: f64) -> TimedRead {
        let cursor = self.readers[reader];
        let head = &self.slots[cursor];
        if is_event_time(head.time) {
            return match self.pop(reader) {
                Ok(mut entry) => {
                    entry.time = in_time;
                    TimedRead::Found(entry)
                }
                Err(_) => TimedRead::Pending,
            };
        }

        let mut time = head.time;
        let mut tol = step_tolerance(self.config.step_tolerance, head.step);
        if self.is_empty_for(reader) && in_time < time - tol {
            return self.from_history(cursor, in_time, tol);
        }

        while !self.is_empty_for(reader) {
            let cursor = self.readers[reader];
            let entry = &self.slots[cursor];
            let step = entry.step;
            time = entry.time;
            tol = step_tolerance(self.config.step_tolerance, step);

            if in_time > time + tol {
                if step >= 0.0 && in_time >= time + step - tol {
                    self.advance(reader);
                    continue;
                }
                let found = entry.clone();
                self.advance(reader);
                return TimedRead::Found(found);
            } else if in_time >= time - tol {
                let found = entry.clone();
                self.advance(reader);
                return TimedRead::Found(found);
            } else {
                return self.from_history(cursor, in_time, tol);
            }
        }

        if in_time >= time - tol {
            if let Some(found) = self.latest_event_stepped(self.readers[reader], in_time, tol) {
                return TimedRead::Found(found);
            }
        }
        TimedRead::Pending
    }

    /// Search backward from `cursor` for the entry covering `in_time`
    fn from_history(&self, cursor: usize, in_time: f64, tol: f64) -> TimedRead {
        let mut best: Option<usize> = None;
        let mut best_time = -1.0;
        for i in 1..self.depth() {
            let idx = self.wrap(cursor as isize - i as isize);
            let entry = &self.slots[idx];
            if entry.time > in_time + tol {
                continue;
            }
            if entry.step <= 0.0 && entry.time > best_time {
                best_time = entry.time;
                best = Some(idx);
            } else if entry.time + entry.step > in_time + tol {
                best = Some(idx);
            }
        }
        match best {
            Some(idx) => TimedRead::Found(self.slots[idx].clone()),
            None => {
                tracing::debug!(msg_id = msg::FIFO_NO_HISTORY, in_time, "no entry covers requested time");
                TimedRead::Missing
            }
        }
    }

    /// Latest entry behind `cursor` without a fixed step that is already due
    fn latest_event_stepped(&self, cursor: usize, in_time: f64, tol: f64) -> Option<Entry> {
        let mut best: Option<&Entry> = None;
        let mut best_time = -1.0;
        for i in 1..self.depth() {
            let entry = &self.slots[self.wrap(cursor as isize - i as isize)];
            if entry.step < 0.0 && in_time >= entry.time - tol && entry.time > best_time {
                best_time = entry.time;
                best = Some(entry);
            }
        }
        best.cloned()
    }

    /// Overwrite the slot `ind + 1` positions after the writer cursor
    ///
    /// Only value and time change; the cursors do not move.
    pub fn write_at(&mut self, value: Value, time: f64, ind: i32) -> IslResult<()> {
        if ind < 0 || ind as usize >= self.depth() {
            return Err(IslError::IndexOutOfRange(ind));
        }
        let idx = (self.writer + ind as usize + 1) % self.depth();
        let slot = &mut self.slots[idx];
        slot.value = value;
        slot.time = time;
        Ok(())
    }

    /// Read relative to a cursor without moving it
    ///
    /// A non-negative `ind` moves `ind + 1` slots forward, a negative one
    /// moves `|ind| + 1` slots back.
    pub fn read_relative(&self, cursor: usize, ind: i32) -> IslResult<Entry> {
        let depth = self.depth() as i32;
        if ind <= -depth || ind >= depth {
            return Err(IslError::IndexOutOfRange(ind));
        }
        let offset = if ind >= 0 { ind + 1 } else { ind - 1 };
        Ok(self.slots[self.wrap(cursor as isize + offset as isize)].clone())
    }

    /// Absolute slot access
    pub fn slot(&self, ind: i32) -> IslResult<&Entry> {
        if ind < 0 || ind as usize >= self.depth() {
            return Err(IslError::IndexOutOfRange(ind));
        }
        Ok(&self.slots[ind as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fifo(depth: usize, step: f64) -> Fifo {
        let config = FifoConfig {
            depth,
            original_step: step,
            ..FifoConfig::default()
        };
        Fifo::new(config, Value::real(0.0), 0.0).unwrap()
    }

    fn real(e: &Entry) -> f64 {
        e.value.as_real().unwrap()
    }

    #[test]
    fn test_push_pop_order() {
        let mut f = fifo(4, 1.0);
        let r = f.add_reader().unwrap();
        assert!(f.is_empty_for(r));

        f.push(Value::real(1.0), 0.0, 1.0, false).unwrap();
        f.push(Value::real(2.0), 1.0, 1.0, false).unwrap();
        assert_eq!(f.unread(r), 2);

        assert_eq!(real(&f.pop(r).unwrap()), 1.0);
        assert_eq!(real(&f.pop(r).unwrap()), 2.0);
        assert!(matches!(f.pop(r), Err(IslError::FifoEmpty)));
    }

    #[test]
    fn test_full_reject_and_drop_oldest() {
        let mut f = fifo(3, 1.0);
        let r = f.add_reader().unwrap();
        f.push(Value::real(1.0), 0.0, 1.0, false).unwrap();
        f.push(Value::real(2.0), 1.0, 1.0, false).unwrap();
        assert!(f.is_full());
        assert!(matches!(
            f.push(Value::real(3.0), 2.0, 1.0, false),
            Err(IslError::FifoFull)
        ));

        f.push(Value::real(3.0), 2.0, 1.0, true).unwrap();
        assert_eq!(real(&f.pop(r).unwrap()), 2.0);
        assert_eq!(real(&f.pop(r).unwrap()), 3.0);
    }

    #[test]
    fn test_reject_policy_never_overwrites() {
        let config = FifoConfig {
            depth: 2,
            overflow_policy: OverflowPolicy::Reject,
            ..FifoConfig::default()
        };
        let mut f = Fifo::new(config, Value::integer(0), 0.0).unwrap();
        f.add_reader().unwrap();
        f.push(Value::integer(1), 0.0, 1.0, true).unwrap();
        assert!(f.push(Value::integer(2), 1.0, 1.0, true).is_err());
    }

    #[test]
    fn test_readers_independent() {
        let mut f = fifo(8, 1.0);
        let a = f.add_reader().unwrap();
        let b = f.add_reader().unwrap();
        f.push(Value::real(1.0), 0.0, 1.0, false).unwrap();
        f.push(Value::real(2.0), 1.0, 1.0, false).unwrap();

        f.pop(a).unwrap();
        assert_eq!(f.reader_index(a), Some(1));
        assert_eq!(f.reader_index(b), Some(0));
        assert_eq!(f.unread(b), 2);
    }

    #[test]
    fn test_reader_limit() {
        let config = FifoConfig {
            max_readers: 1,
            ..FifoConfig::default()
        };
        let mut f = Fifo::new(config, Value::real(0.0), 0.0).unwrap();
        f.add_reader().unwrap();
        assert!(f.add_reader().is_err());
    }

    #[test]
    fn test_timed_exact_and_hold() {
        let mut f = fifo(8, 1.0);
        let r = f.add_reader().unwrap();
        f.push(Value::real(10.0), 0.0, 1.0, false).unwrap();
        f.push(Value::real(11.0), 1.0, 1.0, false).unwrap();
        f.push(Value::real(12.0), 2.0, 1.0, false).unwrap();

        match f.read_at_time(r, 0.0) {
            TimedRead::Found(e) => assert_eq!(real(&e), 10.0),
            other => panic!("unexpected {:?}", other),
        }
        // 1.5 lies inside [1, 2)
        match f.read_at_time(r, 1.5) {
            TimedRead::Found(e) => assert_eq!(e.time, 1.0),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(f.unread(r), 1);
    }

    #[test]
    fn test_timed_skips_stale_entries() {
        let mut f = fifo(8, 1.0);
        let r = f.add_reader().unwrap();
        for i in 0..4 {
            f.push(Value::real(i as f64), i as f64, 1.0, false).unwrap();
        }
        match f.read_at_time(r, 3.0) {
            TimedRead::Found(e) => assert_eq!(real(&e), 3.0),
            other => panic!("unexpected {:?}", other),
        }
        assert!(f.is_empty_for(r));
    }

    #[test]
    fn test_timed_pending_on_future_request() {
        let mut f = fifo(8, 1.0);
        let r = f.add_reader().unwrap();
        f.push(Value::real(1.0), 0.0, 1.0, false).unwrap();
        assert_eq!(f.read_at_time(r, 5.0), TimedRead::Pending);
    }

    #[test]
    fn test_timed_history_lookup() {
        let mut f = fifo(8, 1.0);
        let r = f.add_reader().unwrap();
        f.push(Value::real(10.0), 1.0, 1.0, false).unwrap();
        f.pop(r).unwrap();
        f.push(Value::real(11.0), 2.0, 1.0, false).unwrap();
        f.push(Value::real(12.0), 3.0, 1.0, false).unwrap();

        // Request older than the cursor is served from history, nothing consumed
        match f.read_at_time(r, 1.5) {
            TimedRead::Found(e) => assert_eq!(real(&e), 10.0),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(f.unread(r), 2);
    }

    #[test]
    fn test_event_entry_takes_requested_time() {
        let mut f = fifo(4, -1.0);
        let r = f.add_reader().unwrap();
        f.push(Value::real(7.0), isl_core::EVENT_TIME, -1.0, false).unwrap();
        f.pop(r).unwrap();
        f.push(Value::real(8.0), isl_core::EVENT_TIME, -1.0, false).unwrap();
        // cursor now points at an event entry
        match f.read_at_time(r, 4.2) {
            TimedRead::Found(e) => {
                assert_eq!(real(&e), 8.0);
                assert_eq!(e.time, 4.2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_variable_step_ignores_cursor_slot() {
        let mut f = fifo(3, -1.0);
        let r = f.add_reader().unwrap();
        for (v, t) in [(9.0, 9.0), (1.0, 1.0), (2.0, 2.0)] {
            f.push(Value::real(v), t, -1.0, false).unwrap();
            f.pop(r).unwrap();
        }
        // the cursor slot holds the consumed 9.0 and is about to be rewritten
        assert_eq!(f.reader_index(r), Some(0));
        match f.read_at_time(r, 10.0) {
            TimedRead::Found(e) => assert_eq!(real(&e), 2.0),
            other => panic!("unexpected {:?}", other),
        }
        assert!(f.is_empty_for(r));
    }

    #[test]
    fn test_positional_access() {
        let mut f = fifo(4, 1.0);
        let r = f.add_reader().unwrap();
        f.push(Value::real(1.0), 0.0, 1.0, false).unwrap();
        f.push(Value::real(2.0), 1.0, 1.0, false).unwrap();

        assert_eq!(real(f.slot(1).unwrap()), 2.0);
        assert!(f.slot(4).is_err());

        let cursor = f.reader_index(r).unwrap();
        assert_eq!(real(&f.read_relative(cursor, 0).unwrap()), 2.0);
        assert!(f.read_relative(cursor, 4).is_err());

        // writer is at 2, ind 0 targets slot 3
        f.write_at(Value::real(9.0), 5.0, 0).unwrap();
        assert_eq!(f.slot(3).unwrap().time, 5.0);
        assert_eq!(f.writer_index(), 2);
        assert!(f.write_at(Value::real(9.0), 5.0, 4).is_err());
    }

    #[test]
    fn test_push_last_repeats_value() {
        let mut f = fifo(4, 1.0);
        let r = f.add_reader().unwrap();
        f.push(Value::real(3.5), 0.0, 1.0, false).unwrap();
        f.push_last(1.0, 0.5, false).unwrap();
        f.pop(r).unwrap();
        let e = f.pop(r).unwrap();
        assert_eq!(real(&e), 3.5);
        assert_eq!(e.time, 1.0);
        assert_eq!(e.step, 0.5);
    }

    proptest! {
        #[test]
        fn prop_reader_sees_non_decreasing_times(
            deltas in proptest::collection::vec(0.0f64..2.0, 1..64),
            depth in 2usize..16,
        ) {
            let mut f = fifo(depth, 1.0);
            let r = f.add_reader().unwrap();
            let mut t = 0.0;
            let mut last = f64::MIN;
            for d in deltas {
                t += d;
                if f.is_full() {
                    let e = f.pop(r).unwrap();
                    prop_assert!(e.time >= last);
                    last = e.time;
                }
                f.push(Value::real(t), t, 1.0, false).unwrap();
            }
            while let Ok(e) = f.pop(r) {
                prop_assert!(e.time >= last);
                last = e.time;
            }
            prop_assert_eq!(last, t);
        }
    }
}
