//! Periodic tick sources
//!
//! A [`Clock`] arms repeating callbacks and cancels them again. Timers never
//! sleep or spawn threads themselves; whoever owns the clock drives it:
//!
//! - [`ManualClock`] runs on virtual time and only moves when
//!   [`advance`](ManualClock::advance) is called, which makes it suitable for
//!   tests and for embedding timers in an existing frame or event loop.
//! - [`LoopClock`] runs on the system clock, sleeping on the current thread
//!   in [`run`](LoopClock::run) until the next callback is due.

use std::{
    cell::{Cell, RefCell},
    fmt,
    thread,
    time::{Duration, Instant},
};

use chrono::{DateTime, Local, TimeDelta};
use log::debug;

/// A callback fired by a clock
pub type TickFn = Box<dyn FnMut()>;

/// Identifies an armed callback so it can be cancelled
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickHandle(u64);

/// Something that can fire a callback at a fixed period
pub trait Clock {
    /// Fire `tick` every `period`, the first time after `delay + period`
    fn arm(&self, delay: Duration, period: Duration, tick: TickFn) -> TickHandle;

    /// Stop firing the callback behind `handle`
    ///
    /// Once this returns the callback will not run again. Cancelling a
    /// handle twice is harmless.
    fn cancel(&self, handle: TickHandle);

    /// The current wall-clock time
    fn now(&self) -> DateTime<Local>;
}

struct Entry {
    handle: TickHandle,
    due: Duration,
    period: Duration,
    tick: Option<TickFn>,
}

/// Armed callbacks, keyed by the offset at which they are next due
#[derive(Default)]
struct Schedule {
    next_id: Cell<u64>,
    entries: RefCell<Vec<Entry>>,
}

impl Schedule {
    fn arm(&self, due: Duration, period: Duration, tick: TickFn) -> TickHandle {
        let handle = TickHandle(self.next_id.get());
        self.next_id.set(handle.0 + 1);

        self.entries.borrow_mut().push(Entry {
            handle,
            due,
            period,
            tick: Some(tick),
        });

        handle
    }

    fn cancel(&self, handle: TickHandle) {
        self.entries.borrow_mut().retain(|entry| entry.handle != handle);
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// The earliest offset at which a callback is due
    fn next_due(&self) -> Option<Duration> {
        self.entries
            .borrow()
            .iter()
            .filter(|entry| entry.tick.is_some())
            .map(|entry| entry.due)
            .min()
    }

    /// Fire the earliest callback due at or before `now`
    ///
    /// Returns false if nothing was due.
    fn fire_next(&self, now: Duration) -> bool {
        let taken = {
            let mut entries = self.entries.borrow_mut();
            let next = entries
                .iter_mut()
                .filter(|entry| entry.tick.is_some() && entry.due <= now)
                .min_by_key(|entry| (entry.due, entry.handle.0));

            match next {
                Some(entry) => {
                    let repeat = entry.due.checked_add(entry.period);
                    entry.due = repeat.unwrap_or(Duration::MAX);
                    entry
                        .tick
                        .take()
                        .map(|tick| (entry.handle, repeat.is_some(), tick))
                }
                None => None,
            }
        };

        let Some((handle, repeats, mut tick)) = taken else {
            return false;
        };

        tick();

        // Past the end of representable time, so it can never come due again.
        if !repeats {
            self.cancel(handle);
            return true;
        }

        // The callback may have cancelled itself, in which case it is dropped here.
        if let Some(entry) = self
            .entries
            .borrow_mut()
            .iter_mut()
            .find(|entry| entry.handle == handle)
        {
            entry.tick = Some(tick);
        }

        true
    }
}

/// A clock on virtual time, moved forward by hand
///
/// ```
/// use std::{cell::Cell, rc::Rc, time::Duration};
/// use tickr::{Clock, ManualClock};
///
/// let clock = ManualClock::new();
/// let ticks = Rc::new(Cell::new(0));
/// let counter = ticks.clone();
/// clock.arm(Duration::ZERO, Duration::from_secs(1), Box::new(move || counter.set(counter.get() + 1)));
///
/// clock.advance(Duration::from_secs(3));
/// assert_eq!(ticks.get(), 3);
/// ```
pub struct ManualClock {
    schedule: Schedule,
    elapsed: Cell<Duration>,
    started_at: DateTime<Local>,
}

impl ManualClock {
    /// Create a clock whose wall time starts at the current local time
    pub fn new() -> Self {
        Self::starting_at(Local::now())
    }

    /// Create a clock whose wall time starts at `started_at`
    pub fn starting_at(started_at: DateTime<Local>) -> Self {
        Self {
            schedule: Schedule::default(),
            elapsed: Cell::new(Duration::ZERO),
            started_at,
        }
    }

    /// Move time forward, firing every callback that comes due on the way
    pub fn advance(&self, by: Duration) {
        let target = self.elapsed.get().saturating_add(by);

        while let Some(due) = self.schedule.next_due().filter(|due| *due <= target) {
            self.elapsed.set(self.elapsed.get().max(due));
            self.schedule.fire_next(due);
        }

        self.elapsed.set(target);
    }

    /// Shorthand for advancing a whole number of seconds
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Virtual time passed since the clock was created
    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    /// The number of callbacks currently armed
    pub fn armed(&self) -> usize {
        self.schedule.len()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn arm(&self, delay: Duration, period: Duration, tick: TickFn) -> TickHandle {
        let due = self.elapsed.get().saturating_add(delay).saturating_add(period);

        self.schedule.arm(due, period, tick)
    }

    fn cancel(&self, handle: TickHandle) {
        self.schedule.cancel(handle);
    }

    fn now(&self) -> DateTime<Local> {
        let elapsed = TimeDelta::from_std(self.elapsed.get()).unwrap_or(TimeDelta::MAX);

        self.started_at + elapsed
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("elapsed", &self.elapsed.get())
            .field("armed", &self.schedule.len())
            .finish()
    }
}

/// A clock on real time that runs callbacks on the current thread
pub struct LoopClock {
    schedule: Schedule,
    origin: Instant,
}

impl LoopClock {
    pub fn new() -> Self {
        Self {
            schedule: Schedule::default(),
            origin: Instant::now(),
        }
    }

    /// Run callbacks as they come due until none are armed
    pub fn run(&self) {
        self.run_until(None);
    }

    /// Run callbacks as they come due, for at most `limit`
    pub fn run_for(&self, limit: Duration) {
        self.run_until(Some(self.origin.elapsed().saturating_add(limit)));
    }

    /// The number of callbacks currently armed
    pub fn armed(&self) -> usize {
        self.schedule.len()
    }

    fn run_until(&self, limit: Option<Duration>) {
        debug!("Running clock loop with {} armed callbacks", self.schedule.len());

        while let Some(due) = self.schedule.next_due() {
            if let Some(limit) = limit.filter(|limit| due > *limit) {
                sleep_until(self.origin, limit);
                break;
            }

            sleep_until(self.origin, due);
            self.schedule.fire_next(self.origin.elapsed());
        }

        debug!("Clock loop finished");
    }
}

impl Default for LoopClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for LoopClock {
    fn arm(&self, delay: Duration, period: Duration, tick: TickFn) -> TickHandle {
        let due = self.origin.elapsed().saturating_add(delay).saturating_add(period);

        self.schedule.arm(due, period, tick)
    }

    fn cancel(&self, handle: TickHandle) {
        self.schedule.cancel(handle);
    }

    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

impl fmt::Debug for LoopClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopClock")
            .field("armed", &self.schedule.len())
            .finish()
    }
}

fn sleep_until(origin: Instant, offset: Duration) {
    let now = origin.elapsed();

    if offset > now {
        thread::sleep(offset - now);
    }
}
