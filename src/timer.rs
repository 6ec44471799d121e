//! The timer state machine

use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
    time::Duration,
};

use chrono::{DateTime, Local, TimeDelta};
use log::{debug, warn};

use crate::clock::{Clock, TickHandle};
use crate::error::{Result, TimerError};
use crate::events::EventNotifier;
use crate::format::{format_time, FormattedTime, Raw};
use crate::options::TimerOptions;
use crate::registry::WeakRegistry;
use crate::time::{parse_time, TimeSpec};

/// How often a running timer ticks
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// A stopwatch stops by itself once it reaches this many seconds
pub const STOPWATCH_LIMIT: u32 = 3_600_000;

/// The kinds of events a timer publishes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Tick,
    Start,
    Pause,
    Stop,
    Finish,
    Destroy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerState {
    /// Not started yet, or stopped
    Idle,
    Running,
    Paused,
    /// Torn down for good
    Destroyed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Counts down to zero
    Countdown,
    /// Counts up from the start time
    Stopwatch,
}

/// Which of a timer's times to format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeField {
    #[default]
    Current,
    Start,
}

/// What listeners hear on every tick
#[derive(Clone, Debug)]
pub struct Tick {
    pub formatted_time: String,
    pub raw: Raw,
    /// Always zero for stopwatches
    pub percent_done: u32,
    pub current_time: u32,
    pub start_time: u32,
    pub timer: Timer,
}

#[derive(Clone, Debug)]
pub enum Event {
    Tick(Tick),
    Start(Timer),
    Pause(Timer),
    Stop(Timer),
    Finish(Timer),
    Destroy(Timer),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Tick(_) => EventKind::Tick,
            Event::Start(_) => EventKind::Start,
            Event::Pause(_) => EventKind::Pause,
            Event::Stop(_) => EventKind::Stop,
            Event::Finish(_) => EventKind::Finish,
            Event::Destroy(_) => EventKind::Destroy,
        }
    }

    /// The timer that published this event
    pub fn timer(&self) -> &Timer {
        match self {
            Event::Tick(tick) => &tick.timer,
            Event::Start(timer)
            | Event::Pause(timer)
            | Event::Stop(timer)
            | Event::Finish(timer)
            | Event::Destroy(timer) => timer,
        }
    }
}

struct Data {
    start_time: u32,
    current_time: u32,
    deadline: Option<DateTime<Local>>,
    state: TimerState,
    options: TimerOptions,
    ticker: Option<TickHandle>,
    registry: Option<WeakRegistry>,
}

impl Data {
    fn mode(&self) -> Mode {
        if self.start_time > 0 && self.options.countdown != Some(false) {
            Mode::Countdown
        } else {
            Mode::Stopwatch
        }
    }

    fn format(&self, seconds: u32) -> FormattedTime {
        format_time(
            seconds,
            self.options.template(),
            self.options.separator_or_default(),
            self.options.pads_raw(),
        )
    }

    fn percent_done(&self) -> u32 {
        if self.mode() == Mode::Stopwatch {
            return 0;
        }

        let remaining = (f64::from(self.current_time) / f64::from(self.start_time) * 100.0).round();

        (100.0 - remaining).max(0.0) as u32
    }
}

struct Inner {
    data: RefCell<Data>,
    events: EventNotifier<EventKind, Event>,
    clock: Rc<dyn Clock>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.data.get_mut().ticker.take() {
            debug!("Dropping a running timer");
            self.clock.cancel(handle);
        }
    }
}

/// A countdown or stopwatch that ticks once a second
///
/// A timer built from a start time above zero counts down to zero; one
/// built from zero (or no time at all) counts up like a stopwatch. Ticks
/// come from the [`Clock`] the timer was created with, and every tick is
/// published to the listeners registered with [`ticker`](Self::ticker).
///
/// `Timer` is a cheap handle: clones refer to the same timer, and two
/// handles compare equal when they do. Listeners that hold on to a handle
/// keep the timer alive until it is [destroyed](Self::destroy). Once the last
/// handle is dropped the timer stops ticking and leaves its clock.
///
/// ```
/// use std::rc::Rc;
/// use tickr::{ManualClock, Timer, TimerOptions};
///
/// let clock = Rc::new(ManualClock::new());
/// let timer = Timer::new("10:00", TimerOptions::new(), clock.clone())?;
///
/// timer.start()?;
/// clock.advance_secs(1);
///
/// assert_eq!(timer.ft(), "09:59");
/// # Ok::<(), tickr::TimerError>(())
/// ```
#[derive(Clone)]
pub struct Timer {
    inner: Rc<Inner>,
}

impl Timer {
    /// Create an idle timer
    pub fn new(
        start_time: impl Into<TimeSpec>,
        options: TimerOptions,
        clock: Rc<dyn Clock>,
    ) -> Result<Self> {
        options.validate()?;
        let parsed = parse_time(&start_time.into(), clock.now())?;

        debug!("Creating timer starting at {} seconds", parsed.seconds);

        Ok(Self {
            inner: Rc::new(Inner {
                data: RefCell::new(Data {
                    start_time: parsed.seconds,
                    current_time: parsed.seconds,
                    deadline: parsed.deadline,
                    state: TimerState::Idle,
                    options,
                    ticker: None,
                    registry: None,
                }),
                events: EventNotifier::new(),
                clock,
            }),
        })
    }

    /// Start ticking
    ///
    /// Starting a running timer only logs a warning. A timer counting down
    /// to a deadline recalculates its start time first, so time spent idle
    /// is not counted twice.
    pub fn start(&self) -> Result<()> {
        self.start_after(Duration::ZERO)
    }

    /// Start ticking, holding off the first tick by `delay`
    pub fn start_after(&self, delay: Duration) -> Result<()> {
        self.ensure_alive()?;

        {
            let mut data = self.inner.data.borrow_mut();

            if data.state == TimerState::Running {
                warn!("Timer already running");
                return Ok(());
            }

            if let (TimerState::Idle, Some(deadline)) = (data.state, data.deadline) {
                let first_tick = TimeDelta::from_std(delay)
                    .ok()
                    .and_then(|delay| self.inner.clock.now().checked_add_signed(delay))
                    .ok_or_else(|| TimerError::TimeExceedsMaximum(deadline.to_rfc3339()))?;
                let parsed = parse_time(&TimeSpec::Deadline(deadline), first_tick)?;

                data.start_time = parsed.seconds;
                data.current_time = parsed.seconds;
            }

            let timer = Rc::downgrade(&self.inner);
            let handle = self.inner.clock.arm(delay, TICK_PERIOD, Box::new(move || tick(&timer)));

            data.ticker = Some(handle);
            data.state = TimerState::Running;

            debug!(
                "Started {:?} timer at {} of {} seconds",
                data.mode(),
                data.current_time,
                data.start_time
            );
        }

        self.publish(Event::Start(self.clone()));

        Ok(())
    }

    /// Stop ticking, keeping the current time
    pub fn pause(&self) -> Result<()> {
        self.ensure_alive()?;

        {
            let mut data = self.inner.data.borrow_mut();

            if data.state != TimerState::Running {
                debug!("Ignoring pause of a timer that is not running");
                return Ok(());
            }

            self.cancel_ticker(&mut data);
            data.state = TimerState::Paused;
        }

        self.publish(Event::Pause(self.clone()));

        Ok(())
    }

    /// Stop ticking and rewind to the start time
    pub fn stop(&self) -> Result<()> {
        self.ensure_alive()?;

        if self.halt() {
            self.publish(Event::Stop(self.clone()));
        }

        Ok(())
    }

    /// Tear the timer down
    ///
    /// Cancels ticking, tells the destroy listeners, drops every listener
    /// and leaves the registry. Any later call that changes the timer fails
    /// with [`TimerError::Destroyed`].
    pub fn destroy(&self) -> Result<()> {
        self.ensure_alive()?;

        let registry = {
            let mut data = self.inner.data.borrow_mut();

            self.cancel_ticker(&mut data);
            data.state = TimerState::Destroyed;
            data.registry.take()
        };

        self.publish(Event::Destroy(self.clone()));
        self.inner.events.clear();

        if let Some(registry) = registry.and_then(|registry| registry.upgrade()) {
            registry.remove(self);
        }

        debug!("Destroyed timer");

        Ok(())
    }

    /// Replace the start time, stopping the timer
    ///
    /// An invalid time leaves the timer untouched. Returns the new formatted
    /// time.
    pub fn set_start_time(&self, start_time: impl Into<TimeSpec>) -> Result<String> {
        self.ensure_alive()?;
        let parsed = parse_time(&start_time.into(), self.inner.clock.now())?;

        {
            let mut data = self.inner.data.borrow_mut();

            self.cancel_ticker(&mut data);
            data.state = TimerState::Idle;
            data.start_time = parsed.seconds;
            data.current_time = parsed.seconds;
            data.deadline = parsed.deadline;
        }

        Ok(self.ft())
    }

    /// Merge `options` into the current options
    ///
    /// Nothing changes unless the merged options are all valid.
    pub fn change_options(&self, options: TimerOptions) -> Result<()> {
        self.ensure_alive()?;

        let mut data = self.inner.data.borrow_mut();
        let merged = data.options.merge(&options);
        merged.validate()?;
        data.options = merged;

        Ok(())
    }

    /// Listen for every event of one kind
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Result<&Self>
    where
        F: FnMut(&Event) + 'static,
    {
        self.ensure_alive()?;
        self.inner.events.subscribe(kind, listener);

        Ok(self)
    }

    /// Listen for ticks
    pub fn ticker<F>(&self, mut listener: F) -> Result<&Self>
    where
        F: FnMut(&Tick) + 'static,
    {
        self.on(EventKind::Tick, move |event| {
            if let Event::Tick(tick) = event {
                listener(tick);
            }
        })
    }

    /// Listen for the timer running out
    pub fn finish<F>(&self, listener: F) -> Result<&Self>
    where
        F: FnMut(&Timer) + 'static,
    {
        self.on_timer(EventKind::Finish, listener)
    }

    pub fn on_start<F>(&self, listener: F) -> Result<&Self>
    where
        F: FnMut(&Timer) + 'static,
    {
        self.on_timer(EventKind::Start, listener)
    }

    pub fn on_pause<F>(&self, listener: F) -> Result<&Self>
    where
        F: FnMut(&Timer) + 'static,
    {
        self.on_timer(EventKind::Pause, listener)
    }

    pub fn on_stop<F>(&self, listener: F) -> Result<&Self>
    where
        F: FnMut(&Timer) + 'static,
    {
        self.on_timer(EventKind::Stop, listener)
    }

    pub fn on_destroy<F>(&self, listener: F) -> Result<&Self>
    where
        F: FnMut(&Timer) + 'static,
    {
        self.on_timer(EventKind::Destroy, listener)
    }

    /// The number of listeners for one kind of event
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.events.count_subscribers(&kind)
    }

    /// Format the current or start time with this timer's options
    pub fn format_time(&self, field: TimeField) -> FormattedTime {
        let data = self.inner.data.borrow();

        match field {
            TimeField::Current => data.format(data.current_time),
            TimeField::Start => data.format(data.start_time),
        }
    }

    /// The formatted current time
    pub fn ft(&self) -> String {
        self.format_time(TimeField::Current).formatted_time
    }

    /// The breakdown of the current time
    pub fn raw(&self) -> Raw {
        self.format_time(TimeField::Current).raw
    }

    /// How much of a countdown has elapsed, in percent
    pub fn percent_done(&self) -> u32 {
        self.inner.data.borrow().percent_done()
    }

    pub fn start_time(&self) -> u32 {
        self.inner.data.borrow().start_time
    }

    pub fn current_time(&self) -> u32 {
        self.inner.data.borrow().current_time
    }

    /// The point in time this timer counts down to, if it was given one
    pub fn deadline(&self) -> Option<DateTime<Local>> {
        self.inner.data.borrow().deadline
    }

    pub fn is_running(&self) -> bool {
        self.state() == TimerState::Running
    }

    pub fn is_destroyed(&self) -> bool {
        self.state() == TimerState::Destroyed
    }

    pub fn state(&self) -> TimerState {
        self.inner.data.borrow().state
    }

    pub fn mode(&self) -> Mode {
        self.inner.data.borrow().mode()
    }

    pub fn options(&self) -> TimerOptions {
        self.inner.data.borrow().options.clone()
    }

    pub(crate) fn join_registry(&self, registry: WeakRegistry) {
        self.inner.data.borrow_mut().registry = Some(registry);
    }

    pub(crate) fn leave_registry(&self) {
        self.inner.data.borrow_mut().registry = None;
    }

    fn on_timer<F>(&self, kind: EventKind, mut listener: F) -> Result<&Self>
    where
        F: FnMut(&Timer) + 'static,
    {
        self.on(kind, move |event| listener(event.timer()))
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(TimerError::Destroyed);
        }

        Ok(())
    }

    fn cancel_ticker(&self, data: &mut Data) {
        if let Some(handle) = data.ticker.take() {
            self.inner.clock.cancel(handle);
        }
    }

    /// Cancel ticking and rewind, returning whether the timer was active
    fn halt(&self) -> bool {
        let mut data = self.inner.data.borrow_mut();

        self.cancel_ticker(&mut data);
        data.current_time = data.start_time;

        let was_active = data.state != TimerState::Idle;
        data.state = TimerState::Idle;

        was_active
    }

    fn publish(&self, event: Event) {
        self.inner.events.publish(&event.kind(), &event);
    }

    fn advance(&self) {
        let tick = {
            let mut data = self.inner.data.borrow_mut();

            if data.state != TimerState::Running {
                return;
            }

            data.current_time = match data.mode() {
                Mode::Countdown => data.current_time.saturating_sub(1),
                Mode::Stopwatch => data.current_time.saturating_add(1),
            };

            let formatted = data.format(data.current_time);

            Tick {
                formatted_time: formatted.formatted_time,
                raw: formatted.raw,
                percent_done: data.percent_done(),
                current_time: data.current_time,
                start_time: data.start_time,
                timer: self.clone(),
            }
        };

        self.publish(Event::Tick(tick));

        let finished = {
            let data = self.inner.data.borrow();

            data.state == TimerState::Running
                && match data.mode() {
                    Mode::Countdown => data.current_time == 0,
                    Mode::Stopwatch => data.current_time >= STOPWATCH_LIMIT,
                }
        };

        if finished {
            debug!("Timer finished");

            self.halt();
            self.publish(Event::Stop(self.clone()));
            self.publish(Event::Finish(self.clone()));
        }
    }
}

fn tick(timer: &Weak<Inner>) {
    if let Some(inner) = timer.upgrade() {
        Timer { inner }.advance();
    }
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Timer {}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(data) = self.inner.data.try_borrow() else {
            return f.debug_struct("Timer").finish_non_exhaustive();
        };

        f.debug_struct("Timer")
            .field("start_time", &data.start_time)
            .field("current_time", &data.current_time)
            .field("state", &data.state)
            .field("mode", &data.mode())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::{cell::RefCell, rc::Rc, time::Duration};

    use chrono::TimeDelta;

    use crate::clock::{Clock, LoopClock, ManualClock};
    use crate::error::TimerError;
    use crate::options::TimerOptions;
    use crate::time::TimeSpec;
    use crate::timer::{EventKind, Mode, TimeField, Timer, TimerState};

    fn clock() -> Rc<ManualClock> {
        Rc::new(ManualClock::starting_at(
            "2024-03-27T12:00:00-06:00".parse().unwrap(),
        ))
    }

    fn timer(start: impl Into<TimeSpec>, clock: &Rc<ManualClock>) -> Timer {
        Timer::new(start, TimerOptions::new(), clock.clone()).unwrap()
    }

    fn record(timer: &Timer, log: &Rc<RefCell<Vec<String>>>) {
        for (kind, name) in [
            (EventKind::Start, "start"),
            (EventKind::Pause, "pause"),
            (EventKind::Stop, "stop"),
            (EventKind::Finish, "finish"),
            (EventKind::Destroy, "destroy"),
        ] {
            let log = log.clone();
            timer.on(kind, move |_| log.borrow_mut().push(name.to_string())).unwrap();
        }

        let log = log.clone();
        timer
            .ticker(move |tick| log.borrow_mut().push(tick.formatted_time.clone()))
            .unwrap();
    }

    #[test]
    fn new_timer_is_idle() {
        let clock = clock();
        let timer = timer(600, &clock);

        assert_eq!(timer.start_time(), 600);
        assert_eq!(timer.current_time(), 600);
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.mode(), Mode::Countdown);
        assert!(!timer.is_running());
    }

    #[test]
    fn invalid_start_time_fails() {
        let clock = clock();

        assert!(matches!(
            Timer::new("invalid", TimerOptions::new(), clock.clone()),
            Err(TimerError::InvalidTimeFormat(_))
        ));
        assert!(matches!(
            Timer::new(600, TimerOptions::new().format_output(""), clock.clone()),
            Err(TimerError::InvalidOutputFormat { .. })
        ));
    }

    #[test]
    fn countdown_ticks() {
        let clock = clock();
        let timer = timer(600, &clock);
        let ticks = Rc::new(RefCell::new(Vec::new()));

        let seen = ticks.clone();
        timer
            .ticker(move |tick| {
                seen.borrow_mut().push((
                    tick.formatted_time.clone(),
                    tick.percent_done,
                    tick.current_time,
                    tick.start_time,
                ))
            })
            .unwrap();

        timer.start().unwrap();
        clock.advance_secs(1);

        assert_eq!(*ticks.borrow(), vec![("09:59".to_string(), 0, 599, 600)]);
        assert!(timer.is_running());
    }

    #[test]
    fn tick_carries_the_timer() {
        let clock = clock();
        let timer = timer(600, &clock);
        let seen = Rc::new(RefCell::new(None));

        let inner = seen.clone();
        timer
            .ticker(move |tick| *inner.borrow_mut() = Some(tick.timer.clone()))
            .unwrap();
        timer.start().unwrap();
        clock.advance_secs(1);

        assert_eq!(seen.borrow().as_ref(), Some(&timer));
        timer.destroy().unwrap();
    }

    #[test]
    fn one_second_countdown_finishes() {
        let clock = clock();
        let timer = timer(1, &clock);
        let log = Rc::new(RefCell::new(Vec::new()));
        record(&timer, &log);

        timer.start().unwrap();
        clock.advance_secs(1);

        assert_eq!(*log.borrow(), vec!["start", "00:00", "stop", "finish"]);
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.current_time(), 1);
        assert_eq!(clock.armed(), 0);
    }

    #[test]
    fn stopwatch_counts_up() {
        let clock = clock();
        let timer = timer(TimeSpec::Unset, &clock);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let inner = seen.clone();
        timer
            .ticker(move |tick| inner.borrow_mut().push((tick.formatted_time.clone(), tick.current_time)))
            .unwrap();
        timer.start().unwrap();
        clock.advance_secs(1);

        assert_eq!(timer.mode(), Mode::Stopwatch);
        assert_eq!(*seen.borrow(), vec![("00:01".to_string(), 1)]);
        assert_eq!(timer.percent_done(), 0);
    }

    #[test]
    fn stopwatch_from_non_zero_start() {
        let clock = clock();
        let timer = Timer::new(600, TimerOptions::new().countdown(false), clock.clone()).unwrap();

        timer.start().unwrap();
        clock.advance_secs(1);

        assert_eq!(timer.ft(), "10:01");
        assert_eq!(timer.current_time(), 601);
        assert_eq!(timer.start_time(), 600);
    }

    #[test]
    fn countdown_option_is_ignored_at_zero() {
        let clock = clock();
        let timer = timer(TimeSpec::Unset, &clock);
        timer.change_options(TimerOptions::new().countdown(true)).unwrap();

        timer.start().unwrap();
        clock.advance_secs(1);

        assert_eq!(timer.ft(), "00:01");
    }

    #[test]
    fn stopwatch_stops_at_its_limit() {
        let clock = clock();
        let timer = Timer::new(3_599_998, TimerOptions::new().countdown(false), clock.clone()).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner = log.clone();
        timer.finish(move |_| inner.borrow_mut().push("finish")).unwrap();
        timer.start().unwrap();

        clock.advance_secs(1);
        assert!(log.borrow().is_empty());

        clock.advance_secs(1);
        assert_eq!(*log.borrow(), vec!["finish"]);
        assert!(!timer.is_running());
    }

    #[test]
    fn starting_twice_keeps_one_ticker() {
        let clock = clock();
        let timer = timer(600, &clock);
        let log = Rc::new(RefCell::new(Vec::new()));
        record(&timer, &log);

        timer.start().unwrap();
        timer.start().unwrap();
        clock.advance_secs(1);

        assert_eq!(clock.armed(), 1);
        assert_eq!(timer.current_time(), 599);
        assert_eq!(*log.borrow(), vec!["start", "09:59"]);
    }

    #[test]
    fn start_after_delay() {
        let clock = clock();
        let timer = timer(600, &clock);

        timer.start_after(Duration::from_secs(2)).unwrap();
        assert!(timer.is_running());

        clock.advance_secs(2);
        assert_eq!(timer.current_time(), 600);

        clock.advance_secs(1);
        assert_eq!(timer.current_time(), 599);
    }

    #[test]
    fn start_after_the_end_of_time() {
        let clock = clock();
        let timer = timer(600, &clock);

        timer.start_after(Duration::MAX).unwrap();
        clock.advance_secs(5);

        assert!(timer.is_running());
        assert_eq!(timer.current_time(), 600);
    }

    #[test]
    fn dropping_a_running_timer_disarms_the_clock() {
        let clock = clock();
        let timer = timer(600, &clock);

        timer.start().unwrap();
        assert_eq!(clock.armed(), 1);

        drop(timer);
        assert_eq!(clock.armed(), 0);

        clock.advance_secs(5);
        assert_eq!(clock.armed(), 0);
    }

    #[test]
    fn loop_clock_returns_once_running_timers_are_dropped() {
        let clock = Rc::new(LoopClock::new());
        let timer = Timer::new(600, TimerOptions::new(), clock.clone()).unwrap();

        timer.start().unwrap();
        drop(timer);
        clock.run();

        assert_eq!(clock.armed(), 0);
    }

    #[test]
    fn pause_keeps_current_time() {
        let clock = clock();
        let timer = timer(600, &clock);
        let log = Rc::new(RefCell::new(Vec::new()));
        record(&timer, &log);

        timer.start().unwrap();
        clock.advance_secs(2);
        timer.pause().unwrap();
        clock.advance_secs(5);

        assert_eq!(timer.state(), TimerState::Paused);
        assert_eq!(timer.current_time(), 598);
        assert_eq!(clock.armed(), 0);

        timer.start().unwrap();
        clock.advance_secs(1);

        assert_eq!(timer.current_time(), 597);
        assert_eq!(
            *log.borrow(),
            vec!["start", "09:59", "09:58", "pause", "start", "09:57"]
        );
    }

    #[test]
    fn pausing_an_idle_timer_does_nothing() {
        let clock = clock();
        let timer = timer(600, &clock);
        let log = Rc::new(RefCell::new(Vec::new()));
        record(&timer, &log);

        timer.pause().unwrap();

        assert_eq!(timer.state(), TimerState::Idle);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn stop_rewinds() {
        let clock = clock();
        let timer = timer(600, &clock);
        let log = Rc::new(RefCell::new(Vec::new()));
        record(&timer, &log);

        timer.start().unwrap();
        clock.advance_secs(1);
        timer.stop().unwrap();
        clock.advance_secs(3);

        assert_eq!(timer.current_time(), 600);
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(*log.borrow(), vec!["start", "09:59", "stop"]);
    }

    #[test]
    fn stopping_from_a_listener_prevents_finish() {
        let clock = clock();
        let timer = timer(1, &clock);
        let log = Rc::new(RefCell::new(Vec::new()));
        record(&timer, &log);

        timer.ticker(|tick| tick.timer.stop().unwrap()).unwrap();
        timer.start().unwrap();
        clock.advance_secs(1);

        assert_eq!(*log.borrow(), vec!["start", "00:00", "stop"]);
    }

    #[test]
    fn destroy_clears_listeners() {
        let clock = clock();
        let timer = timer(600, &clock);
        let log = Rc::new(RefCell::new(Vec::new()));
        record(&timer, &log);
        timer.ticker(|_| {}).unwrap();

        assert_eq!(timer.listener_count(EventKind::Tick), 2);
        assert_eq!(timer.listener_count(EventKind::Finish), 1);

        timer.start().unwrap();
        timer.destroy().unwrap();
        clock.advance_secs(3);

        assert_eq!(timer.listener_count(EventKind::Tick), 0);
        assert_eq!(timer.state(), TimerState::Destroyed);
        assert_eq!(*log.borrow(), vec!["start", "destroy"]);
        assert_eq!(clock.armed(), 0);
    }

    #[test]
    fn destroyed_timers_refuse_changes() {
        let clock = clock();
        let timer = timer(600, &clock);
        timer.destroy().unwrap();

        assert_eq!(timer.start(), Err(TimerError::Destroyed));
        assert_eq!(timer.pause(), Err(TimerError::Destroyed));
        assert_eq!(timer.stop(), Err(TimerError::Destroyed));
        assert_eq!(timer.destroy(), Err(TimerError::Destroyed));
        assert_eq!(timer.set_start_time(60), Err(TimerError::Destroyed));
        assert_eq!(timer.change_options(TimerOptions::new()), Err(TimerError::Destroyed));
        assert!(timer.ticker(|_| {}).is_err());
    }

    #[test]
    fn format_current_and_start_time() {
        let clock = clock();

        assert_eq!(timer(50, &clock).ft(), "00:50");
        assert_eq!(timer(600, &clock).ft(), "10:00");
        assert_eq!(timer(9600, &clock).ft(), "02:40:00");
        assert_eq!(
            timer(9600, &clock).format_time(TimeField::Start).formatted_time,
            "02:40:00"
        );

        let custom = Timer::new(600, TimerOptions::new().format_output("00:mm:ss"), clock.clone()).unwrap();
        assert_eq!(custom.format_time(TimeField::Start).formatted_time, "00:10:00");

        let literal = Timer::new(600, TimerOptions::new().format_output("boop"), clock.clone()).unwrap();
        assert_eq!(literal.ft(), "boop");
    }

    #[test]
    fn percent_done() {
        let clock = clock();
        let timer = timer(3, &clock);

        assert_eq!(timer.percent_done(), 0);

        timer.start().unwrap();
        clock.advance_secs(1);

        assert_eq!(timer.percent_done(), 33);
    }

    #[test]
    fn change_options_merges() {
        let clock = clock();
        let timer = Timer::new(600, TimerOptions::new().pad_raw(false), clock.clone()).unwrap();

        assert_eq!(timer.ft(), "10:00");
        assert_eq!(timer.raw().current_minutes.to_string(), "10");
        assert!(!timer.raw().current_minutes.is_padded());

        timer
            .change_options(TimerOptions::new().pad_raw(true).format_output("00-mm-ss"))
            .unwrap();

        assert_eq!(timer.ft(), "00-10-00");
        assert!(timer.raw().current_minutes.is_padded());
    }

    #[test]
    fn invalid_options_do_not_partially_apply() {
        let clock = clock();
        let timer = timer(600, &clock);

        let result = timer.change_options(TimerOptions::new().pad_raw(false).separator(""));

        assert!(matches!(result, Err(TimerError::InvalidOptionType { .. })));
        assert!(timer.options().pads_raw());
    }

    #[test]
    fn set_start_time_resets() {
        let clock = clock();
        let timer = timer(600, &clock);

        timer.start().unwrap();
        clock.advance_secs(1);

        assert_eq!(timer.set_start_time("11:00").unwrap(), "11:00");
        assert_eq!(timer.start_time(), 660);
        assert_eq!(timer.current_time(), 660);
        assert!(!timer.is_running());

        clock.advance_secs(2);
        assert_eq!(timer.current_time(), 660);
    }

    #[test]
    fn set_start_time_rejects_invalid_times() {
        let clock = clock();
        let timer = timer(600, &clock);
        timer.start().unwrap();
        clock.advance_secs(1);

        for bad in ["12-12", "invalid"] {
            assert!(matches!(
                timer.set_start_time(bad),
                Err(TimerError::InvalidTimeFormat(_))
            ));
        }

        assert_eq!(timer.start_time(), 600);
        assert_eq!(timer.current_time(), 599);
        assert!(timer.is_running());
    }

    #[test]
    fn set_start_time_to_zero_makes_a_stopwatch() {
        let clock = clock();
        let timer = timer(600, &clock);

        timer.set_start_time(TimeSpec::Unset).unwrap();
        timer.start().unwrap();
        clock.advance_secs(1);

        assert_eq!(timer.mode(), Mode::Stopwatch);
        assert_eq!(timer.ft(), "00:01");
    }

    #[test]
    fn deadline_is_resolved_again_on_start() {
        let clock = clock();
        let deadline = clock.now() + TimeDelta::new(600, 0).unwrap();
        let timer = timer(deadline, &clock);

        assert_eq!(timer.start_time(), 600);

        clock.advance_secs(100);
        timer.start().unwrap();
        assert_eq!(timer.start_time(), 500);

        clock.advance_secs(1);
        assert_eq!(timer.current_time(), 499);
    }

    #[test]
    fn deadline_with_delay_accounts_for_the_delay() {
        let clock = clock();
        let deadline = clock.now() + TimeDelta::new(600, 0).unwrap();
        let timer = timer(deadline, &clock);

        timer.start_after(Duration::from_secs(10)).unwrap();

        assert_eq!(timer.start_time(), 590);
    }

    #[test]
    fn deadline_with_an_endless_delay_fails() {
        let clock = clock();
        let deadline = clock.now() + TimeDelta::new(600, 0).unwrap();
        let timer = timer(deadline, &clock);

        assert!(matches!(
            timer.start_after(Duration::MAX),
            Err(TimerError::TimeExceedsMaximum(_))
        ));
        assert!(!timer.is_running());
        assert_eq!(clock.armed(), 0);
    }

    #[test]
    fn passed_deadline_refuses_to_start() {
        let clock = clock();
        let deadline = clock.now() + TimeDelta::new(5, 0).unwrap();
        let timer = timer(deadline, &clock);

        clock.advance_secs(10);

        assert!(matches!(timer.start(), Err(TimerError::NegativeTime(_))));
        assert!(!timer.is_running());
    }

    #[test]
    fn panicking_listener_does_not_break_the_timer() {
        let clock = clock();
        let timer = timer(2, &clock);
        let log = Rc::new(RefCell::new(Vec::new()));

        timer.ticker(|_| panic!("listener failure")).unwrap();
        record(&timer, &log);

        timer.start().unwrap();
        clock.advance_secs(2);

        assert_eq!(*log.borrow(), vec!["start", "00:01", "00:00", "stop", "finish"]);
    }
}
