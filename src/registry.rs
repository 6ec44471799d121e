//! A shared collection of timers that can be driven together

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use log::{debug, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Result, TimerError};
use crate::options::TimerOptions;
use crate::time::TimeSpec;
use crate::timer::Timer;

struct RegistryInner {
    timers: RefCell<Vec<Timer>>,
    clock: Rc<dyn Clock>,
    store_by_default: Cell<bool>,
    defaults: TimerOptions,
}

/// An ordered set of timers with bulk start/pause/stop/destroy
///
/// A registry also acts as a timer factory: [`create`](Self::create) builds
/// timers on the registry's clock with its default options, and adds them
/// to the registry when they opt in through
/// [`TimerOptions::store`](crate::TimerOptions::store), or when they don't
/// say and the registry stores by default.
///
/// Destroying a timer removes it from its registry. Bulk operations work on
/// a snapshot, so timers destroyed or added by listeners along the way are
/// neither skipped nor visited twice.
///
/// ```
/// use std::rc::Rc;
/// use tickr::{ManualClock, Registry, TimerOptions};
///
/// let clock = Rc::new(ManualClock::new());
/// let registry = Registry::new(clock.clone());
///
/// registry.create(60, TimerOptions::new().store(true))?;
/// registry.create("2:00", TimerOptions::new().store(true))?;
/// registry.start_all()?;
/// clock.advance_secs(1);
///
/// let times: Vec<String> = registry.all().iter().map(|timer| timer.ft()).collect();
/// assert_eq!(times, ["00:59", "01:59"]);
/// # Ok::<(), tickr::TimerError>(())
/// ```
#[derive(Clone)]
pub struct Registry {
    inner: Rc<RegistryInner>,
}

impl Registry {
    /// Create an empty registry that does not store timers by default
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self::with_defaults(clock, false, TimerOptions::default())
    }

    /// Create an empty registry using the defaults from a config file
    pub fn from_config(config: &Config, clock: Rc<dyn Clock>) -> Self {
        Self::with_defaults(clock, config.store, config.options.clone())
    }

    fn with_defaults(clock: Rc<dyn Clock>, store_by_default: bool, defaults: TimerOptions) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                timers: RefCell::new(Vec::new()),
                clock,
                store_by_default: Cell::new(store_by_default),
                defaults,
            }),
        }
    }

    /// Build a timer on this registry's clock
    ///
    /// `options` are layered over the registry defaults. The timer joins the
    /// registry if the merged `store` option says so, falling back to
    /// [`store_by_default`](Self::store_by_default).
    pub fn create(&self, start_time: impl Into<TimeSpec>, options: TimerOptions) -> Result<Timer> {
        let options = self.inner.defaults.merge(&options);
        let store = options.store.unwrap_or_else(|| self.store_by_default());
        let timer = Timer::new(start_time, options, self.inner.clock.clone())?;

        if store {
            self.add(&timer)?;
        }

        Ok(timer)
    }

    /// Add a timer, unless it is already here
    pub fn add(&self, timer: &Timer) -> Result<()> {
        if timer.is_destroyed() {
            return Err(TimerError::Destroyed);
        }

        if self.contains(timer) {
            return Ok(());
        }

        timer.join_registry(self.downgrade());
        self.inner.timers.borrow_mut().push(timer.clone());

        debug!("Added timer to registry, now holding {}", self.len());

        Ok(())
    }

    /// Drop a timer from the registry without touching it otherwise
    ///
    /// Returns whether the timer was in the registry.
    pub fn remove(&self, timer: &Timer) -> bool {
        let removed = {
            let mut timers = self.inner.timers.borrow_mut();
            let before = timers.len();
            timers.retain(|stored| stored != timer);
            timers.len() != before
        };

        if removed {
            timer.leave_registry();
        }

        removed
    }

    /// Every timer in the registry, in the order they were added
    pub fn all(&self) -> Vec<Timer> {
        self.inner.timers.borrow().clone()
    }

    /// The timers that are currently running
    pub fn running(&self) -> Vec<Timer> {
        self.all().into_iter().filter(Timer::is_running).collect()
    }

    pub fn contains(&self, timer: &Timer) -> bool {
        self.inner.timers.borrow().contains(timer)
    }

    pub fn len(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.timers.borrow().is_empty()
    }

    pub fn start_all(&self) -> Result<()> {
        self.for_each("start", Timer::start)
    }

    pub fn pause_all(&self) -> Result<()> {
        self.for_each("pause", Timer::pause)
    }

    pub fn stop_all(&self) -> Result<()> {
        self.for_each("stop", Timer::stop)
    }

    /// Destroy every timer and empty the registry
    pub fn destroy_all(&self) -> Result<()> {
        let result = self.for_each("destroy", Timer::destroy);

        for timer in self.inner.timers.take() {
            timer.leave_registry();
        }

        result
    }

    /// Whether timers join this registry when their options don't say
    pub fn store_by_default(&self) -> bool {
        self.inner.store_by_default.get()
    }

    pub fn set_store_by_default(&self, store: bool) {
        self.inner.store_by_default.set(store);
    }

    /// The clock timers created here tick on
    pub fn clock(&self) -> Rc<dyn Clock> {
        self.inner.clock.clone()
    }

    /// Apply `op` to a snapshot of the timers, skipping any destroyed along the way
    ///
    /// Every timer is visited even if some fail; the first error is returned.
    fn for_each<F>(&self, name: &str, op: F) -> Result<()>
    where
        F: Fn(&Timer) -> Result<()>,
    {
        let mut first_error = None;

        for timer in self.all() {
            if timer.is_destroyed() {
                continue;
            }

            if let Err(e) = op(&timer) {
                warn!("Failed to {} timer {:?}: {}", name, timer, e);
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Rc::downgrade(&self.inner))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("timers", &self.inner.timers.borrow())
            .field("store_by_default", &self.store_by_default())
            .finish()
    }
}

/// A registry reference that does not keep the registry alive
#[derive(Clone)]
pub(crate) struct WeakRegistry(Weak<RegistryInner>);

impl WeakRegistry {
    pub(crate) fn upgrade(&self) -> Option<Registry> {
        self.0.upgrade().map(|inner| Registry { inner })
    }
}
