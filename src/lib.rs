//! Countdown and stopwatch timers
//!
//! A [`Timer`] is built from a start time and ticks once a second on a
//! [`Clock`], publishing every tick to its listeners along with the time
//! formatted for display. Timers that start above zero count down and
//! finish at zero; timers that start at zero count up like a stopwatch.
//!
//! ```
//! use std::{cell::RefCell, rc::Rc};
//! use tickr::{ManualClock, Timer, TimerOptions};
//!
//! let clock = Rc::new(ManualClock::new());
//! let timer = Timer::new("00:03", TimerOptions::new(), clock.clone())?;
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! let ticks = seen.clone();
//! timer.ticker(move |tick| ticks.borrow_mut().push(tick.formatted_time.clone()))?;
//! timer.start()?;
//! clock.advance_secs(3);
//!
//! assert_eq!(*seen.borrow(), ["00:02", "00:01", "00:00"]);
//! # Ok::<(), tickr::TimerError>(())
//! ```
//!
//! Many timers can be controlled at once through a [`Registry`], whose
//! defaults can come from a [`Config`] file.

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod options;
pub mod registry;
pub mod time;
pub mod timer;

pub use clock::{Clock, LoopClock, ManualClock, TickHandle};
pub use config::Config;
pub use error::TimerError;
pub use events::EventNotifier;
pub use format::{format_time, zero_pad, FormattedTime, Raw, Unit};
pub use options::TimerOptions;
pub use registry::Registry;
pub use time::{is_incorrect_format, parse_time, time_to_seconds, ParsedTime, TimeSpec, MAX_SECONDS};
pub use timer::{Event, EventKind, Mode, Tick, TimeField, Timer, TimerState, STOPWATCH_LIMIT};
