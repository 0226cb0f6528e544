//! stint - Terminal timer and stopwatch with resumable named sessions
//!
//! "Know where the minutes went."
//!
//! A session is either a countdown timer or a count-up counter. Sessions
//! are named, live in a per-directory store, and can be paused, reset and
//! resumed across runs:
//! - Countdown timers that finish, ring and stay finished
//! - Open-ended counters
//! - Adaptive redraw rate as elapsed time grows
//! - Raw keyboard input with escape-sequence and mouse-report handling
//!
//! Commands:
//! - timer DURATION: Count down from DURATION
//! - counter: Count up from zero
//! - resume [NAME]: Continue a stored session
//! - status [NAME] / list / rm NAME: Inspect and manage the store

pub mod app;
pub mod input;
pub mod schedule;
pub mod session;
pub mod store;
pub mod term;

pub use input::{InputDecoder, Key};
pub use schedule::{Scheduler, Tier};
pub use session::{Mode, Session, SessionState};
pub use store::{SessionStore, StoreError};
