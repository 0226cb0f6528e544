//! Interactive loop
//!
//! One thread owns the session. A reader thread forwards raw stdin chunks
//! over a channel; the loop waits on that channel with a timeout set to the
//! next tick or the pending-escape deadline, whichever comes first.

use anyhow::Result;
use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use stint_core::Config;
use tracing::debug;

use crate::input::{InputDecoder, Key, ESCAPE_TIMEOUT};
use crate::schedule::Scheduler;
use crate::session::{Session, SessionState};
use crate::store::{SessionStore, StoreError};
use crate::term::{self, TerminalGuard};

const CTRL_C: u8 = 0x03;

/// What a key asks the loop to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    TogglePause,
    Reset,
    Quit,
}

impl Action {
    pub fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::Byte(b' ' | b'p' | b'P') => Some(Action::TogglePause),
            Key::Byte(b'r' | b'R') => Some(Action::Reset),
            Key::Byte(b'q' | b'Q' | CTRL_C) | Key::Escape => Some(Action::Quit),
            _ => None,
        }
    }
}

/// Whether the loop keeps going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Session state plus everything the loop needs to drive it
pub struct App<'a> {
    session: Session,
    store: &'a SessionStore,
    decoder: InputDecoder,
    scheduler: Scheduler,
    last_tick: Instant,
    next_tick: Instant,
    escape_deadline: Option<Instant>,
}

impl<'a> App<'a> {
    pub fn new(session: Session, store: &'a SessionStore, config: &Config, now: Instant) -> Self {
        let scheduler = Scheduler::new(config.ticks, session.elapsed);
        let next_tick = now + scheduler.interval();
        Self {
            session,
            store,
            decoder: InputDecoder::new(),
            scheduler,
            last_tick: now,
            next_tick,
            escape_deadline: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current redraw interval
    pub fn tick_interval(&self) -> Duration {
        self.scheduler.interval()
    }

    /// When the loop next needs to wake up without input
    pub fn next_deadline(&self) -> Instant {
        match self.escape_deadline {
            Some(deadline) => deadline.min(self.next_tick),
            None => self.next_tick,
        }
    }

    /// Handle a chunk of raw input.
    ///
    /// A tick that fell due while input kept arriving runs here too, so a
    /// busy input stream cannot hold the clock back.
    pub fn on_input(&mut self, bytes: &[u8], now: Instant) -> Result<Flow, StoreError> {
        let keys = self.decoder.feed(bytes);
        self.escape_deadline = self.decoder.pending().then(|| now + ESCAPE_TIMEOUT);

        for key in keys {
            if self.on_key(key, now)? == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }

        if now >= self.next_tick {
            return Ok(self.on_tick(now));
        }
        Ok(Flow::Continue)
    }

    /// Handle a wake-up with no input: escape timeout and/or tick
    pub fn on_timeout(&mut self, now: Instant) -> Result<Flow, StoreError> {
        if self.escape_deadline.is_some_and(|deadline| now >= deadline) {
            self.escape_deadline = None;
            if let Some(key) = self.decoder.expire() {
                if self.on_key(key, now)? == Flow::Stop {
                    return Ok(Flow::Stop);
                }
            }
        }

        if now >= self.next_tick {
            return Ok(self.on_tick(now));
        }
        Ok(Flow::Continue)
    }

    pub fn on_key(&mut self, key: Key, now: Instant) -> Result<Flow, StoreError> {
        let Some(action) = Action::from_key(key) else {
            return Ok(Flow::Continue);
        };

        match action {
            Action::Quit => return Ok(self.stop(now)),
            Action::TogglePause => {
                if !self.session.paused {
                    self.advance_to(now);
                }
                match self.session.toggle_pause() {
                    Ok(SessionState::Paused) => self.store.write(&self.session)?,
                    Ok(_) => self.last_tick = now,
                    Err(e) => debug!("pause ignored: {}", e),
                }
            }
            Action::Reset => {
                self.session.reset();
                self.last_tick = now;
                self.scheduler.update(self.session.elapsed);
                self.next_tick = now + self.scheduler.interval();
            }
        }

        Ok(if self.session.finished {
            Flow::Stop
        } else {
            Flow::Continue
        })
    }

    /// Advance the session to `now` and schedule the next tick
    pub fn on_tick(&mut self, now: Instant) -> Flow {
        self.advance_to(now);
        self.scheduler.update(self.session.elapsed);
        self.next_tick = now + self.scheduler.interval();

        if self.session.finished {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    /// Account for time up to `now` and end the loop
    pub fn stop(&mut self, now: Instant) -> Flow {
        self.advance_to(now);
        Flow::Stop
    }

    fn advance_to(&mut self, now: Instant) {
        let delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.session.advance(delta);
    }

    /// Persist the session and hand it back
    pub fn finish(self) -> Result<Session, StoreError> {
        self.store.write(&self.session)?;
        Ok(self.session)
    }
}

/// Forward raw stdin reads of at most `chunk` bytes
fn spawn_reader(chunk: usize) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut stdin = io::stdin();
        let mut buf = vec![0u8; chunk];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("stdin reader stopped: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

fn drive(
    app: &mut App<'_>,
    input: &Receiver<Vec<u8>>,
    out: &mut impl Write,
    config: &Config,
) -> Result<()> {
    term::draw(out, app.session(), config)?;

    loop {
        let timeout = app.next_deadline().saturating_duration_since(Instant::now());
        let flow = match input.recv_timeout(timeout) {
            Ok(bytes) => app.on_input(&bytes, Instant::now())?,
            Err(RecvTimeoutError::Timeout) => app.on_timeout(Instant::now())?,
            Err(RecvTimeoutError::Disconnected) => app.stop(Instant::now()),
        };

        term::draw(out, app.session(), config)?;
        if flow == Flow::Stop {
            break;
        }
    }

    if app.session().finished {
        term::bell(out)?;
    }
    Ok(())
}

/// Run a session interactively until it finishes or the user quits.
///
/// The session is written to the store on the way out, also when the loop
/// ends with an error.
pub fn run(session: Session, store: &SessionStore, config: &Config) -> Result<Session> {
    let mut stdout = io::stdout();
    let guard = TerminalGuard::enter(&mut stdout, session.inline)?;
    let input = spawn_reader(config.key_buffer_size);

    let mut app = App::new(session, store, config, Instant::now());
    let outcome = drive(&mut app, &input, &mut stdout, config);
    drop(guard);

    conclude(app, outcome, Instant::now())
}

/// Write the session whatever the loop's outcome, then report that outcome
fn conclude(mut app: App<'_>, outcome: Result<()>, now: Instant) -> Result<Session> {
    if outcome.is_err() {
        app.stop(now);
    }
    let session = app.finish()?;
    outcome?;
    Ok(session)
}
