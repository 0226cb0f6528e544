//! Terminal handling and text rendering
//!
//! Raw mode is held by [`TerminalGuard`] for the life of the interactive
//! loop. Rendering is plain text: inline sessions redraw a single line,
//! full-screen sessions center the clock where the digit glyph block would
//! sit.

use crossterm::{
    cursor,
    event::{DisableMouseCapture, EnableMouseCapture},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, Write};
use std::time::Duration;
use stint_core::config::{Glyph, TermSize};
use stint_core::format::clock;
use stint_core::Config;

use crate::session::{Mode, Session, SessionState};

const HINT: &str = "space pause  r reset  q quit";

/// Characters in a rendered clock (`MM:SS.t`)
const CLOCK_CHARS: u16 = 7;

/// Puts the terminal in raw mode and restores it on drop
pub struct TerminalGuard {
    inline: bool,
}

impl TerminalGuard {
    pub fn enter(out: &mut impl Write, inline: bool) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        if inline {
            execute!(out, cursor::Hide)?;
        } else {
            execute!(out, EnterAlternateScreen, EnableMouseCapture, cursor::Hide)?;
        }
        Ok(Self { inline })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = terminal::disable_raw_mode();
        if self.inline {
            let _ = execute!(stdout, cursor::Show, Print("\r\n"));
        } else {
            let _ = execute!(stdout, DisableMouseCapture, LeaveAlternateScreen, cursor::Show);
        }
    }
}

/// How the status should be highlighted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Normal,
    Paused,
    Warning,
    Done,
}

impl Tone {
    fn color(self) -> Color {
        match self {
            Tone::Normal => Color::Reset,
            Tone::Paused => Color::DarkGrey,
            Tone::Warning => Color::Yellow,
            Tone::Done => Color::Green,
        }
    }
}

/// Text and tone for the session's current state
pub fn status_line(session: &Session, warning_threshold: Duration) -> (String, Tone) {
    let time = clock(session.display_elapsed());
    let label = match session.mode {
        Mode::Timer => format!("{} left", time),
        Mode::Counter => time,
    };
    let line = format!("{}  {}", session.key(), label);

    match session.state() {
        SessionState::Finished => (format!("{}  done", line), Tone::Done),
        SessionState::Paused => (format!("{}  [paused]", line), Tone::Paused),
        SessionState::Running if session.is_ending_soon(warning_threshold) => (line, Tone::Warning),
        SessionState::Running => (line, Tone::Normal),
    }
}

/// Screen positions for full-screen rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub clock: (u16, u16),
    pub hint: (u16, u16),
}

/// Center a clock block of `CLOCK_CHARS` glyphs in the terminal.
///
/// The status text goes on the middle row of the block and the key hint
/// on the row below it.
pub fn layout(term: TermSize, glyph: Glyph, text_width: u16) -> Layout {
    let block_height = glyph.height;
    let top = term.height.saturating_sub(block_height) / 2;
    let middle = (top + block_height / 2).min(term.height.saturating_sub(1));

    let center = |width: u16| term.width.saturating_sub(width) / 2;
    let hint_row = (top + block_height).min(term.height.saturating_sub(1));

    Layout {
        clock: (center(text_width), middle),
        hint: (center(HINT.len() as u16), hint_row.max(middle + 1)),
    }
}

/// Width in cells of the big-digit clock block.
///
/// [`draw`] leaves out the key hint when a block this wide would not fit
/// the terminal.
pub fn block_width(glyph: Glyph) -> u16 {
    (CLOCK_CHARS * (glyph.width + glyph.spacing)).saturating_sub(glyph.spacing)
}

fn term_size(fallback: TermSize) -> TermSize {
    match terminal::size() {
        Ok((width, height)) if width > 0 && height > 0 => TermSize { width, height },
        _ => fallback,
    }
}

/// Draw the session
pub fn draw(out: &mut impl Write, session: &Session, config: &Config) -> io::Result<()> {
    let (text, tone) = status_line(session, config.warning_threshold);

    if session.inline {
        queue!(
            out,
            cursor::MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            SetForegroundColor(tone.color()),
            Print(&text),
            ResetColor
        )?;
    } else {
        let term = term_size(config.term);
        let at = layout(term, config.glyph, text.chars().count() as u16);
        queue!(
            out,
            Clear(ClearType::All),
            cursor::MoveTo(at.clock.0, at.clock.1),
            SetForegroundColor(tone.color()),
            Print(&text),
            ResetColor
        )?;
        if block_width(config.glyph) <= term.width {
            queue!(out, cursor::MoveTo(at.hint.0, at.hint.1), Print(HINT))?;
        }
    }

    out.flush()
}

/// Ring the terminal bell
pub fn bell(out: &mut impl Write) -> io::Result<()> {
    queue!(out, Print("\x07"))?;
    out.flush()
}
