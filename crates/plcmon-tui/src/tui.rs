//! Owns the terminal while the monitor screen is up.
//!
//! Raw mode and the alternate screen are switched on by [`Tui::enter`] and
//! switched back off exactly once, by [`Tui::exit`], on drop, or from the
//! panic hook.

use std::io::{Stdout, stdout};

use color_eyre::eyre::Result;
use crossterm::{
    ExecutableCommand, cursor,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{Frame, Terminal, backend::CrosstermBackend};

pub type Backend = CrosstermBackend<Stdout>;

pub struct Tui {
    terminal: Terminal<Backend>,
    active: bool,
}

impl Tui {
    /// Take over stdout and clear it for the first frame.
    pub fn enter() -> Result<Self> {
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
        terminal::enable_raw_mode()?;
        let mut out = stdout();
        out.execute(EnterAlternateScreen)?;
        out.execute(cursor::Hide)?;
        terminal.clear()?;
        Ok(Self {
            terminal,
            active: true,
        })
    }

    /// Hand the terminal back to the shell. Calling it twice is harmless.
    pub fn exit(&mut self) {
        if std::mem::take(&mut self.active) {
            restore();
        }
    }

    pub fn draw(&mut self, render: impl FnOnce(&mut Frame)) -> Result<()> {
        self.terminal.draw(render)?;
        Ok(())
    }

    /// Current (columns, rows).
    pub fn size(&self) -> Result<(u16, u16)> {
        let area = self.terminal.size()?;
        Ok((area.width, area.height))
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        self.exit();
    }
}

// Errors are dropped here: this also runs from the panic hook, where there
// is nobody left to report them to.
fn restore() {
    let mut out = stdout();
    let _ = out.execute(cursor::Show);
    let _ = out.execute(LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();
}

/// Route panics and eyre reports through [`restore`] so they print onto the
/// normal screen. Install before [`Tui::enter`].
pub fn install_hooks() -> Result<()> {
    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default()
        .display_env_section(false)
        .into_hooks();
    eyre_hook.install()?;

    let panic_hook = panic_hook.into_panic_hook();
    std::panic::set_hook(Box::new(move |info| {
        restore();
        panic_hook(info);
    }));
    Ok(())
}
