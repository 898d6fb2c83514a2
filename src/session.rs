//! The session aggregate
//!
//! One [`Session`] is created per run and handed to every protocol callback
//! by the event queue. It owns the bound globals, the overlay, the keyboard
//! and the menu, and it records how the run ended.
//!
//! Key handling that does not need protocol objects lives on [`RunState`],
//! so the same code path is exercised with or without a compositor.

use std::time::Duration;

use calloop::LoopHandle;
use log::{error, info, warn};
use wayland_client::{Connection, QueueHandle};
use xkbcommon::xkb::Keysym;

use crate::config::MenuConfig;
use crate::error::{Result, RingError};
use crate::input::repeat::{RepeatState, TimerCommand};
use crate::input::{self, Keyboard};
use crate::menu::{MenuAction, MenuState};
use crate::protocol::Globals;
use crate::renderer::{FontDescriptor, Renderer};
use crate::surface::OverlaySurface;

/// How the menu was left
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The user confirmed this item
    Selected(String),
    /// The user cancelled, or the compositor closed the overlay
    Cancelled,
}

/// Whether the run goes on, and how it ended once it stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    running: bool,
    outcome: Outcome,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            running: true,
            outcome: Outcome::Cancelled,
        }
    }
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn into_outcome(self) -> Outcome {
        self.outcome
    }

    pub fn stop(&mut self, outcome: Outcome) {
        self.outcome = outcome;
        self.running = false;
    }

    /// Stop without touching the outcome
    pub fn halt(&mut self) {
        self.running = false;
    }

    /// Carry out a menu decision; returns whether the surface needs a repaint
    pub fn settle(&mut self, menu: &MenuState, action: MenuAction) -> bool {
        match action {
            MenuAction::None => false,
            MenuAction::Redraw => true,
            MenuAction::Select(index) => {
                info!("✅ Selected item {}", index);
                self.stop(Outcome::Selected(menu.items()[index].clone()));
                false
            }
            MenuAction::Quit => {
                info!("🚪 Menu cancelled");
                self.stop(Outcome::Cancelled);
                false
            }
        }
    }

    /// A translated key event. Returns the repaint flag and what the repeat
    /// timer has to do; nothing happens once the run stopped.
    pub fn key(
        &mut self,
        menu: &mut MenuState,
        repeat: &mut RepeatState,
        sym: Keysym,
        pressed: bool,
    ) -> (bool, TimerCommand) {
        if !self.running {
            return (false, TimerCommand::Keep);
        }
        let (action, command) = input::dispatch_key(menu, repeat, sym, pressed);
        (self.settle(menu, action), command)
    }

    /// The repeat timer expired. Returns the repaint flag and the delay until
    /// the next repeat, or `None` when repeating has to stop.
    pub fn repeat(
        &mut self,
        menu: &mut MenuState,
        repeat: &mut RepeatState,
    ) -> Option<(bool, Duration)> {
        if !self.running {
            return None;
        }
        let (action, period) = input::dispatch_repeat(menu, repeat)?;
        let redraw = self.settle(menu, action);
        self.running.then_some((redraw, period))
    }
}

pub struct Session {
    pub(crate) conn: Connection,
    pub(crate) qh: QueueHandle<Session>,
    pub(crate) loop_handle: LoopHandle<'static, Session>,
    pub(crate) globals: Globals,
    pub(crate) overlay: Option<OverlaySurface>,
    pub(crate) keyboard: Option<Keyboard>,
    pub(crate) menu: MenuState,
    pub(crate) config: MenuConfig,
    pub(crate) font: FontDescriptor,
    pub(crate) renderer: Box<dyn Renderer>,
    pub(crate) run: RunState,
    fatal: Option<RingError>,
}

impl Session {
    pub fn new(
        conn: Connection,
        qh: QueueHandle<Session>,
        loop_handle: LoopHandle<'static, Session>,
        config: MenuConfig,
        menu: MenuState,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        let font = FontDescriptor::parse(&config.font);
        Self {
            conn,
            qh,
            loop_handle,
            globals: Globals::default(),
            overlay: None,
            keyboard: None,
            menu,
            config,
            font,
            renderer,
            run: RunState::new(),
            fatal: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.run.is_running()
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn menu(&self) -> &MenuState {
        &self.menu
    }

    pub fn into_outcome(self) -> Outcome {
        self.run.into_outcome()
    }

    /// End the run normally
    pub(crate) fn stop(&mut self, outcome: Outcome) {
        self.run.stop(outcome);
    }

    /// End the run with an error; the first error wins
    pub(crate) fn fail(&mut self, err: RingError) {
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
        self.run.halt();
    }

    /// Surface an error recorded by a callback
    pub(crate) fn take_fatal(&mut self) -> Result<()> {
        match self.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Redraw after input: a frame that cannot be allocated is dropped,
    /// anything else ends the run
    pub(crate) fn repaint(&mut self) {
        if let Err(err) = self.redraw() {
            if err.skips_frame() {
                warn!("Skipping frame: {}", err);
            } else {
                error!("Redraw failed: {}", err);
                self.fail(err);
            }
        }
    }
}
