//! Event loop
//!
//! One `calloop` loop multiplexes the Wayland socket and the key repeat
//! timer. Each iteration flushes outgoing requests, then blocks until the
//! socket is readable or the armed timer expires.

use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};

use calloop::EventLoop;
use calloop_wayland_source::WaylandSource;
use log::{debug, info};
use wayland_client::backend::WaylandError;
use wayland_client::Connection;

use crate::config::MenuConfig;
use crate::error::{Result, RingError};
use crate::menu::MenuState;
use crate::protocol;
use crate::renderer::{FontDescriptor, Renderer, SoftwareRenderer};
use crate::session::{Outcome, Session};
use crate::surface;

/// Show `items` and block until the user picks one or cancels
pub fn run(config: MenuConfig, items: Vec<String>) -> Result<Outcome> {
    let menu = MenuState::new(items)?;
    let renderer = SoftwareRenderer::new(&FontDescriptor::parse(&config.font));
    run_with_renderer(config, menu, Box::new(renderer))
}

/// Like [`run`] with a caller supplied painter
pub fn run_with_renderer(
    config: MenuConfig,
    menu: MenuState,
    renderer: Box<dyn Renderer>,
) -> Result<Outcome> {
    let requested = renderer.metrics().menu_size(menu.items());

    let conn = protocol::connect()?;
    let mut queue = conn.new_event_queue();
    let qh = queue.handle();

    let mut event_loop: EventLoop<'static, Session> = EventLoop::try_new()?;
    let mut session = Session::new(
        conn.clone(),
        qh,
        event_loop.handle(),
        config,
        menu,
        renderer,
    );

    protocol::discover_and_bind(&mut session, &mut queue)?;

    let anchor = session.config.anchor.clone();
    let zone = session.config.exclusive_zone;
    surface::create_overlay(&mut session, &mut queue, &anchor, zone, requested)?;

    WaylandSource::new(conn.clone(), queue)
        .insert(event_loop.handle())
        .map_err(|err| RingError::EventLoop(err.error))?;

    info!("🚀 Menu running with {} items", session.menu().items().len());
    while session.is_running() {
        flush(&conn)?;
        event_loop.dispatch(None, &mut session)?;
        session.take_fatal()?;
    }

    // Send whatever the last callbacks queued before the connection closes
    if let Err(err) = flush(&conn) {
        debug!("Final flush failed: {}", err);
    }
    debug!("Event loop finished");
    Ok(session.into_outcome())
}

/// Flush queued requests. A full socket is waited on until the compositor
/// drained it, then the flush is retried.
fn flush(conn: &Connection) -> Result<()> {
    loop {
        match conn.flush() {
            Ok(()) => return Ok(()),
            Err(WaylandError::Io(err)) if err.kind() == io::ErrorKind::WouldBlock => {
                debug!("Socket full, waiting before the next flush");
                wait_writable(conn.backend().poll_fd())
                    .map_err(|err| RingError::Flush(WaylandError::Io(err)))?;
            }
            Err(err) => return Err(RingError::Flush(err)),
        }
    }
}

/// Block until `fd` accepts more data
fn wait_writable(fd: BorrowedFd<'_>) -> io::Result<()> {
    let mut pfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events: libc::POLLOUT,
        revents: 0,
    };
    loop {
        let rc = unsafe { libc::poll(&mut pfd, 1, -1) };
        if rc >= 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}
