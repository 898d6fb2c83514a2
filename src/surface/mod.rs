//! Overlay surface and buffer manager
//!
//! The overlay goes through `Created -> AwaitingConfigure -> Configured`
//! before anything is drawn. Every configure is acknowledged before the
//! buffer it triggers is attached. Buffers are single use: each frame gets
//! a fresh shared region, the region is unmapped once the buffer exists,
//! and the `wl_buffer` is destroyed when the compositor releases it.

use std::os::fd::AsFd;

use log::{debug, error, info};
use wayland_client::protocol::wl_buffer::{self, WlBuffer};
use wayland_client::protocol::wl_shm::{self, WlShm};
use wayland_client::protocol::wl_shm_pool::WlShmPool;
use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::{delegate_noop, Connection, Dispatch, EventQueue, Proxy, QueueHandle};
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_shell_v1::Layer;
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_surface_v1::{
    self, Anchor, KeyboardInteractivity, ZwlrLayerSurfaceV1,
};

use crate::config::AnchorEdge;
use crate::error::{Result, RingError};
use crate::protocol::Capability;
use crate::renderer::Frame;
use crate::session::{Outcome, Session};
use crate::shm::{BufferId, BufferLedger, ShmRegion, BYTES_PER_PIXEL};

/// First `wl_surface` version with `damage_buffer`
const DAMAGE_BUFFER_VERSION: u32 = 4;

pub fn anchor_bits(edges: &[AnchorEdge]) -> Anchor {
    edges.iter().fold(Anchor::empty(), |bits, edge| {
        bits | match edge {
            AnchorEdge::Top => Anchor::Top,
            AnchorEdge::Bottom => Anchor::Bottom,
            AnchorEdge::Left => Anchor::Left,
            AnchorEdge::Right => Anchor::Right,
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfacePhase {
    Created,
    AwaitingConfigure,
    Configured,
    /// The newest buffer is held by the server
    Attached,
    /// Older buffers are still waiting for their release
    PendingRelease,
    Destroyed,
}

/// What a configure event changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureEvent {
    pub serial: u32,
    pub width: u32,
    pub height: u32,
    /// This was the first configure of the surface
    pub first: bool,
}

/// Size negotiation and buffer bookkeeping, independent of protocol objects
#[derive(Debug)]
pub struct SurfaceLifecycle<B> {
    requested: (u32, u32),
    size: (u32, u32),
    committed: bool,
    last_serial: Option<u32>,
    destroyed: bool,
    ledger: BufferLedger<B>,
}

impl<B> SurfaceLifecycle<B> {
    pub fn new(requested: (u32, u32)) -> Self {
        Self {
            requested,
            size: requested,
            committed: false,
            last_serial: None,
            destroyed: false,
            ledger: BufferLedger::new(),
        }
    }

    pub fn phase(&self) -> SurfacePhase {
        if self.destroyed {
            SurfacePhase::Destroyed
        } else if !self.committed {
            SurfacePhase::Created
        } else if self.last_serial.is_none() {
            SurfacePhase::AwaitingConfigure
        } else if self.ledger.pending_release() > 0 {
            SurfacePhase::PendingRelease
        } else if self.ledger.outstanding() > 0 {
            SurfacePhase::Attached
        } else {
            SurfacePhase::Configured
        }
    }

    pub fn requested_size(&self) -> (u32, u32) {
        self.requested
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn last_serial(&self) -> Option<u32> {
        self.last_serial
    }

    /// The initial bufferless commit went out
    pub fn mark_committed(&mut self) {
        self.committed = true;
    }

    /// Record a configure; a zero dimension keeps the requested one
    pub fn configure(&mut self, serial: u32, width: u32, height: u32) -> ConfigureEvent {
        let first = self.last_serial.is_none();
        let width = if width == 0 { self.requested.0 } else { width };
        let height = if height == 0 { self.requested.1 } else { height };

        self.size = (width, height);
        self.last_serial = Some(serial);
        ConfigureEvent {
            serial,
            width,
            height,
            first,
        }
    }

    pub fn can_draw(&self) -> bool {
        !self.destroyed && self.last_serial.is_some()
    }

    /// Id for the next frame's buffer
    pub fn reserve_buffer(&mut self) -> Result<BufferId> {
        if self.destroyed {
            return Err(RingError::SurfaceClosed);
        }
        if self.last_serial.is_none() {
            return Err(RingError::NotConfigured);
        }
        Ok(self.ledger.reserve())
    }

    pub fn attached(&mut self, id: BufferId, buffer: B) {
        self.ledger.attach(id, buffer);
    }

    pub fn release(&mut self, id: BufferId) -> Option<B> {
        self.ledger.release(id)
    }

    pub fn is_outstanding(&self, id: BufferId) -> bool {
        self.ledger.is_outstanding(id)
    }

    pub fn outstanding(&self) -> usize {
        self.ledger.outstanding()
    }

    /// Returns every buffer the server still held
    pub fn destroy(&mut self) -> Vec<B> {
        self.destroyed = true;
        self.ledger.drain().collect()
    }
}

/// The drawable surface with its layer-shell role
#[derive(Debug)]
pub struct OverlaySurface {
    surface: WlSurface,
    layer: ZwlrLayerSurfaceV1,
    lifecycle: SurfaceLifecycle<WlBuffer>,
}

impl OverlaySurface {
    pub fn lifecycle(&self) -> &SurfaceLifecycle<WlBuffer> {
        &self.lifecycle
    }

    pub fn phase(&self) -> SurfacePhase {
        self.lifecycle.phase()
    }

    pub fn size(&self) -> (u32, u32) {
        self.lifecycle.size()
    }

    fn destroy(&mut self) {
        for buffer in self.lifecycle.destroy() {
            buffer.destroy();
        }
        self.layer.destroy();
        self.surface.destroy();
    }
}

fn required<T: Clone>(handle: &Option<T>, capability: Capability) -> Result<T> {
    handle
        .clone()
        .ok_or_else(|| RingError::MissingCapabilities(vec![capability.interface()]))
}

/// Create the overlay and block until its first configure has been handled
pub fn create_overlay(
    session: &mut Session,
    queue: &mut EventQueue<Session>,
    anchor: &[AnchorEdge],
    exclusive_zone: i32,
    requested: (u32, u32),
) -> Result<()> {
    let compositor = required(&session.globals.compositor, Capability::Compositor)?;
    let layer_shell = required(&session.globals.layer_shell, Capability::LayerShell)?;
    let output = required(&session.globals.output, Capability::Output)?;

    let qh = session.qh.clone();
    let surface = compositor.create_surface(&qh, ());
    let layer = layer_shell.get_layer_surface(
        &surface,
        Some(&output),
        Layer::Overlay,
        session.config.namespace.clone(),
        &qh,
        (),
    );
    layer.set_size(requested.0, requested.1);
    layer.set_anchor(anchor_bits(anchor));
    layer.set_exclusive_zone(exclusive_zone);
    layer.set_keyboard_interactivity(KeyboardInteractivity::Exclusive);
    surface.commit();

    let mut lifecycle = SurfaceLifecycle::new(requested);
    lifecycle.mark_committed();
    session.overlay = Some(OverlaySurface {
        surface,
        layer,
        lifecycle,
    });
    info!(
        "🪟 Overlay requested at {}x{}, waiting for configure",
        requested.0, requested.1
    );

    while session.is_running() && !session.overlay_configured() {
        queue.blocking_dispatch(session)?;
    }
    session.take_fatal()
}

impl Session {
    pub fn overlay(&self) -> Option<&OverlaySurface> {
        self.overlay.as_ref()
    }

    fn overlay_configured(&self) -> bool {
        self.overlay
            .as_ref()
            .is_some_and(|overlay| overlay.lifecycle.can_draw())
    }

    /// Paint the current menu state into a fresh buffer and commit it
    pub(crate) fn redraw(&mut self) -> Result<()> {
        let overlay = self.overlay.as_mut().ok_or(RingError::NotConfigured)?;
        let shm: &WlShm = self
            .globals
            .shm
            .as_ref()
            .ok_or_else(|| RingError::MissingCapabilities(vec![Capability::Shm.interface()]))?;

        let id = overlay.lifecycle.reserve_buffer()?;
        let (width, height) = overlay.lifecycle.size();
        let (mut region, stride) =
            ShmRegion::for_frame(width, height).map_err(|source| RingError::Allocation {
                size: width as usize * height as usize * BYTES_PER_PIXEL as usize,
                source,
            })?;

        let frame = Frame {
            width,
            height,
            stride,
            items: self.menu.items(),
            selected: self.menu.selected(),
            colors: &self.config.colors,
            font: &self.font,
        };
        self.renderer.render(region.pixels_mut(), &frame);

        let pool = shm.create_pool(region.as_fd(), region.len() as i32, &self.qh, ());
        let buffer = pool.create_buffer(
            0,
            width as i32,
            height as i32,
            stride as i32,
            wl_shm::Format::Argb8888,
            &self.qh,
            id,
        );
        pool.destroy();
        // The server maps its own view through the pool
        drop(region);

        let surface = &overlay.surface;
        surface.attach(Some(&buffer), 0, 0);
        if surface.version() >= DAMAGE_BUFFER_VERSION {
            surface.damage_buffer(0, 0, width as i32, height as i32);
        } else {
            surface.damage(0, 0, width as i32, height as i32);
        }
        surface.commit();
        overlay.lifecycle.attached(id, buffer);

        debug!("Committed {:?} at {}x{}", id, width, height);
        Ok(())
    }

    pub(crate) fn on_configure(&mut self, serial: u32, width: u32, height: u32) {
        let Some(overlay) = self.overlay.as_mut() else {
            return;
        };
        // Acknowledge before the attach below is queued
        overlay.layer.ack_configure(serial);
        let event = overlay.lifecycle.configure(serial, width, height);
        debug!(
            "Configure {}: {}x{} (server sent {}x{})",
            serial, event.width, event.height, width, height
        );

        if !event.first {
            self.repaint();
        } else if let Err(err) = self.redraw() {
            error!("Initial frame failed: {}", err);
            self.fail(err);
        }
    }

    pub(crate) fn on_overlay_closed(&mut self) {
        info!("🚪 Overlay closed by the compositor");
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.destroy();
        }
        self.stop(Outcome::Cancelled);
    }

    pub(crate) fn on_buffer_release(&mut self, id: BufferId, buffer: &WlBuffer) {
        let released = self
            .overlay
            .as_mut()
            .and_then(|overlay| overlay.lifecycle.release(id));
        match released {
            Some(buffer) => buffer.destroy(),
            None => {
                debug!("Release for untracked {:?}", id);
                buffer.destroy();
            }
        }
    }
}

impl Dispatch<ZwlrLayerSurfaceV1, ()> for Session {
    fn event(
        session: &mut Self,
        _layer: &ZwlrLayerSurfaceV1,
        event: zwlr_layer_surface_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_layer_surface_v1::Event::Configure {
                serial,
                width,
                height,
            } => session.on_configure(serial, width, height),
            zwlr_layer_surface_v1::Event::Closed => session.on_overlay_closed(),
            _ => {}
        }
    }
}

impl Dispatch<WlBuffer, BufferId> for Session {
    fn event(
        session: &mut Self,
        buffer: &WlBuffer,
        event: wl_buffer::Event,
        id: &BufferId,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            session.on_buffer_release(*id, buffer);
        }
    }
}

delegate_noop!(Session: ignore WlSurface);
delegate_noop!(Session: ignore WlShmPool);
