//! Display server connection and global discovery
//!
//! # Bootstrap order
//!
//! 1. Request the registry and bind every advertised global the menu needs
//!    as its `global` event arrives. The seat starts reporting its
//!    capabilities as soon as it is bound, which is how the keyboard gets
//!    attached (see [`crate::input`]).
//! 2. Roundtrip, so every bind has been processed before a handle is used,
//!    then compare what was bound against [`Capability::REQUIRED`].
//! 3. Create the data device for (seat, data-device manager) and roundtrip
//!    again before the overlay surface is created.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};
use wayland_client::protocol::wl_compositor::WlCompositor;
use wayland_client::protocol::wl_data_device::{self, WlDataDevice};
use wayland_client::protocol::wl_data_device_manager::WlDataDeviceManager;
use wayland_client::protocol::wl_data_offer::{self, WlDataOffer};
use wayland_client::protocol::wl_output::WlOutput;
use wayland_client::protocol::wl_registry::{self, WlRegistry};
use wayland_client::protocol::wl_seat::WlSeat;
use wayland_client::protocol::wl_shm::WlShm;
use wayland_client::{
    delegate_noop, event_created_child, Connection, Dispatch, EventQueue, Proxy, QueueHandle,
};
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_shell_v1::ZwlrLayerShellV1;

use crate::error::{Result, RingError};
use crate::session::Session;

/// A global the menu binds during discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Shm,
    Compositor,
    LayerShell,
    Output,
    Seat,
    DataDeviceManager,
}

impl Capability {
    pub const REQUIRED: [Capability; 6] = [
        Capability::Shm,
        Capability::Compositor,
        Capability::LayerShell,
        Capability::Output,
        Capability::Seat,
        Capability::DataDeviceManager,
    ];

    pub fn interface(self) -> &'static str {
        match self {
            Capability::Shm => WlShm::interface().name,
            Capability::Compositor => WlCompositor::interface().name,
            Capability::LayerShell => ZwlrLayerShellV1::interface().name,
            Capability::Output => WlOutput::interface().name,
            Capability::Seat => WlSeat::interface().name,
            Capability::DataDeviceManager => WlDataDeviceManager::interface().name,
        }
    }

    /// Highest version this client speaks
    pub fn max_version(self) -> u32 {
        match self {
            Capability::Shm | Capability::LayerShell => 1,
            Capability::Compositor | Capability::Output | Capability::Seat => 4,
            Capability::DataDeviceManager => 3,
        }
    }

    pub fn from_interface(interface: &str) -> Option<Self> {
        Self::REQUIRED
            .into_iter()
            .find(|capability| capability.interface() == interface)
    }
}

/// Result of binding one advertised global
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub capability: Capability,
    /// Registry name of the global
    pub name: u32,
    pub version: u32,
}

/// Interfaces in `REQUIRED` that are not in `bound`
pub fn missing_capabilities<'a, I>(bound: I) -> Vec<&'static str>
where
    I: IntoIterator<Item = &'a Capability>,
{
    let bound: BTreeSet<Capability> = bound.into_iter().copied().collect();
    let required: BTreeSet<Capability> = Capability::REQUIRED.into_iter().collect();
    required
        .difference(&bound)
        .map(|capability| capability.interface())
        .collect()
}

/// Everything bound from the registry
#[derive(Debug, Default)]
pub struct Globals {
    bindings: BTreeMap<Capability, Binding>,
    registry: Option<WlRegistry>,
    pub(crate) shm: Option<WlShm>,
    pub(crate) compositor: Option<WlCompositor>,
    pub(crate) layer_shell: Option<ZwlrLayerShellV1>,
    pub(crate) output: Option<WlOutput>,
    pub(crate) seat: Option<WlSeat>,
    pub(crate) data_device_manager: Option<WlDataDeviceManager>,
    pub(crate) data_device: Option<WlDataDevice>,
    selection: Option<WlDataOffer>,
}

impl Globals {
    pub fn binding(&self, capability: Capability) -> Option<&Binding> {
        self.bindings.get(&capability)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.values()
    }

    pub fn missing(&self) -> Vec<&'static str> {
        missing_capabilities(self.bindings.keys())
    }

    fn bind(
        &mut self,
        registry: &WlRegistry,
        binding: Binding,
        qh: &QueueHandle<Session>,
    ) {
        let Binding { name, version, .. } = binding;
        match binding.capability {
            Capability::Shm => self.shm = Some(registry.bind(name, version, qh, ())),
            Capability::Compositor => self.compositor = Some(registry.bind(name, version, qh, ())),
            Capability::LayerShell => self.layer_shell = Some(registry.bind(name, version, qh, ())),
            Capability::Output => self.output = Some(registry.bind(name, version, qh, ())),
            Capability::Seat => self.seat = Some(registry.bind(name, version, qh, ())),
            Capability::DataDeviceManager => {
                self.data_device_manager = Some(registry.bind(name, version, qh, ()))
            }
        }
        self.bindings.insert(binding.capability, binding);
    }

    fn bind_data_device(&mut self, qh: &QueueHandle<Session>) {
        if let (Some(manager), Some(seat)) = (&self.data_device_manager, &self.seat) {
            self.data_device = Some(manager.get_data_device(seat, qh, ()));
        }
    }

    fn set_selection(&mut self, offer: Option<WlDataOffer>) {
        if let Some(previous) = std::mem::replace(&mut self.selection, offer) {
            previous.destroy();
        }
    }
}

/// Connect to the compositor named by `WAYLAND_DISPLAY`
pub fn connect() -> Result<Connection> {
    let conn = Connection::connect_to_env()?;
    info!("🔌 Connected to the Wayland display");
    Ok(conn)
}

/// Bind every required global and settle the binds with roundtrips
pub fn discover_and_bind(session: &mut Session, queue: &mut EventQueue<Session>) -> Result<()> {
    let registry = session.conn.display().get_registry(&session.qh, ());
    session.globals.registry = Some(registry);

    queue.roundtrip(session)?;
    session.take_fatal()?;

    let missing = session.globals.missing();
    if !missing.is_empty() {
        return Err(RingError::MissingCapabilities(missing));
    }
    for binding in session.globals.bindings() {
        debug!(
            "Bound {} v{} (global {})",
            binding.capability.interface(),
            binding.version,
            binding.name
        );
    }

    session.globals.bind_data_device(&session.qh);
    queue.roundtrip(session)?;
    session.take_fatal()?;

    info!("📋 Bound {} globals", session.globals.bindings.len());
    Ok(())
}

impl Dispatch<WlRegistry, ()> for Session {
    fn event(
        session: &mut Self,
        registry: &WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                let Some(capability) = Capability::from_interface(&interface) else {
                    return;
                };
                if session.globals.binding(capability).is_some() {
                    debug!("Ignoring additional {} global {}", interface, name);
                    return;
                }
                let binding = Binding {
                    capability,
                    name,
                    version: version.min(capability.max_version()),
                };
                session.globals.bind(registry, binding, qh);
            }
            wl_registry::Event::GlobalRemove { name } => {
                if let Some(binding) = session.globals.bindings().find(|b| b.name == name) {
                    warn!("Compositor removed bound global {}", binding.capability.interface());
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<WlDataDevice, ()> for Session {
    fn event(
        session: &mut Self,
        _device: &WlDataDevice,
        event: wl_data_device::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_data_device::Event::DataOffer { id } => debug!("New data offer {}", id.id()),
            wl_data_device::Event::Selection { id } => session.globals.set_selection(id),
            // Drag and drop is not supported
            wl_data_device::Event::Enter { id: Some(offer), .. } => offer.destroy(),
            _ => {}
        }
    }

    event_created_child!(Session, WlDataDevice, [
        wl_data_device::EVT_DATA_OFFER_OPCODE => (WlDataOffer, ()),
    ]);
}

impl Dispatch<WlDataOffer, ()> for Session {
    fn event(
        _session: &mut Self,
        offer: &WlDataOffer,
        event: wl_data_offer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_data_offer::Event::Offer { mime_type } = event {
            debug!("Data offer {} provides {}", offer.id(), mime_type);
        }
    }
}

delegate_noop!(Session: ignore WlShm);
delegate_noop!(Session: ignore WlCompositor);
delegate_noop!(Session: ignore WlOutput);
delegate_noop!(Session: ignore WlDataDeviceManager);
delegate_noop!(Session: ignore ZwlrLayerShellV1);
