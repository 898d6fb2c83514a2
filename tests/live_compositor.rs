// Bootstrap tests against a running compositor
//
// Needs a wlroots-based compositor in WAYLAND_DISPLAY:
//     cargo test --features live-compositor --test live_compositor

#![cfg(feature = "live-compositor")]

use calloop::EventLoop;
use ring_menu::protocol::{self, Capability};
use ring_menu::renderer::{FontDescriptor, SoftwareRenderer};
use ring_menu::surface::{self, SurfacePhase};
use ring_menu::{MenuConfig, MenuState, Session};

#[test]
fn test_discovery_binds_every_required_global() {
    let conn = protocol::connect().unwrap();
    let mut queue = conn.new_event_queue();
    let event_loop: EventLoop<'static, Session> = EventLoop::try_new().unwrap();

    let config = MenuConfig::default();
    let menu = MenuState::new(vec!["one".to_string(), "two".to_string()]).unwrap();
    let renderer = SoftwareRenderer::new(&FontDescriptor::parse(&config.font));
    let mut session = Session::new(
        conn.clone(),
        queue.handle(),
        event_loop.handle(),
        config,
        menu,
        Box::new(renderer),
    );

    protocol::discover_and_bind(&mut session, &mut queue).unwrap();
    for capability in Capability::REQUIRED {
        let binding = session.globals().binding(capability).unwrap();
        assert!(binding.version >= 1);
        assert!(binding.version <= capability.max_version());
    }

    surface::create_overlay(&mut session, &mut queue, &[], -1, (64, 30)).unwrap();
    let overlay = session.overlay().unwrap();
    assert!(matches!(
        overlay.phase(),
        SurfacePhase::Attached | SurfacePhase::Configured
    ));
    let (width, height) = overlay.size();
    assert!(width > 0 && height > 0);
}
