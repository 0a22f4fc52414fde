use std::collections::HashMap;

use glam::Vec3;

use storefront_sync::sync::transport::OfflineTransport;
use storefront_sync::sync::{
    AvatarBinding, AvatarFrame, InboundEvent, MotionInput, PhysicsBody, PlayerIdentity,
    SyncConfig, SyncSession,
};
use storefront_sync::ws::client::inbound_event;
use storefront_sync::ws::protocol::decode_server_msg;

const FRAME_MS: u64 = 16;
const DT: f32 = 0.016;

struct NoBody;

impl PhysicsBody for NoBody {
    fn translation(&self) -> Option<Vec3> {
        None
    }

    fn linear_velocity(&self) -> Vec3 {
        Vec3::ZERO
    }
}

#[derive(Default)]
struct Scene {
    avatars: HashMap<String, AvatarFrame>,
}

impl AvatarBinding for Scene {
    fn apply(&mut self, id: &str, frame: &AvatarFrame) {
        self.avatars.insert(id.to_string(), frame.clone());
    }

    fn despawn(&mut self, id: &str) {
        self.avatars.remove(id);
    }
}

fn session() -> SyncSession<OfflineTransport> {
    SyncSession::new(
        SyncConfig::default(),
        PlayerIdentity {
            id: "local".into(),
            username: "local".into(),
            avatar_url: String::new(),
        },
        OfflineTransport,
    )
}

/// Decode a relay frame the way the socket reader does
fn relay_update(x: f32, is_moving: bool, t: u64) -> InboundEvent {
    let text = format!(
        r#"{{"type":"player_update","id":"p","username":"pat","avatarUrl":"https://cdn.example/pat.glb","position":[{x},0,0],"rotation":0,"isMoving":{is_moving},"isRunning":false,"lastUpdated":{t}}}"#
    );
    inbound_event(decode_server_msg(&text).unwrap()).unwrap()
}

#[test]
fn remote_walker_is_smoothed_and_extrapolated() {
    let mut session = session();
    let mut scene = Scene::default();
    let inbound = session.inbound();

    // t = 0: first sighting at the origin
    inbound.push(relay_update(0.0, true, 0));
    let mut now = 0;
    while now < 100 {
        session.frame(now, DT, &NoBody, MotionInput::default(), &mut scene);
        now += FRAME_MS;
    }
    assert_eq!(scene.avatars["p"].position.x, 0.0);

    // t = 100: one unit further along x
    inbound.push(relay_update(1.0, true, 100));
    now = 100;
    session.frame(now, DT, &NoBody, MotionInput::default(), &mut scene);

    let player = session.registry().get("p").unwrap();
    assert!((player.velocity().x - 10.0).abs() < 1e-3);
    assert!(player.velocity().y.abs() < 1e-6 && player.velocity().z.abs() < 1e-6);

    // Direct tracking: rendered x climbs towards 1 without passing it
    let mut previous = scene.avatars["p"].position.x;
    now += FRAME_MS;
    while now < 200 {
        session.frame(now, DT, &NoBody, MotionInput::default(), &mut scene);
        let x = scene.avatars["p"].position.x;
        assert!(x > previous && x < 1.0, "x = {x} at {now}");
        assert_eq!(session.registry().get("p").unwrap().target_position.x, 1.0);
        previous = x;
        now += FRAME_MS;
    }

    // Dead-reckoning window: the target is pushed ahead and the avatar follows past 1
    let mut overshot = false;
    while now < 300 {
        session.frame(now, DT, &NoBody, MotionInput::default(), &mut scene);
        let x = scene.avatars["p"].position.x;
        assert!(x > previous);
        overshot |= x > 1.0;
        previous = x;
        now += FRAME_MS;
    }
    assert!(overshot);
    assert!(session.registry().get("p").unwrap().target_position.x > 1.0);

    // A real sample arrives and the player has stopped: hold it exactly
    inbound.push(relay_update(2.0, false, now));
    for _ in 0..200 {
        session.frame(now, DT, &NoBody, MotionInput::default(), &mut scene);
        let player = session.registry().get("p").unwrap();
        assert_eq!(player.target_position.x, 2.0);
        assert!(scene.avatars["p"].position.x <= 2.0 + 1e-5);
        now += FRAME_MS;
    }
    assert!((scene.avatars["p"].position.x - 2.0).abs() < 1e-3);
}

#[test]
fn roster_then_update_then_disconnect() {
    let mut session = session();
    let mut scene = Scene::default();
    let inbound = session.inbound();

    let roster = decode_server_msg(
        r#"{"type":"roster","players":[{"id":"p","position":[3,0,1]},{"id":"local"},{"username":"nameless"}]}"#,
    )
    .unwrap();
    inbound.push(inbound_event(roster).unwrap());
    session.frame(1_000, DT, &NoBody, MotionInput::default(), &mut scene);

    assert_eq!(session.registry().len(), 1);
    let player = session.registry().get("p").unwrap();
    assert_eq!(player.username(), "Guest");
    assert_eq!(player.target_position, Vec3::new(3.0, 0.0, 1.0));

    inbound.push(relay_update(4.0, true, 1_016));
    inbound.push(relay_update(4.0, true, 1_016));
    session.frame(1_016, DT, &NoBody, MotionInput::default(), &mut scene);
    assert_eq!(session.registry().len(), 1);

    let leave = decode_server_msg(r#"{"type":"player_left","id":"p"}"#).unwrap();
    inbound.push(inbound_event(leave.clone()).unwrap());
    inbound.push(inbound_event(leave).unwrap());
    session.frame(1_032, DT, &NoBody, MotionInput::default(), &mut scene);

    assert!(session.registry().is_empty());
    assert!(scene.avatars.is_empty());
}

#[test]
fn duplicate_and_reordered_samples_are_last_write_wins() {
    let mut session = session();
    let mut scene = Scene::default();
    let inbound = session.inbound();

    inbound.push(relay_update(5.0, true, 200));
    // Older sample arrives after the newer one
    inbound.push(relay_update(4.0, true, 100));
    session.frame(1_000, DT, &NoBody, MotionInput::default(), &mut scene);

    let player = session.registry().get("p").unwrap();
    assert_eq!(player.target_position.x, 4.0);
    assert_eq!(session.registry().len(), 1);

    let InboundEvent::Update(state) = relay_update(6.0, false, 300) else {
        panic!("expected an update");
    };
    assert_eq!(state.avatar_url, "https://cdn.example/pat.glb");
    assert_eq!(state.last_updated, Some(300));
}
