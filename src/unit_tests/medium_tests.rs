use super::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

fn medium_with(pt_loss: f64) -> (Medium, SimConfig) {
    let mut config = SimConfig::default();
    config.pt_loss = pt_loss;
    let mut medium = Medium::new(&config);
    medium.register(NodeId(0));
    medium.register(NodeId(1));
    medium.register(NodeId(2));
    (medium, config)
}

#[test]
fn sender_never_receives_its_own_broadcast() {
    let (medium, _) = medium_with(0.0);
    let mut rng = Xoshiro256StarStar::seed_from_u64(1);
    let packet = Packet::disc(NodeId(0), None, Millis(0));
    let deliveries = medium.broadcast(NodeId(0), packet, |_| true, &mut rng);
    assert!(deliveries.iter().all(|(peer, _)| *peer != NodeId(0)));
}

#[test]
fn only_peers_in_receive_state_are_eligible() {
    let (medium, _) = medium_with(0.0);
    let mut rng = Xoshiro256StarStar::seed_from_u64(1);
    let packet = Packet::disc(NodeId(0), None, Millis(0));
    let deliveries = medium.broadcast(NodeId(0), packet, |peer| peer == NodeId(1), &mut rng);
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, NodeId(1));
}

#[test]
fn zero_loss_delivers_to_every_eligible_peer() {
    let (medium, _) = medium_with(0.0);
    let mut rng = Xoshiro256StarStar::seed_from_u64(7);
    let packet = Packet::disc(NodeId(0), None, Millis(0));
    let deliveries = medium.broadcast(NodeId(0), packet, |_| true, &mut rng);
    assert_eq!(deliveries.len(), 2);
}

#[test]
fn total_loss_delivers_to_nobody() {
    let (medium, _) = medium_with(1.0);
    let mut rng = Xoshiro256StarStar::seed_from_u64(7);
    let packet = Packet::disc(NodeId(0), None, Millis(0));
    let deliveries = medium.broadcast(NodeId(0), packet, |_| true, &mut rng);
    assert!(deliveries.is_empty());
}

#[test]
fn eligible_peers_are_delivered_in_registration_order() {
    let (medium, _) = medium_with(0.0);
    let mut rng = Xoshiro256StarStar::seed_from_u64(1);
    let packet = Packet::disc(NodeId(0), None, Millis(0));
    let deliveries = medium.broadcast(NodeId(0), packet, |_| true, &mut rng);
    let order: Vec<NodeId> = deliveries.iter().map(|(peer, _)| *peer).collect();
    assert_eq!(order, vec![NodeId(1), NodeId(2)]);
}
