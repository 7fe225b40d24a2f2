use meshcall_core::ConnectionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
}

/// An incoming offer collides when we are producing one or are mid-exchange.
pub fn is_collision(making_offer: bool, state: SignalingState) -> bool {
    making_offer || state != SignalingState::Stable
}

/// On collision the side with the greater id keeps its own offer.
pub fn ignores_colliding_offer(local: &ConnectionId, remote: &ConnectionId) -> bool {
    local > remote
}
