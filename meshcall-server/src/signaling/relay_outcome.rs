use std::fmt;

/// Result of routing one signal. A drop is an expected race, not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnknownRoom,
    SenderNotInRoom,
    TargetNotInRoom,
    ChannelClosed,
}

impl RelayOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, RelayOutcome::Delivered)
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DropReason::UnknownRoom => "room does not exist",
            DropReason::SenderNotInRoom => "sender is not a member of the room",
            DropReason::TargetNotInRoom => "target is not a member of the room",
            DropReason::ChannelClosed => "target channel is closed",
        };
        f.write_str(reason)
    }
}
