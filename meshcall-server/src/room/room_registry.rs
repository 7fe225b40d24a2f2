use crate::room::Room;
use dashmap::DashMap;
use meshcall_core::{ConnectionId, Participant, RoomId};
use tracing::{debug, info};

/// Process-wide map of room id to its current members.
///
/// Each room lives in its own map entry, so mutations of one room are serialized
/// by the entry lock while unrelated rooms proceed independently. The callbacks
/// given to [`RoomRegistry::join_with`] and [`RoomRegistry::leave_with`] run while
/// that lock is held; they must not call back into the registry.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomId, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    pub fn join(&self, room_id: &RoomId, participant: Participant) {
        self.join_with(room_id, participant, |_| ());
    }

    /// Adds (or replaces) a participant and hands the updated room to `on_change`.
    pub fn join_with<R>(
        &self,
        room_id: &RoomId,
        participant: Participant,
        on_change: impl FnOnce(&Room) -> R,
    ) -> R {
        let mut room = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            info!("Creating new room: {}", room_id);
            Room::new(room_id.clone())
        });

        debug!(
            "{} ({}) joins room {}",
            participant.display_name, participant.connection_id, room_id
        );
        room.upsert(participant);

        on_change(&room)
    }

    pub fn leave(&self, room_id: &RoomId, connection_id: &ConnectionId) -> Option<Participant> {
        self.leave_with(room_id, connection_id, |_, _| ())
    }

    /// Removes a participant. `on_change` only runs when the participant was
    /// actually a member. A room left without members is dropped.
    pub fn leave_with<F>(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        on_change: F,
    ) -> Option<Participant>
    where
        F: FnOnce(&Room, &Participant),
    {
        let departed = {
            let mut room = self.rooms.get_mut(room_id)?;
            let departed = room.remove(connection_id)?;
            on_change(&room, &departed);
            departed
        };

        if self
            .rooms
            .remove_if(room_id, |_, room| room.is_empty())
            .is_some()
        {
            info!("Removing empty room: {}", room_id);
        }

        Some(departed)
    }

    /// Runs `f` against the room under a read lock.
    pub fn with_room<R>(&self, room_id: &RoomId, f: impl FnOnce(&Room) -> R) -> Option<R> {
        self.rooms.get(room_id).map(|room| f(&room))
    }

    pub fn members_of(&self, room_id: &RoomId) -> Vec<Participant> {
        self.with_room(room_id, |room| room.members().to_vec())
            .unwrap_or_default()
    }

    pub fn contains(&self, room_id: &RoomId, connection_id: &ConnectionId) -> bool {
        self.with_room(room_id, |room| room.contains(connection_id))
            .unwrap_or(false)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Drops every room entry that has no members, returning how many were removed.
    pub fn sweep_empty(&self) -> usize {
        let mut removed = 0;
        self.rooms.retain(|room_id, room| {
            if room.is_empty() {
                info!("Cleaning up empty room: {}", room_id);
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }
}
