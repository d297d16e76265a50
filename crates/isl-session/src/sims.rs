//! Simulations table - discovery of the participants active in a hub
//!
//! A fixed number of slots; a slot whose uid is zero is free. Each slot
//! names a participant, the rest of its description lives in the model
//! entry the participant registered at `create`.

use isl_core::log::msg;
use isl_core::{ConnectorUid, TypeTag};

/// Point-in-time description of one participant
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimEntry {
    pub type_tag: TypeTag,
    pub uid: ConnectorUid,
    pub pid: u32,
    pub nb_ios: usize,
    pub uuid: String,
    pub name: String,
    pub file: String,
    pub session: String,
}

/// What a participant publishes in its table slot
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct SimSlot {
    pub uid: ConnectorUid,
    pub pid: u32,
    pub name: String,
    pub session: String,
}

#[derive(Debug)]
pub(crate) struct SimsTable {
    slots: Vec<SimSlot>,
}

impl SimsTable {
    pub fn new(max_nb: usize) -> Self {
        SimsTable {
            slots: vec![SimSlot::default(); max_nb],
        }
    }

    pub fn max_nb(&self) -> usize {
        self.slots.len()
    }

    /// Take the first free slot
    pub fn add(&mut self, slot: SimSlot) -> Option<usize> {
        let Some(index) = self.slots.iter().position(|s| s.uid.is_zero()) else {
            tracing::warn!(msg_id = msg::SIMS_FULL, max = self.slots.len(), "simulations table full");
            return None;
        };
        tracing::debug!(msg_id = msg::SIMS_ADD, index, uid = %slot.uid, session = %slot.session, "simulation added");
        self.slots[index] = slot;
        Some(index)
    }

    /// Free the slot of `uid` in `session`
    pub fn remove(&mut self, uid: ConnectorUid, session: &str) -> bool {
        match self
            .slots
            .iter_mut()
            .find(|s| s.uid == uid && s.session == session)
        {
            Some(slot) => {
                *slot = SimSlot::default();
                tracing::debug!(msg_id = msg::SIMS_REMOVE, uid = %uid, session, "simulation removed");
                true
            }
            None => false,
        }
    }

    /// Occupied slot at `index`
    pub fn get(&self, index: usize) -> Option<&SimSlot> {
        self.slots.get(index).filter(|s| !s.uid.is_zero())
    }

    pub fn active(&self) -> usize {
        self.slots.iter().filter(|s| !s.uid.is_zero()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(uid: u32, session: &str) -> SimSlot {
        SimSlot {
            uid: ConnectorUid::new(uid),
            pid: 42,
            name: format!("m{}", uid),
            session: session.to_string(),
        }
    }

    #[test]
    fn test_first_free_slot_reused() {
        let mut t = SimsTable::new(3);
        assert_eq!(t.add(slot(1, "s")), Some(0));
        assert_eq!(t.add(slot(2, "s")), Some(1));
        assert!(t.remove(ConnectorUid::new(1), "s"));
        assert_eq!(t.add(slot(3, "s")), Some(0));
        assert_eq!(t.active(), 2);
    }

    #[test]
    fn test_full_table() {
        let mut t = SimsTable::new(1);
        t.add(slot(1, "s")).unwrap();
        assert_eq!(t.add(slot(2, "s")), None);
    }

    #[test]
    fn test_get_skips_free_and_out_of_range() {
        let mut t = SimsTable::new(2);
        t.add(slot(7, "a")).unwrap();
        assert_eq!(t.get(0).unwrap().name, "m7");
        assert!(t.get(1).is_none());
        assert!(t.get(5).is_none());
        assert!(!t.remove(ConnectorUid::new(7), "b"));
    }
}
