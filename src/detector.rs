//! Edge-triggered change detection between successive board snapshots.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::classify::Classifier;
use crate::types::{BoardSnapshot, CardKey, CardObservation};

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    CardCompleted {
        board_id: String,
        card: CardObservation,
    },
    MembersAssigned {
        board_id: String,
        card: CardObservation,
        new_member_ids: BTreeSet<String>,
    },
}

impl NotificationEvent {
    pub fn card(&self) -> &CardObservation {
        match self {
            NotificationEvent::CardCompleted { card, .. }
            | NotificationEvent::MembersAssigned { card, .. } => card,
        }
    }
}

/// Last-known state of one card.
#[derive(Debug, Clone, PartialEq)]
pub struct CardState {
    pub completed: bool,
    pub list_id: String,
    pub member_ids: BTreeSet<String>,
    /// Board cycle in which the card was last observed.
    last_seen_cycle: u64,
}

/// Last-known card states, owned by whoever drives the poll loop and lent to
/// the detector for each cycle.
#[derive(Debug, Default)]
pub struct CardStateMap {
    states: HashMap<CardKey, CardState>,
    board_cycles: HashMap<String, u64>,
}

impl CardStateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CardKey) -> Option<&CardState> {
        self.states.get(key)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn next_cycle(&mut self, board_id: &str) -> u64 {
        let cycle = self.board_cycles.entry(board_id.to_string()).or_insert(0);
        *cycle += 1;
        *cycle
    }

    /// Drop entries of `board_id` not observed in the last `max_idle_cycles`
    /// cycles of that board. Returns how many were dropped.
    pub fn evict_stale(&mut self, board_id: &str, max_idle_cycles: u64) -> usize {
        if max_idle_cycles == 0 {
            return 0;
        }
        let current = self.board_cycles.get(board_id).copied().unwrap_or(0);
        let before = self.states.len();
        self.states.retain(|key, state| {
            key.board_id != board_id || current - state.last_seen_cycle < max_idle_cycles
        });
        before - self.states.len()
    }
}

pub struct ChangeDetector {
    classifier: Classifier,
}

impl ChangeDetector {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }

    /// Diff a board snapshot against the known states, emitting events in
    /// the snapshot's card order. Each card's state is updated right after
    /// its own decision.
    pub fn observe(
        &self,
        states: &mut CardStateMap,
        snapshot: &BoardSnapshot,
    ) -> Vec<NotificationEvent> {
        let board_id = snapshot.info.id.as_str();
        let cycle = states.next_cycle(board_id);
        let mut events = Vec::new();

        for card in &snapshot.cards {
            let is_done = self
                .classifier
                .is_done_list(snapshot.list_name(&card.list_id));
            let key = CardKey::new(board_id, &card.card_id);
            let members = card.member_ids();

            let Some(prior) = states.states.get_mut(&key) else {
                // First sighting seeds silently, even if already done.
                states.states.insert(
                    key,
                    CardState {
                        completed: is_done,
                        list_id: card.list_id.clone(),
                        member_ids: members,
                        last_seen_cycle: cycle,
                    },
                );
                continue;
            };
            prior.last_seen_cycle = cycle;

            if is_done {
                if !prior.completed {
                    events.push(NotificationEvent::CardCompleted {
                        board_id: board_id.to_string(),
                        card: card.clone(),
                    });
                    prior.completed = true;
                }
                prior.list_id = card.list_id.clone();
                continue;
            }

            let new_member_ids: BTreeSet<String> =
                members.difference(&prior.member_ids).cloned().collect();
            if !new_member_ids.is_empty() {
                events.push(NotificationEvent::MembersAssigned {
                    board_id: board_id.to_string(),
                    card: card.clone(),
                    new_member_ids,
                });
            }
            prior.completed = false;
            prior.list_id = card.list_id.clone();
            prior.member_ids = members;
        }

        if !events.is_empty() {
            debug!(board_id, count = events.len(), "Board changes detected");
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{card, card_with_members, snapshot};

    const LISTS: &[(&str, &str)] = &[("l-doing", "Doing"), ("l-done", "Done ✅")];

    fn detector() -> ChangeDetector {
        ChangeDetector::new(Classifier::new(vec!["done".into()], vec!["doing".into()]))
    }

    fn ids(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cold_start_in_done_list_is_silent() {
        let mut states = CardStateMap::new();
        let snap = snapshot("b1", LISTS, vec![card("a", "l-done")]);
        assert!(detector().observe(&mut states, &snap).is_empty());
        assert!(states.get(&CardKey::new("b1", "a")).unwrap().completed);

        // Still done next cycle: still silent.
        assert!(detector().observe(&mut states, &snap).is_empty());
    }

    #[test]
    fn moving_to_done_fires_exactly_once() {
        let mut states = CardStateMap::new();
        let d = detector();
        let poll_n = snapshot("b1", LISTS, vec![card("a", "l-doing")]);
        assert!(d.observe(&mut states, &poll_n).is_empty());

        let poll_n1 = snapshot("b1", LISTS, vec![card("a", "l-done")]);
        let events = d.observe(&mut states, &poll_n1);
        assert_eq!(events.len(), 1);
        match &events[0] {
            NotificationEvent::CardCompleted { board_id, card } => {
                assert_eq!(board_id, "b1");
                assert_eq!(card.card_id, "a");
            }
            other => panic!("unexpected event {:?}", other),
        }

        let poll_n2 = snapshot("b1", LISTS, vec![card("a", "l-done")]);
        assert!(d.observe(&mut states, &poll_n2).is_empty());
        assert_eq!(states.get(&CardKey::new("b1", "a")).unwrap().list_id, "l-done");
    }

    #[test]
    fn new_members_fire_with_set_difference() {
        let mut states = CardStateMap::new();
        let d = detector();
        let first = snapshot("b1", LISTS, vec![card_with_members("a", "l-doing", &["m1"])]);
        assert!(d.observe(&mut states, &first).is_empty());

        let grown = snapshot(
            "b1",
            LISTS,
            vec![card_with_members("a", "l-doing", &["m1", "m2", "m3"])],
        );
        let events = d.observe(&mut states, &grown);
        assert_eq!(events.len(), 1);
        match &events[0] {
            NotificationEvent::MembersAssigned { new_member_ids, .. } => {
                assert_eq!(*new_member_ids, ids(&["m2", "m3"]));
            }
            other => panic!("unexpected event {:?}", other),
        }

        // Same members again: nothing.
        assert!(d.observe(&mut states, &grown).is_empty());
    }

    #[test]
    fn shrinking_membership_is_silent_and_refreshes_state() {
        let mut states = CardStateMap::new();
        let d = detector();
        let full = snapshot("b1", LISTS, vec![card_with_members("a", "l-doing", &["m1", "m2"])]);
        d.observe(&mut states, &full);

        let shrunk = snapshot("b1", LISTS, vec![card_with_members("a", "l-doing", &["m1"])]);
        assert!(d.observe(&mut states, &shrunk).is_empty());
        assert_eq!(states.get(&CardKey::new("b1", "a")).unwrap().member_ids, ids(&["m1"]));

        // Re-adding m2 is a new assignment.
        let events = d.observe(&mut states, &full);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn first_sighting_with_members_is_silent() {
        let mut states = CardStateMap::new();
        let snap = snapshot("b1", LISTS, vec![card_with_members("a", "l-doing", &["m1"])]);
        assert!(detector().observe(&mut states, &snap).is_empty());
    }

    #[test]
    fn events_follow_snapshot_order() {
        let mut states = CardStateMap::new();
        let d = detector();
        let before = snapshot(
            "b1",
            LISTS,
            vec![card("x", "l-doing"), card("y", "l-doing"), card("z", "l-doing")],
        );
        d.observe(&mut states, &before);
        let after = snapshot(
            "b1",
            LISTS,
            vec![
                card("z", "l-done"),
                card_with_members("y", "l-doing", &["m9"]),
                card("x", "l-done"),
            ],
        );
        let events = d.observe(&mut states, &after);
        let order: Vec<&str> = events
            .iter()
            .map(|e| e.card().card_id.as_str())
            .collect();
        assert_eq!(order, vec!["z", "y", "x"]);
    }

    #[test]
    fn same_card_id_on_two_boards_is_independent() {
        let mut states = CardStateMap::new();
        let d = detector();
        d.observe(&mut states, &snapshot("b1", LISTS, vec![card("a", "l-doing")]));
        d.observe(&mut states, &snapshot("b2", LISTS, vec![card("a", "l-done")]));
        let events = d.observe(&mut states, &snapshot("b1", LISTS, vec![card("a", "l-done")]));
        assert_eq!(events.len(), 1);
        let events = d.observe(&mut states, &snapshot("b2", LISTS, vec![card("a", "l-done")]));
        assert!(events.is_empty());
    }

    #[test]
    fn reopened_card_can_complete_again() {
        let mut states = CardStateMap::new();
        let d = detector();
        d.observe(&mut states, &snapshot("b1", LISTS, vec![card("a", "l-doing")]));
        assert_eq!(d.observe(&mut states, &snapshot("b1", LISTS, vec![card("a", "l-done")])).len(), 1);
        assert!(d.observe(&mut states, &snapshot("b1", LISTS, vec![card("a", "l-doing")])).is_empty());
        assert_eq!(d.observe(&mut states, &snapshot("b1", LISTS, vec![card("a", "l-done")])).len(), 1);
    }

    #[test]
    fn eviction_drops_only_idle_cards_of_that_board() {
        let mut states = CardStateMap::new();
        let d = detector();
        d.observe(&mut states, &snapshot("b1", LISTS, vec![card("a", "l-doing"), card("b", "l-doing")]));
        d.observe(&mut states, &snapshot("b2", LISTS, vec![card("c", "l-doing")]));

        // "b" stops being returned for two cycles.
        d.observe(&mut states, &snapshot("b1", LISTS, vec![card("a", "l-doing")]));
        assert_eq!(states.evict_stale("b1", 2), 0);
        d.observe(&mut states, &snapshot("b1", LISTS, vec![card("a", "l-doing")]));
        assert_eq!(states.evict_stale("b1", 2), 1);
        assert!(states.get(&CardKey::new("b1", "b")).is_none());
        assert!(states.get(&CardKey::new("b2", "c")).is_some());

        // An evicted card that comes back already done is re-seeded silently.
        let back = snapshot("b1", LISTS, vec![card("a", "l-doing"), card("b", "l-done")]);
        assert!(d.observe(&mut states, &back).is_empty());
    }

    #[test]
    fn eviction_disabled_with_zero() {
        let mut states = CardStateMap::new();
        let d = detector();
        d.observe(&mut states, &snapshot("b1", LISTS, vec![card("a", "l-doing")]));
        for _ in 0..5 {
            d.observe(&mut states, &snapshot("b1", LISTS, vec![]));
        }
        assert_eq!(states.evict_stale("b1", 0), 0);
        assert_eq!(states.len(), 1);
    }
}
