use popo_core::model::{Document, EntityId, Process, Step, Theme, User};
use proptest::option;
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Ids drawn from a small pool so independently generated documents share
/// ids often enough to exercise the matching paths.
pub fn arb_entity_id() -> impl Strategy<Value = EntityId> + Clone {
    prop_oneof![
        "[a-f]".prop_map(EntityId::from),
        (1i64..6).prop_map(EntityId::from),
    ]
}

pub fn arb_text() -> impl Strategy<Value = String> + Clone {
    "[A-Za-z ]{0,8}"
}

pub fn arb_theme() -> impl Strategy<Value = Theme> + Clone {
    prop_oneof![Just(Theme::Light), Just(Theme::Dark), Just(Theme::System)]
}

#[allow(clippy::option_option)]
pub fn arb_schedule() -> impl Strategy<Value = Option<Option<String>>> + Clone {
    prop_oneof![
        Just(None),
        Just(Some(None)),
        "2024-0[1-9]-1[0-9]T0[0-9]:[0-5][0-9]".prop_map(|when| Some(Some(when))),
    ]
}

fn process_with(id: EntityId) -> impl Strategy<Value = Process> {
    option::of(arb_text()).prop_map(move |title| Process {
        id: id.clone(),
        title,
        extra: BTreeMap::new(),
    })
}

fn step_with(id: EntityId) -> impl Strategy<Value = Step> {
    (
        option::of(arb_entity_id()),
        option::of(arb_text()),
        option::of(any::<bool>()),
        arb_schedule(),
    )
        .prop_map(move |(process_id, title, done, scheduled_at)| Step {
            id: id.clone(),
            process_id,
            title,
            done,
            scheduled_at,
            extra: BTreeMap::new(),
        })
}

/// Processes with unique ids.
pub fn arb_processes() -> impl Strategy<Value = Vec<Process>> {
    prop::collection::btree_set(arb_entity_id(), 0..5)
        .prop_flat_map(|ids| ids.into_iter().map(process_with).collect::<Vec<_>>())
}

/// Steps with unique ids.
pub fn arb_steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::btree_set(arb_entity_id(), 0..6)
        .prop_flat_map(|ids| ids.into_iter().map(step_with).collect::<Vec<_>>())
}

fn user_with(id: EntityId) -> impl Strategy<Value = User> {
    (
        option::of(arb_text()),
        option::of(arb_text()),
        option::of(arb_text()),
        arb_processes(),
        arb_steps(),
    )
        .prop_map(move |(name, role, avatar, processes, steps)| User {
            id: id.clone(),
            name,
            role,
            avatar,
            processes,
            steps,
            extra: BTreeMap::new(),
        })
}

/// A current-shape document with unique user ids and a resolving
/// current-user pointer.
pub fn arb_document() -> impl Strategy<Value = Document> {
    (
        prop::collection::btree_set(arb_entity_id(), 1..4),
        option::of(arb_theme()),
    )
        .prop_flat_map(|(ids, theme)| {
            let len = ids.len();
            (
                ids.into_iter().map(user_with).collect::<Vec<_>>(),
                0..len,
                Just(theme),
            )
        })
        .prop_map(|(users, current, theme)| Document {
            current_user_id: Some(users[current].id.clone()),
            users,
            theme,
            extra: BTreeMap::new(),
        })
}
