//! Item lifecycle state machine.
//!
//! Every state change an item goes through is a row of [`ItemState::apply`].
//! Services compute the next state here and never assign `state` directly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entities::item::{ItemState, OwnershipType};

/// Events that drive an item between lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleEvent {
    Transfer,
    Damage,
    WriteOff,
    Return,
}

impl LifecycleEvent {
    /// Verb used in user-facing transition errors.
    pub fn verb(self) -> &'static str {
        match self {
            LifecycleEvent::Transfer => "transfer",
            LifecycleEvent::Damage => "record damage on",
            LifecycleEvent::WriteOff => "write off",
            LifecycleEvent::Return => "return",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub event: LifecycleEvent,
    pub state: ItemState,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot {} an item that is {}",
            self.event.verb(),
            self.state.as_ref()
        )
    }
}

impl std::error::Error for TransitionError {}

impl ItemState {
    /// Terminal states accept no further events.
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::WrittenOff | ItemState::Returned)
    }

    /// Returns the state reached by applying `event` to an item in this state.
    ///
    /// `ownership` only matters for `Return`: owned equipment has no lender
    /// to go back to.
    pub fn apply(
        self,
        event: LifecycleEvent,
        ownership: OwnershipType,
    ) -> Result<ItemState, TransitionError> {
        use ItemState::*;
        use LifecycleEvent::*;

        let next = match (self, event) {
            (WrittenOff, _) | (Returned, _) => None,

            (Available, Transfer) | (InUse, Transfer) => Some(InUse),
            (Damaged, Transfer) => Some(Damaged),

            (_, Damage) => Some(Damaged),
            (_, WriteOff) => Some(WrittenOff),

            (_, Return) if ownership == OwnershipType::Borrowed => Some(Returned),
            (_, Return) => None,
        };

        next.ok_or(TransitionError { event, state: self })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use sea_orm::Iterable;

    #[rstest]
    #[case(ItemState::Available, LifecycleEvent::Transfer, ItemState::InUse)]
    #[case(ItemState::InUse, LifecycleEvent::Transfer, ItemState::InUse)]
    #[case(ItemState::Damaged, LifecycleEvent::Transfer, ItemState::Damaged)]
    #[case(ItemState::Available, LifecycleEvent::Damage, ItemState::Damaged)]
    #[case(ItemState::InUse, LifecycleEvent::Damage, ItemState::Damaged)]
    #[case(ItemState::Damaged, LifecycleEvent::Damage, ItemState::Damaged)]
    #[case(ItemState::Available, LifecycleEvent::WriteOff, ItemState::WrittenOff)]
    #[case(ItemState::InUse, LifecycleEvent::WriteOff, ItemState::WrittenOff)]
    #[case(ItemState::Damaged, LifecycleEvent::WriteOff, ItemState::WrittenOff)]
    #[case(ItemState::Available, LifecycleEvent::Return, ItemState::Returned)]
    #[case(ItemState::InUse, LifecycleEvent::Return, ItemState::Returned)]
    #[case(ItemState::Damaged, LifecycleEvent::Return, ItemState::Returned)]
    fn borrowed_transition_table(
        #[case] from: ItemState,
        #[case] event: LifecycleEvent,
        #[case] to: ItemState,
    ) {
        assert_eq!(from.apply(event, OwnershipType::Borrowed), Ok(to));
    }

    #[test]
    fn owned_items_cannot_be_returned() {
        for state in [ItemState::Available, ItemState::InUse, ItemState::Damaged] {
            let err = state
                .apply(LifecycleEvent::Return, OwnershipType::Owned)
                .unwrap_err();
            assert_eq!(err.event, LifecycleEvent::Return);
            assert_eq!(err.state, state);
        }
    }

    #[test]
    fn terminal_states_reject_every_event() {
        let events = [
            LifecycleEvent::Transfer,
            LifecycleEvent::Damage,
            LifecycleEvent::WriteOff,
            LifecycleEvent::Return,
        ];
        for state in [ItemState::WrittenOff, ItemState::Returned] {
            for event in events {
                for ownership in OwnershipType::iter() {
                    assert!(state.apply(event, ownership).is_err());
                }
            }
        }
    }

    #[test]
    fn transition_error_message() {
        let err = ItemState::Returned
            .apply(LifecycleEvent::WriteOff, OwnershipType::Borrowed)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot write off an item that is RETURNED");
    }
}
