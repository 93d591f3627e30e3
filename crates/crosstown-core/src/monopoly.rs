//! Ownership queries over overlapping monopoly sets.

use crosstown_protocol::{Event, FieldIndex, FieldState, Money, MonopolyId, PlayerId};

use crate::board::{Board, Monopoly};

/// Owner of every member of `monopoly`, if one player holds them all.
pub fn complete_owner(monopoly: &Monopoly, fields: &[FieldState]) -> Option<PlayerId> {
    let mut members = monopoly.members.iter();
    let first = fields.get(members.next()?.index())?.owner?;
    members
        .all(|m| fields.get(m.index()).and_then(|f| f.owner) == Some(first))
        .then_some(first)
}

/// Boolean form of [`complete_owner`]. The engine needs the owner itself, so it asks
/// `complete_owner` directly.
pub fn is_complete(monopoly: &Monopoly, fields: &[FieldState]) -> bool {
    complete_owner(monopoly, fields).is_some()
}

/// Product of the multipliers of every set containing `field` that `owner` has completed.
pub fn effective_multiplier(
    board: &Board,
    field: FieldIndex,
    owner: PlayerId,
    fields: &[FieldState],
) -> u32 {
    board
        .monopolies_of(field)
        .iter()
        .filter_map(|id| board.monopoly(*id))
        .filter(|m| complete_owner(m, fields) == Some(owner))
        .map(|m| m.multiplier)
        .product()
}

/// Sets containing `field` that are complete for its current owner.
pub fn contested_monopolies(
    board: &Board,
    field: FieldIndex,
    fields: &[FieldState],
) -> Vec<MonopolyId> {
    let Some(owner) = fields.get(field.index()).and_then(|f| f.owner) else {
        return Vec::new();
    };
    board
        .monopolies_of(field)
        .iter()
        .copied()
        .filter(|id| {
            board
                .monopoly(*id)
                .is_some_and(|m| complete_owner(m, fields) == Some(owner))
        })
        .collect()
}

/// Current income of an owned field; unowned fields yield nothing.
pub fn field_income(board: &Board, field: FieldIndex, fields: &[FieldState]) -> Money {
    let Some(state) = fields.get(field.index()) else {
        return 0;
    };
    let (Some(owner), Some(def)) = (state.owner, board.field(field)) else {
        return 0;
    };
    def.base_income(state.level) * Money::from(effective_multiplier(board, field, owner, fields))
}

/// Monopolies whose completeness changed between `before` and `after` for any of `touched`.
///
/// Only sets contested on either side can change, since a set complete on neither side has no
/// owner before or after.
pub fn monopoly_changes(
    board: &Board,
    touched: &[FieldIndex],
    before: &[FieldState],
    after: &[FieldState],
) -> Vec<Event> {
    let mut ids: Vec<MonopolyId> = touched
        .iter()
        .flat_map(|f| {
            let mut ids = contested_monopolies(board, *f, before);
            ids.extend(contested_monopolies(board, *f, after));
            ids
        })
        .collect();
    ids.sort();
    ids.dedup();

    let mut events = Vec::new();
    for monopoly in ids.iter().filter_map(|id| board.monopoly(*id)) {
        let old = complete_owner(monopoly, before);
        let new = complete_owner(monopoly, after);
        if old == new {
            continue;
        }
        if let Some(former_owner) = old {
            events.push(Event::MonopolyLost {
                monopoly: monopoly.id,
                former_owner,
            });
        }
        if let Some(owner) = new {
            events.push(Event::MonopolyFormed {
                monopoly: monopoly.id,
                owner,
            });
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{load_board, BoardSource};

    fn fresh_fields() -> Vec<FieldState> {
        (0..FieldIndex::COUNT as u8)
            .map(|i| FieldState::unowned(FieldIndex(i)))
            .collect()
    }

    fn give(fields: &mut [FieldState], owner: PlayerId, cells: &[u8]) {
        for &c in cells {
            fields[c as usize].owner = Some(owner);
        }
    }

    #[test]
    fn completing_last_member_flips_only_that_set() {
        let board = load_board(BoardSource::Embedded).unwrap();
        let korea = board.monopoly_by_key("korea").unwrap();
        let asia = board.monopoly_by_key("asia").unwrap();
        let airlines = board.monopoly_by_key("airlines").unwrap();

        let mut fields = fresh_fields();
        give(&mut fields, PlayerId(0), &[6]);
        assert!(!is_complete(korea, &fields));

        let before = fields.clone();
        give(&mut fields, PlayerId(0), &[7]);
        assert!(is_complete(korea, &fields));
        assert!(!is_complete(asia, &fields));
        assert!(!is_complete(airlines, &fields));

        let events = monopoly_changes(&board, &[FieldIndex(7)], &before, &fields);
        assert_eq!(
            events,
            vec![Event::MonopolyFormed {
                monopoly: korea.id,
                owner: PlayerId(0)
            }]
        );
    }

    #[test]
    fn overlapping_multipliers_stack() {
        let board = load_board(BoardSource::Embedded).unwrap();
        let mut fields = fresh_fields();
        // Egypt and Nigeria make up Africa: country x2 and composite x2.
        give(&mut fields, PlayerId(1), &[21, 23, 24, 26]);

        assert_eq!(effective_multiplier(&board, FieldIndex(23), PlayerId(1), &fields), 4);
        assert_eq!(effective_multiplier(&board, FieldIndex(23), PlayerId(0), &fields), 1);

        let contested = contested_monopolies(&board, FieldIndex(23), &fields);
        assert_eq!(contested.len(), 2);

        let base = board.field(FieldIndex(23)).unwrap().base_income(0);
        assert_eq!(field_income(&board, FieldIndex(23), &fields), base * 4);
    }

    #[test]
    fn unowned_field_has_no_income() {
        let board = load_board(BoardSource::Embedded).unwrap();
        let fields = fresh_fields();
        assert_eq!(field_income(&board, FieldIndex(1), &fields), 0);
        assert!(contested_monopolies(&board, FieldIndex(1), &fields).is_empty());
    }

    #[test]
    fn transfer_reports_loss_and_formation() {
        let board = load_board(BoardSource::Embedded).unwrap();
        let korea = board.monopoly_by_key("korea").unwrap();
        let mut fields = fresh_fields();
        give(&mut fields, PlayerId(0), &[6, 7]);
        let before = fields.clone();
        give(&mut fields, PlayerId(1), &[6, 7]);

        let events = monopoly_changes(&board, &[FieldIndex(6), FieldIndex(7)], &before, &fields);
        assert!(events.contains(&Event::MonopolyLost {
            monopoly: korea.id,
            former_owner: PlayerId(0)
        }));
        assert!(events.contains(&Event::MonopolyFormed {
            monopoly: korea.id,
            owner: PlayerId(1)
        }));
    }
}
