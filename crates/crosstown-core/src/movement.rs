//! Board topology and the pure path calculator.
//!
//! The ring is cells 0..=39. Four spokes start at the entries 5, 15, 25 and 35, meet at the
//! center (44) and leave on the opposite side of the ring.

use crosstown_protocol::{Direction, FieldIndex};
use thiserror::Error;

const SPOKE_LEN: usize = 11;

/// Entry, four spoke cells, center, four spoke cells, exit.
pub const fn spoke_line(direction: Direction) -> [u8; SPOKE_LEN] {
    match direction {
        Direction::Down => [5, 49, 50, 51, 52, 44, 53, 54, 55, 56, 25],
        Direction::Up => [25, 56, 55, 54, 53, 44, 52, 51, 50, 49, 5],
        Direction::Right => [35, 40, 41, 42, 43, 44, 45, 46, 47, 48, 15],
        Direction::Left => [15, 48, 47, 46, 45, 44, 43, 42, 41, 40, 35],
    }
}

/// Spoke direction implied by an entry cell.
pub const fn entry_direction(cell: FieldIndex) -> Option<Direction> {
    match cell.0 {
        5 => Some(Direction::Down),
        15 => Some(Direction::Left),
        25 => Some(Direction::Up),
        35 => Some(Direction::Right),
        _ => None,
    }
}

pub const ENTRIES: [FieldIndex; 4] = [FieldIndex(5), FieldIndex(15), FieldIndex(25), FieldIndex(35)];

/// Direction toward the center from a spoke cell; None on the center and the ring.
pub fn inward_direction(cell: FieldIndex) -> Option<Direction> {
    if cell == FieldIndex::START || !cell.is_spoke() {
        return None;
    }
    Direction::ALL.into_iter().find(|&dir| {
        let line = spoke_line(dir);
        line[1..5].contains(&cell.0)
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MovePath {
    pub path: Vec<FieldIndex>,
    pub turned_to_center: bool,
    pub passed_start: bool,
    /// Facing when the move ends inside the spoke range, center included.
    pub exit_direction: Option<Direction>,
}

impl MovePath {
    pub fn destination(&self) -> Option<FieldIndex> {
        self.path.last().copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("cell {0} does not exist")]
    InvalidCell(u8),
    #[error("no spoke direction established at cell {0}")]
    MissingDirection(u8),
}

#[derive(Clone, Copy, Debug)]
enum Cursor {
    Ring(u8),
    /// `travel` is the line being walked; `idx` the position within it.
    Spoke { travel: Direction, idx: usize },
}

/// Compute the cells visited by a move of `steps` cells.
///
/// `direction` is the facing already established on a spoke; it is required when `from` lies in
/// the spoke range (40..=56) and ignored elsewhere.
pub fn compute_path(
    from: FieldIndex,
    steps: u8,
    backward: bool,
    prefer_center: bool,
    direction: Option<Direction>,
) -> Result<MovePath, MoveError> {
    if !from.is_valid() {
        return Err(MoveError::InvalidCell(from.0));
    }

    let mut facing = None;
    let mut cursor = if from.is_spoke() {
        let dir = direction.ok_or(MoveError::MissingDirection(from.0))?;
        let travel = if backward { dir.opposite() } else { dir };
        let idx = spoke_line(travel)
            .iter()
            .position(|&c| c == from.0)
            .ok_or(MoveError::MissingDirection(from.0))?;
        facing = Some(dir);
        Cursor::Spoke { travel, idx }
    } else if let (Some(dir), false) = (entry_direction(from), backward) {
        facing = Some(dir);
        Cursor::Spoke {
            travel: dir,
            idx: 0,
        }
    } else {
        Cursor::Ring(from.0)
    };

    let mut visited_spoke = matches!(cursor, Cursor::Spoke { .. });
    let mut turned_to_center = false;
    let mut path = Vec::with_capacity(steps as usize);

    for step in 0..steps {
        let remaining_after = steps - step - 1;
        cursor = match cursor {
            Cursor::Ring(pos) => {
                let next = if backward {
                    (pos + FieldIndex::RING_LEN - 1) % FieldIndex::RING_LEN
                } else {
                    (pos + 1) % FieldIndex::RING_LEN
                };
                path.push(FieldIndex(next));
                match entry_direction(FieldIndex(next)) {
                    Some(dir)
                        if prefer_center
                            && !backward
                            && !visited_spoke
                            && remaining_after > 0 =>
                    {
                        turned_to_center = true;
                        visited_spoke = true;
                        facing = Some(dir);
                        Cursor::Spoke {
                            travel: dir,
                            idx: 0,
                        }
                    }
                    _ => Cursor::Ring(next),
                }
            }
            Cursor::Spoke { travel, idx } => {
                let line = spoke_line(travel);
                let next = idx + 1;
                path.push(FieldIndex(line[next]));
                if next == SPOKE_LEN - 1 {
                    Cursor::Ring(line[next])
                } else {
                    Cursor::Spoke { travel, idx: next }
                }
            }
        };
    }

    let passed_start = path.contains(&FieldIndex::START);
    let exit_direction = match path.last() {
        Some(last) if last.is_spoke() => facing,
        None if from.is_spoke() => facing,
        _ => None,
    };

    Ok(MovePath {
        path,
        turned_to_center,
        passed_start,
        exit_direction,
    })
}

/// Whether a forward move of `steps` from `from` crosses an entry where the mover could turn in.
pub fn can_turn_to_center(
    from: FieldIndex,
    steps: u8,
    backward: bool,
    direction: Option<Direction>,
) -> bool {
    compute_path(from, steps, backward, true, direction)
        .map(|p| p.turned_to_center)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(path: &[u8]) -> Vec<FieldIndex> {
        path.iter().map(|&c| FieldIndex(c)).collect()
    }

    #[test]
    fn plain_ring_move_wraps() {
        let mv = compute_path(FieldIndex(37), 5, false, false, None).unwrap();
        assert_eq!(mv.path, cells(&[38, 39, 0, 1, 2]));
        assert!(!mv.passed_start);
        assert!(!mv.turned_to_center);
        assert_eq!(mv.exit_direction, None);
    }

    #[test]
    fn prefer_center_turns_at_entry() {
        let mv = compute_path(FieldIndex(3), 4, false, true, None).unwrap();
        assert_eq!(mv.path, cells(&[4, 5, 49, 50]));
        assert!(mv.turned_to_center);
        assert!(!mv.passed_start);
        assert_eq!(mv.exit_direction, Some(Direction::Down));
    }

    #[test]
    fn entry_on_final_step_does_not_turn() {
        let mv = compute_path(FieldIndex(3), 2, false, true, None).unwrap();
        assert_eq!(mv.path, cells(&[4, 5]));
        assert!(!mv.turned_to_center);
        assert_eq!(mv.exit_direction, None);
    }

    #[test]
    fn starting_on_entry_enters_spoke_without_preference() {
        let mv = compute_path(FieldIndex(35), 3, false, false, None).unwrap();
        assert_eq!(mv.path, cells(&[40, 41, 42]));
        assert!(!mv.turned_to_center);
        assert_eq!(mv.exit_direction, Some(Direction::Right));
    }

    #[test]
    fn movement_continues_through_center_and_exits() {
        let mv = compute_path(FieldIndex(15), 12, false, false, None).unwrap();
        assert_eq!(
            mv.path,
            cells(&[48, 47, 46, 45, 44, 43, 42, 41, 40, 35, 36, 37])
        );
        assert!(mv.passed_start);
        assert_eq!(mv.exit_direction, None);
    }

    #[test]
    fn spoke_move_follows_established_direction() {
        let mv = compute_path(FieldIndex(52), 3, false, false, Some(Direction::Down)).unwrap();
        assert_eq!(mv.path, cells(&[44, 53, 54]));
        assert!(mv.passed_start);
        assert_eq!(mv.exit_direction, Some(Direction::Down));
    }

    #[test]
    fn center_needs_direction() {
        assert_eq!(
            compute_path(FieldIndex::START, 3, false, false, None),
            Err(MoveError::MissingDirection(44))
        );
        let mv = compute_path(FieldIndex::START, 2, false, false, Some(Direction::Up)).unwrap();
        assert_eq!(mv.path, cells(&[52, 51]));
        assert_eq!(mv.exit_direction, Some(Direction::Up));
    }

    #[test]
    fn backward_on_ring_and_in_spoke() {
        let mv = compute_path(FieldIndex(1), 3, true, false, None).unwrap();
        assert_eq!(mv.path, cells(&[0, 39, 38]));

        let mv = compute_path(FieldIndex(50), 3, true, false, Some(Direction::Down)).unwrap();
        assert_eq!(mv.path, cells(&[49, 5, 4]));
        assert_eq!(mv.exit_direction, None);

        let mv = compute_path(FieldIndex(53), 2, true, false, Some(Direction::Down)).unwrap();
        assert_eq!(mv.path, cells(&[44, 52]));
        assert_eq!(mv.exit_direction, Some(Direction::Down));
    }

    #[test]
    fn backward_never_turns_and_entry_start_stays_on_ring() {
        let mv = compute_path(FieldIndex(5), 2, true, true, None).unwrap();
        assert_eq!(mv.path, cells(&[4, 3]));
        let mv = compute_path(FieldIndex(8), 4, true, true, None).unwrap();
        assert_eq!(mv.path, cells(&[7, 6, 5, 4]));
        assert!(!mv.turned_to_center);
    }

    #[test]
    fn only_one_detour_per_move() {
        // Enters at 25, leaves at 5 and keeps going on the ring past 15.
        let mv = compute_path(FieldIndex(24), 20, false, true, None).unwrap();
        assert!(mv.turned_to_center);
        assert_eq!(mv.path[..11], cells(&[25, 56, 55, 54, 53, 44, 52, 51, 50, 49, 5])[..]);
        assert_eq!(mv.path.last(), Some(&FieldIndex(14)));
        assert_eq!(mv.path.len(), 20);
    }

    #[test]
    fn inward_direction_of_spoke_cells() {
        assert_eq!(inward_direction(FieldIndex(49)), Some(Direction::Down));
        assert_eq!(inward_direction(FieldIndex(56)), Some(Direction::Up));
        assert_eq!(inward_direction(FieldIndex(40)), Some(Direction::Right));
        assert_eq!(inward_direction(FieldIndex(48)), Some(Direction::Left));
        assert_eq!(inward_direction(FieldIndex::START), None);
        assert_eq!(inward_direction(FieldIndex(3)), None);
    }

    #[test]
    fn exhaustive_path_properties() {
        for from in 0..57u8 {
            for steps in 1..=12u8 {
                for backward in [false, true] {
                    for prefer in [false, true] {
                        let dirs: &[Option<Direction>] = if FieldIndex(from).is_spoke() {
                            &[
                                Some(Direction::Up),
                                Some(Direction::Down),
                                Some(Direction::Left),
                                Some(Direction::Right),
                            ]
                        } else {
                            &[None]
                        };
                        for &dir in dirs {
                            // Not every facing is meaningful on every spoke cell.
                            let Ok(mv) = compute_path(FieldIndex(from), steps, backward, prefer, dir)
                            else {
                                continue;
                            };
                            assert_eq!(mv.path.len(), steps as usize);
                            assert!(mv.path.iter().all(|c| c.is_valid()));
                            assert_eq!(mv.passed_start, mv.path.contains(&FieldIndex::START));
                        }
                    }
                }
            }
        }
    }
}
