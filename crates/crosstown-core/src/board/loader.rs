use std::collections::BTreeMap;

use crosstown_protocol::{FieldIndex, FieldKind, InvestmentKind, MonopolyGroup, MonopolyId};
use serde::Deserialize;
use thiserror::Error;

use crate::board::{Board, FieldDefinition, InvestmentOption, Monopoly};

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing referenced id: {0}")]
    MissingId(String),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("field at position {position} declares index {index}")]
    FieldOutOfOrder { position: usize, index: u8 },
    #[error("field {0} is a firm without a purchase tier")]
    MissingPurchaseTier(u8),
    #[error("field {0} has an invalid investment tier layout")]
    InvalidTierLayout(u8),
    #[error("field {0} is not a firm but carries firm data")]
    UnexpectedFirmData(u8),
    #[error("cell {0} must be the start field")]
    StartMisplaced(u8),
    #[error("monopoly {0} has no members")]
    EmptyMonopoly(String),
}

pub enum BoardSource<'a> {
    Embedded,
    /// Directory holding `board.yaml` and `monopolies.yaml`.
    Path(String),
    Bytes {
        board: &'a [u8],
        monopolies: &'a [u8],
    },
}

#[derive(Debug, Deserialize)]
struct RawField {
    index: u8,
    name: String,
    kind: FieldKind,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    industry: Option<String>,
    #[serde(default)]
    investments: Vec<InvestmentOption>,
}

#[derive(Debug, Deserialize)]
struct RawSet {
    name: String,
    multiplier: u32,
}

#[derive(Debug, Deserialize)]
struct RawComposite {
    name: String,
    multiplier: u32,
    countries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawMonopolies {
    countries: BTreeMap<String, RawSet>,
    #[serde(default)]
    composites: BTreeMap<String, RawComposite>,
    #[serde(default)]
    industries: BTreeMap<String, RawSet>,
}

pub fn load_board(source: BoardSource<'_>) -> Result<Board, BoardError> {
    let (fields, monopolies) = match source {
        BoardSource::Embedded => {
            let board_yaml = include_str!("../../data/board.yaml");
            let monopolies_yaml = include_str!("../../data/monopolies.yaml");
            parse_raw(board_yaml, monopolies_yaml)?
        }
        BoardSource::Path(path) => {
            let board_yaml = std::fs::read_to_string(format!("{path}/board.yaml"))?;
            let monopolies_yaml = std::fs::read_to_string(format!("{path}/monopolies.yaml"))?;
            parse_raw(&board_yaml, &monopolies_yaml)?
        }
        BoardSource::Bytes { board, monopolies } => parse_raw(
            std::str::from_utf8(board)?,
            std::str::from_utf8(monopolies)?,
        )?,
    };

    compile_board(fields, monopolies)
}

fn parse_raw(
    board_yaml: &str,
    monopolies_yaml: &str,
) -> Result<(Vec<RawField>, RawMonopolies), BoardError> {
    let fields = serde_yaml::from_str(board_yaml)?;
    let monopolies = serde_yaml::from_str(monopolies_yaml)?;
    Ok((fields, monopolies))
}

fn compile_board(raw_fields: Vec<RawField>, raw: RawMonopolies) -> Result<Board, BoardError> {
    if raw_fields.len() != FieldIndex::COUNT {
        return Err(BoardError::FieldCount {
            expected: FieldIndex::COUNT,
            found: raw_fields.len(),
        });
    }

    let mut fields = Vec::with_capacity(raw_fields.len());
    for (position, f) in raw_fields.into_iter().enumerate() {
        if f.index as usize != position {
            return Err(BoardError::FieldOutOfOrder {
                position,
                index: f.index,
            });
        }
        validate_field(&f)?;
        fields.push(FieldDefinition {
            index: FieldIndex(f.index),
            name: f.name,
            kind: f.kind,
            country: f.country,
            industry: f.industry,
            investments: f.investments,
        });
    }

    if fields[FieldIndex::START.index()].kind != FieldKind::Start {
        return Err(BoardError::StartMisplaced(FieldIndex::START.0));
    }

    for def in &fields {
        if let Some(country) = &def.country {
            if !raw.countries.contains_key(country) {
                return Err(BoardError::MissingId(format!("country {country}")));
            }
        }
        if let Some(industry) = &def.industry {
            if !raw.industries.contains_key(industry) {
                return Err(BoardError::MissingId(format!("industry {industry}")));
            }
        }
    }

    let mut monopolies: Vec<Monopoly> = Vec::new();
    let mut push = |key: &str,
                    name: &str,
                    group: MonopolyGroup,
                    multiplier: u32,
                    members: Vec<FieldIndex>|
     -> Result<(), BoardError> {
        if members.is_empty() {
            return Err(BoardError::EmptyMonopoly(key.to_string()));
        }
        monopolies.push(Monopoly {
            id: MonopolyId::new(monopolies.len() as u16),
            key: key.to_string(),
            name: name.to_string(),
            group,
            members,
            multiplier,
        });
        Ok(())
    };

    for (key, set) in &raw.countries {
        let members = country_members(&fields, key);
        push(key, &set.name, MonopolyGroup::Country, set.multiplier, members)?;
    }
    for (key, set) in &raw.composites {
        let mut members = Vec::new();
        for country in &set.countries {
            if !raw.countries.contains_key(country) {
                return Err(BoardError::MissingId(format!("country {country} in {key}")));
            }
            members.extend(country_members(&fields, country));
        }
        members.sort();
        push(key, &set.name, MonopolyGroup::Composite, set.multiplier, members)?;
    }
    for (key, set) in &raw.industries {
        let members = industry_members(&fields, key);
        push(key, &set.name, MonopolyGroup::Industry, set.multiplier, members)?;
    }

    let mut field_monopolies = vec![Vec::new(); fields.len()];
    for monopoly in &monopolies {
        for member in &monopoly.members {
            field_monopolies[member.index()].push(monopoly.id);
        }
    }

    Ok(Board {
        fields,
        monopolies,
        field_monopolies,
    })
}

fn country_members(fields: &[FieldDefinition], key: &str) -> Vec<FieldIndex> {
    fields
        .iter()
        .filter(|f| f.country.as_deref() == Some(key))
        .map(|f| f.index)
        .collect()
}

fn industry_members(fields: &[FieldDefinition], key: &str) -> Vec<FieldIndex> {
    fields
        .iter()
        .filter(|f| f.industry.as_deref() == Some(key))
        .map(|f| f.index)
        .collect()
}

fn validate_field(f: &RawField) -> Result<(), BoardError> {
    if f.kind != FieldKind::Firm {
        if !f.investments.is_empty() || f.country.is_some() || f.industry.is_some() {
            return Err(BoardError::UnexpectedFirmData(f.index));
        }
        return Ok(());
    }

    let Some(purchase) = f.investments.first() else {
        return Err(BoardError::MissingPurchaseTier(f.index));
    };
    if purchase.kind != InvestmentKind::Regular || purchase.cost <= 0 {
        return Err(BoardError::InvalidTierLayout(f.index));
    }
    let last = f.investments.len() - 1;
    let misplaced_infinite = f
        .investments
        .iter()
        .enumerate()
        .any(|(i, tier)| tier.kind == InvestmentKind::Infinite && i != last);
    let negative = f.investments.iter().any(|t| t.cost < 0 || t.income < 0);
    if misplaced_infinite || negative {
        return Err(BoardError::InvalidTierLayout(f.index));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_board_loads() {
        let board = load_board(BoardSource::Embedded).expect("board load");
        assert_eq!(board.fields().len(), 57);
        assert_eq!(board.firms().count(), 40);
        assert_eq!(
            board.field(FieldIndex::START).map(|f| f.kind),
            Some(FieldKind::Start)
        );
        for entry in [5, 15, 25, 35] {
            assert_eq!(
                board.field(FieldIndex(entry)).map(|f| f.kind),
                Some(FieldKind::SingleChance)
            );
        }
    }

    #[test]
    fn overlapping_sets_are_indexed() {
        let board = load_board(BoardSource::Embedded).expect("board load");
        let japan = board.monopoly_by_key("japan").expect("japan");
        let asia = board.monopoly_by_key("asia").expect("asia");
        let banks = board.monopoly_by_key("banks").expect("banks");

        let sets = board.monopolies_of(FieldIndex(1));
        assert!(sets.contains(&japan.id));
        assert!(sets.contains(&asia.id));
        assert!(sets.contains(&banks.id));
        assert_eq!(sets.len(), 3);

        assert_eq!(japan.members, vec![FieldIndex(1), FieldIndex(3), FieldIndex(4)]);
        assert!(board.monopolies_of(FieldIndex(2)).is_empty());
    }

    #[test]
    fn rejects_unknown_country() {
        let mut board = String::new();
        for i in 0..57 {
            if i == 44 {
                board.push_str("- { index: 44, name: Start, kind: start }\n");
            } else if i == 1 {
                board.push_str(
                    "- index: 1\n  name: Lost\n  kind: firm\n  country: atlantis\n  investments:\n    - { kind: regular, cost: 100, income: 10 }\n",
                );
            } else {
                board.push_str(&format!("- {{ index: {i}, name: Cell, kind: chance }}\n"));
            }
        }
        let monopolies = "countries:\n  japan: { name: Japan, multiplier: 2 }\n";
        let err = load_board(BoardSource::Bytes {
            board: board.as_bytes(),
            monopolies: monopolies.as_bytes(),
        })
        .unwrap_err();
        assert!(matches!(err, BoardError::MissingId(_)));
    }

    #[test]
    fn rejects_short_board() {
        let err = load_board(BoardSource::Bytes {
            board: b"- { index: 0, name: Pip, kind: pass_bonus }\n",
            monopolies: b"countries: {}\n",
        })
        .unwrap_err();
        assert!(matches!(err, BoardError::FieldCount { found: 1, .. }));
    }
}
