//! Room/usage classification of transactions.
//!
//! Classification walks [`CATEGORY_RULES`] in order and the first rule that answers wins.
//! The order is part of the contract: building-type rules outrank room counts, so a
//! storefront with three rooms is still a storefront.

use crate::types::{RoomCategory, Transaction};

/// Area above which a zero-room residential unit is treated as an unpartitioned shell.
pub const SHELL_AREA_THRESHOLD_PING: f64 = 35.0;

/// One step of the classification chain.
pub struct CategoryRule {
    pub name: &'static str,
    pub classify: fn(&Transaction) -> Option<RoomCategory>,
}

pub static CATEGORY_RULES: [CategoryRule; 5] = [
    CategoryRule {
        name: "storefront",
        classify: storefront,
    },
    CategoryRule {
        name: "industrial",
        classify: industrial,
    },
    CategoryRule {
        name: "office",
        classify: office,
    },
    CategoryRule {
        name: "zero-room residential",
        classify: zero_room_residential,
    },
    CategoryRule {
        name: "room count",
        classify: room_count,
    },
];

/// Classify a transaction. Total and deterministic; unmatched records are `Other`.
pub fn categorize(tx: &Transaction) -> RoomCategory {
    CATEGORY_RULES
        .iter()
        .find_map(|rule| (rule.classify)(tx))
        .unwrap_or(RoomCategory::Other)
}

/// Name of the rule that decided `tx`, `None` for the `Other` fallback.
pub fn deciding_rule(tx: &Transaction) -> Option<&'static str> {
    CATEGORY_RULES
        .iter()
        .find(|rule| (rule.classify)(tx).is_some())
        .map(|rule| rule.name)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn storefront(tx: &Transaction) -> Option<RoomCategory> {
    contains_any(&tx.building_type, &["店舖", "店面"]).then_some(RoomCategory::Storefront)
}

fn industrial(tx: &Transaction) -> Option<RoomCategory> {
    contains_any(&tx.building_type, &["工廠", "倉庫", "廠辦"])
        .then_some(RoomCategory::IndustrialWarehouse)
}

fn office(tx: &Transaction) -> Option<RoomCategory> {
    (tx.main_purpose.contains("商業") || contains_any(&tx.building_type, &["辦公", "事務所"]))
        .then_some(RoomCategory::Office)
}

fn zero_room_residential(tx: &Transaction) -> Option<RoomCategory> {
    let residential = contains_any(&tx.building_type, &["住宅大樓", "華廈"]);
    if !residential || tx.room_count != Some(0) {
        return None;
    }
    if tx.house_area_ping > SHELL_AREA_THRESHOLD_PING {
        Some(RoomCategory::Shell)
    } else {
        Some(RoomCategory::Studio)
    }
}

fn room_count(tx: &Transaction) -> Option<RoomCategory> {
    match tx.room_count? {
        1 => Some(RoomCategory::OneRoom),
        2 => Some(RoomCategory::TwoRoom),
        3 => Some(RoomCategory::ThreeRoom),
        4 => Some(RoomCategory::FourRoom),
        n if n >= 5 => Some(RoomCategory::FiveRoomPlus),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unit(building_type: &str, rooms: Option<u32>, area: f64) -> Transaction {
        Transaction {
            building_type: building_type.to_string(),
            main_purpose: "住家用".to_string(),
            room_count: rooms,
            house_area_ping: area,
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_room_split_by_area() {
        assert_eq!(categorize(&unit("住宅大樓", Some(0), 40.0)), RoomCategory::Shell);
        assert_eq!(categorize(&unit("住宅大樓", Some(0), 20.0)), RoomCategory::Studio);
        assert_eq!(categorize(&unit("華廈", Some(0), 35.0)), RoomCategory::Studio);
    }

    #[test]
    fn test_building_type_outranks_rooms() {
        assert_eq!(categorize(&unit("店舖", Some(3), 30.0)), RoomCategory::Storefront);
        assert_eq!(categorize(&unit("店面", None, 30.0)), RoomCategory::Storefront);
        assert_eq!(
            categorize(&unit("廠辦", Some(2), 30.0)),
            RoomCategory::IndustrialWarehouse
        );
        assert_eq!(categorize(&unit("辦公商業大樓", Some(1), 30.0)), RoomCategory::Office);
        assert_eq!(deciding_rule(&unit("店舖", Some(3), 30.0)), Some("storefront"));
    }

    #[test]
    fn test_commercial_purpose_is_office() {
        let mut tx = unit("住宅大樓", Some(2), 30.0);
        tx.main_purpose = "商業用".to_string();
        assert_eq!(categorize(&tx), RoomCategory::Office);
    }

    #[test]
    fn test_room_counts() {
        let expected = [
            (1, RoomCategory::OneRoom),
            (2, RoomCategory::TwoRoom),
            (3, RoomCategory::ThreeRoom),
            (4, RoomCategory::FourRoom),
            (5, RoomCategory::FiveRoomPlus),
            (9, RoomCategory::FiveRoomPlus),
        ];
        for (rooms, category) in expected {
            assert_eq!(categorize(&unit("住宅大樓", Some(rooms), 30.0)), category);
        }
    }

    #[test]
    fn test_fallback_is_other() {
        assert_eq!(categorize(&unit("住宅大樓", None, 30.0)), RoomCategory::Other);
        // zero rooms outside a residential tower matches no rule
        assert_eq!(categorize(&unit("透天厝", Some(0), 50.0)), RoomCategory::Other);
        assert_eq!(deciding_rule(&unit("透天厝", Some(0), 50.0)), None);
    }

    #[test]
    fn test_categorize_is_deterministic() {
        let tx = unit("華廈", Some(3), 28.0);
        assert_eq!(categorize(&tx), categorize(&tx));
    }
}
