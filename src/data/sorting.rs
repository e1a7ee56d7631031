//! Multi-key, type-aware record sorting.
//!
//! This module is the single source of truth for ordering records before
//! rendering. Comparison semantics per key:
//! - timestamp fields: compared as instants, missing sorts as earliest
//! - reaction/comment counts: compared numerically, missing counts as zero
//! - everything else: natural ordering, with absent values always after
//!   present ones regardless of direction

use super::{Direction, FieldValue, Record, SortKey};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Field classes with distinct missing-value semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Timestamp,
    Count,
    Other,
}

fn field_kind(name: &str) -> FieldKind {
    match name {
        "created" | "updated" | "closed" | "merged" => FieldKind::Timestamp,
        "comments" | "reactions" | "interactions" => FieldKind::Count,
        _ if name.starts_with("reactions_") => FieldKind::Count,
        _ => FieldKind::Other,
    }
}

/// Stable, non-mutating multi-key sort. Records tying on every key keep
/// their relative input order.
pub fn sort_records(records: &[Record], spec: &[SortKey]) -> Vec<Record> {
    let mut sorted: Vec<Record> = records.to_vec();
    sorted.sort_by(|a, b| compare_records(a, b, spec));
    sorted
}

fn compare_records(a: &Record, b: &Record, spec: &[SortKey]) -> Ordering {
    for key in spec {
        let ord = compare_by_key(a, b, key);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_by_key(a: &Record, b: &Record, key: &SortKey) -> Ordering {
    let va = a.field(&key.field);
    let vb = b.field(&key.field);

    match field_kind(&key.field) {
        FieldKind::Timestamp => {
            let ta = va.and_then(as_time).unwrap_or(DateTime::UNIX_EPOCH);
            let tb = vb.and_then(as_time).unwrap_or(DateTime::UNIX_EPOCH);
            apply_direction(ta.cmp(&tb), key.direction)
        }
        FieldKind::Count => {
            let na = va.and_then(as_num).unwrap_or(0.0);
            let nb = vb.and_then(as_num).unwrap_or(0.0);
            apply_direction(na.total_cmp(&nb), key.direction)
        }
        FieldKind::Other => match (va, vb) {
            (None, None) => Ordering::Equal,
            // Absent values sort after present ones in either direction.
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => apply_direction(natural_order(&x, &y), key.direction),
        },
    }
}

fn apply_direction(ord: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Asc => ord,
        Direction::Desc => ord.reverse(),
    }
}

fn as_time(v: FieldValue) -> Option<DateTime<Utc>> {
    match v {
        FieldValue::Time(t) => Some(t),
        _ => None,
    }
}

fn as_num(v: FieldValue) -> Option<f64> {
    match v {
        FieldValue::Num(n) => Some(n),
        _ => None,
    }
}

fn natural_order(a: &FieldValue, b: &FieldValue) -> Ordering {
    match (a, b) {
        (FieldValue::Str(x), FieldValue::Str(y)) => x.cmp(y),
        (FieldValue::Num(x), FieldValue::Num(y)) => x.total_cmp(y),
        (FieldValue::Time(x), FieldValue::Time(y)) => x.cmp(y),
        (FieldValue::Bool(x), FieldValue::Bool(y)) => x.cmp(y),
        // Mixed types (possible for board fields): fall back to text order.
        _ => a.display().cmp(&b.display()),
    }
}
