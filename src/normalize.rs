//! Normalization of raw GraphQL item payloads into canonical [`Record`]s.
//!
//! Handles both shapes: search nodes (the issue/PR object itself) and board
//! items (`{fieldValues, content}`). Items missing number, title, or url are
//! dropped here; board items can reference non-issue content.

use crate::data::{
    FieldValue, Label, LinkedPr, Reactions, Record, RecordKind, RecordState, SubIssue,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Normalize a batch, applying the drop policy.
pub fn normalize_items(items: &[Value], board: bool) -> Vec<Record> {
    items
        .iter()
        .filter_map(|item| normalize(item, board))
        .collect()
}

/// Normalize one raw item. `None` when the item fails the identity invariant.
pub fn normalize(raw: &Value, board: bool) -> Option<Record> {
    let (content, board_fields) = if board {
        (&raw["content"], flatten_board_fields(raw))
    } else {
        (raw, BTreeMap::new())
    };

    let number = content["number"].as_u64()?;
    let title = content["title"].as_str().unwrap_or("").to_string();
    let url = content["url"].as_str().unwrap_or("").to_string();
    if number == 0 || title.is_empty() || url.is_empty() {
        return None;
    }

    let kind = match content["__typename"].as_str() {
        Some("PullRequest") => RecordKind::PullRequest,
        _ => RecordKind::Issue,
    };

    let merged = parse_time(&content["mergedAt"]);
    let state = match content["state"].as_str() {
        Some("MERGED") => RecordState::Merged,
        Some("CLOSED") => {
            if merged.is_some() {
                RecordState::Merged
            } else {
                RecordState::Closed
            }
        }
        _ => RecordState::Open,
    };

    Some(Record {
        number,
        url,
        kind,
        title,
        state,
        body: content["body"].as_str().unwrap_or("").to_string(),
        repository: content["repository"]["nameWithOwner"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        author: content["author"]["login"].as_str().unwrap_or("").to_string(),
        affiliation: affiliation(&content["author"]),
        created: parse_time(&content["createdAt"]),
        updated: parse_time(&content["updatedAt"]),
        closed: parse_time(&content["closedAt"]),
        merged,
        labels: labels(content),
        reactions: reactions(content),
        comments: content["comments"]["totalCount"].as_u64().unwrap_or(0) as u32,
        draft: content["isDraft"].as_bool().unwrap_or(false),
        linked_prs: linked_prs(content),
        sub_issues: sub_issues(content),
        board_fields,
    })
}

fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Declared employer string, else first listed organization, else empty.
fn affiliation(author: &Value) -> String {
    if let Some(company) = author["company"].as_str() {
        let company = company.trim();
        if !company.is_empty() {
            return company.trim_start_matches('@').to_string();
        }
    }
    let orgs = author["organizations"]["nodes"].as_array();
    if let Some(first) = orgs.and_then(|nodes| nodes.first()) {
        if let Some(name) = first["name"].as_str().or_else(|| first["login"].as_str()) {
            return name.to_string();
        }
    }
    String::new()
}

fn labels(content: &Value) -> Vec<Label> {
    content["labels"]["nodes"]
        .as_array()
        .map(|nodes| {
            nodes
                .iter()
                .filter_map(|n| n["name"].as_str())
                .map(|name| Label {
                    name: name.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn reactions(content: &Value) -> Reactions {
    let mut out = Reactions::default();
    let Some(groups) = content["reactionGroups"].as_array() else {
        return out;
    };
    for group in groups {
        let count = group["reactors"]["totalCount"].as_u64().unwrap_or(0) as u32;
        match group["content"].as_str() {
            Some("THUMBS_UP") => out.thumbs_up = count,
            Some("THUMBS_DOWN") => out.thumbs_down = count,
            Some("LAUGH") => out.laugh = count,
            Some("HOORAY") => out.hooray = count,
            Some("CONFUSED") => out.confused = count,
            Some("HEART") => out.heart = count,
            Some("ROCKET") => out.rocket = count,
            Some("EYES") => out.eyes = count,
            _ => {}
        }
    }
    out
}

/// Cross-referenced PRs from the timeline. Merged is derived from the merge
/// timestamp; willClose from the event's closes-target flag.
fn linked_prs(content: &Value) -> Vec<LinkedPr> {
    content["timelineItems"]["nodes"]
        .as_array()
        .map(|nodes| {
            nodes
                .iter()
                .filter_map(|event| {
                    let source = &event["source"];
                    let number = source["number"].as_u64()?;
                    let merged_at = parse_time(&source["mergedAt"]);
                    let state = match source["state"].as_str() {
                        Some("MERGED") => RecordState::Merged,
                        Some("CLOSED") => RecordState::Closed,
                        _ => RecordState::Open,
                    };
                    Some(LinkedPr {
                        number,
                        url: source["url"].as_str().unwrap_or("").to_string(),
                        state,
                        merged: merged_at.is_some() || state == RecordState::Merged,
                        will_close: event["willCloseTarget"].as_bool().unwrap_or(false),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn sub_issues(content: &Value) -> Vec<SubIssue> {
    content["subIssues"]["nodes"]
        .as_array()
        .map(|nodes| {
            nodes
                .iter()
                .filter_map(|n| {
                    Some(SubIssue {
                        number: n["number"].as_u64()?,
                        title: n["title"].as_str().unwrap_or("").to_string(),
                        url: n["url"].as_str().unwrap_or("").to_string(),
                        updated: parse_time(&n["updatedAt"]),
                        state: match n["state"].as_str() {
                            Some("CLOSED") => RecordState::Closed,
                            _ => RecordState::Open,
                        },
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Hoist board field values into a flat side-mapping keyed by display name.
/// Exactly one scalar is populated per field value.
fn flatten_board_fields(raw: &Value) -> BTreeMap<String, FieldValue> {
    let mut out = BTreeMap::new();
    let Some(nodes) = raw["fieldValues"]["nodes"].as_array() else {
        return out;
    };
    for value in nodes {
        let Some(name) = value["field"]["name"].as_str() else {
            continue;
        };
        let field_value = if let Some(text) = value["text"].as_str() {
            FieldValue::Str(text.to_string())
        } else if let Some(option) = value["name"].as_str() {
            FieldValue::Str(option.to_string())
        } else if let Some(number) = value["number"].as_f64() {
            FieldValue::Num(number)
        } else if let Some(date) = value["date"].as_str() {
            match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
                Ok(d) => FieldValue::Time(DateTime::from_naive_utc_and_offset(
                    d.and_hms_opt(0, 0, 0).unwrap_or_default(),
                    Utc,
                )),
                Err(_) => FieldValue::Str(date.to_string()),
            }
        } else if let Some(title) = value["title"].as_str() {
            FieldValue::Str(title.to_string())
        } else {
            continue;
        };
        out.insert(name.to_string(), field_value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue_payload() -> Value {
        json!({
            "__typename": "Issue",
            "number": 42,
            "title": "Widget breaks on load",
            "url": "https://github.com/acme/widgets/issues/42",
            "state": "OPEN",
            "body": "## Summary\nIt breaks.",
            "createdAt": "2024-01-05T10:00:00Z",
            "updatedAt": "2024-02-01T09:30:00Z",
            "closedAt": null,
            "author": {
                "login": "alice",
                "company": null,
                "organizations": {"nodes": [{"name": "Acme Corp", "login": "acme"}]}
            },
            "repository": {"nameWithOwner": "acme/widgets"},
            "labels": {"nodes": [{"name": "bug"}, {"name": "type:ui"}]},
            "comments": {"totalCount": 4},
            "reactionGroups": [
                {"content": "THUMBS_UP", "reactors": {"totalCount": 7}},
                {"content": "EYES", "reactors": {"totalCount": 2}}
            ],
            "timelineItems": {"nodes": [
                {
                    "willCloseTarget": true,
                    "source": {"number": 50, "url": "https://github.com/acme/widgets/pull/50",
                               "state": "OPEN", "mergedAt": null}
                },
                {"willCloseTarget": false, "source": {}}
            ]},
            "subIssues": {"nodes": [
                {"number": 43, "title": "Subtask", "url": "https://github.com/acme/widgets/issues/43",
                 "state": "CLOSED", "updatedAt": "2024-01-20T00:00:00Z"}
            ]}
        })
    }

    #[test]
    fn test_normalize_issue() {
        let record = normalize(&issue_payload(), false).unwrap();
        assert_eq!(record.number, 42);
        assert_eq!(record.kind, RecordKind::Issue);
        assert_eq!(record.state, RecordState::Open);
        assert_eq!(record.repository, "acme/widgets");
        assert_eq!(record.author, "alice");
        // No employer declared, so the first org membership wins.
        assert_eq!(record.affiliation, "Acme Corp");
        assert_eq!(record.reactions.thumbs_up, 7);
        assert_eq!(record.reactions.total(), 9);
        assert_eq!(record.comments, 4);
        assert_eq!(record.labels.len(), 2);
        assert!(record.created.is_some());
        assert!(record.closed.is_none());
    }

    #[test]
    fn test_affiliation_prefers_company() {
        let author = json!({
            "login": "bob",
            "company": "@widgetco",
            "organizations": {"nodes": [{"name": "Other Org"}]}
        });
        assert_eq!(affiliation(&author), "widgetco");
    }

    #[test]
    fn test_linked_pr_extraction_skips_empty_sources() {
        let record = normalize(&issue_payload(), false).unwrap();
        assert_eq!(record.linked_prs.len(), 1);
        let pr = &record.linked_prs[0];
        assert_eq!(pr.number, 50);
        assert!(pr.will_close);
        assert!(!pr.merged);
        assert_eq!(record.closing_prs().len(), 1);
    }

    #[test]
    fn test_sub_issue_extraction() {
        let record = normalize(&issue_payload(), false).unwrap();
        assert_eq!(record.sub_issues.len(), 1);
        assert_eq!(record.sub_issues[0].state, RecordState::Closed);
    }

    #[test]
    fn test_board_item_flattening_and_drop_policy() {
        let item = json!({
            "fieldValues": {"nodes": [
                {"name": "In progress", "field": {"name": "Status"}},
                {"number": 5.0, "field": {"name": "Estimate"}},
                {"date": "2024-06-01", "field": {"name": "Target"}},
                {"title": "Sprint 9", "field": {"name": "Iteration"}}
            ]},
            "content": issue_payload()
        });
        let record = normalize(&item, true).unwrap();
        assert_eq!(
            record.field("Status"),
            Some(FieldValue::Str("In progress".into()))
        );
        assert_eq!(record.field("Estimate"), Some(FieldValue::Num(5.0)));
        assert!(matches!(record.field("Target"), Some(FieldValue::Time(_))));
        assert_eq!(
            record.field("Iteration"),
            Some(FieldValue::Str("Sprint 9".into()))
        );

        // Draft board items reference no issue content and are dropped.
        let empty = json!({"fieldValues": {"nodes": []}, "content": {}});
        assert!(normalize(&empty, true).is_none());
    }

    #[test]
    fn test_merged_pr_state() {
        let mut payload = issue_payload();
        payload["__typename"] = json!("PullRequest");
        payload["state"] = json!("MERGED");
        payload["mergedAt"] = json!("2024-03-01T12:00:00Z");
        payload["isDraft"] = json!(false);

        let record = normalize(&payload, false).unwrap();
        assert_eq!(record.kind, RecordKind::PullRequest);
        assert_eq!(record.state, RecordState::Merged);
        assert!(record.merged.is_some());
    }
}
