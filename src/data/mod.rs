use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod sorting;

/// Canonical flat record every fetched issue/PR is normalized into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub number: u64,
    pub url: String,
    pub kind: RecordKind,
    pub title: String,
    pub state: RecordState,
    pub body: String,
    /// Repository identifier, e.g. "acme/widgets"
    pub repository: String,
    pub author: String,
    /// Employer string, else first organization membership, else empty
    pub affiliation: String,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub closed: Option<DateTime<Utc>>,
    pub merged: Option<DateTime<Utc>>,
    pub labels: Vec<Label>,
    pub reactions: Reactions,
    pub comments: u32,
    pub draft: bool,
    pub linked_prs: Vec<LinkedPr>,
    pub sub_issues: Vec<SubIssue>,
    /// Flattened project-board fields, keyed by the field's display name.
    /// Kept as a side-mapping so built-in fields always win name collisions.
    pub board_fields: BTreeMap<String, FieldValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    Issue,
    PullRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    Open,
    Closed,
    Merged,
}

impl RecordState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Merged => "merged",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

/// A pull request cross-referenced from an issue's timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedPr {
    pub number: u64,
    pub url: String,
    pub state: RecordState,
    pub merged: bool,
    /// True when merging this PR will close the referencing issue.
    pub will_close: bool,
}

/// A tracked sub-issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubIssue {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub updated: Option<DateTime<Utc>>,
    pub state: RecordState,
}

/// Reaction counts for the eight fixed GitHub categories.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Reactions {
    pub thumbs_up: u32,
    pub thumbs_down: u32,
    pub laugh: u32,
    pub hooray: u32,
    pub confused: u32,
    pub heart: u32,
    pub rocket: u32,
    pub eyes: u32,
}

impl Reactions {
    /// Fixed priority order used for rendering and per-category columns.
    pub const CATEGORIES: [(&'static str, &'static str); 8] = [
        ("thumbsup", "\u{1F44D}"),
        ("thumbsdown", "\u{1F44E}"),
        ("laugh", "\u{1F604}"),
        ("hooray", "\u{1F389}"),
        ("confused", "\u{1F615}"),
        ("heart", "\u{2764}\u{FE0F}"),
        ("rocket", "\u{1F680}"),
        ("eyes", "\u{1F440}"),
    ];

    pub fn get(&self, category: &str) -> Option<u32> {
        match category {
            "thumbsup" => Some(self.thumbs_up),
            "thumbsdown" => Some(self.thumbs_down),
            "laugh" => Some(self.laugh),
            "hooray" => Some(self.hooray),
            "confused" => Some(self.confused),
            "heart" => Some(self.heart),
            "rocket" => Some(self.rocket),
            "eyes" => Some(self.eyes),
            _ => None,
        }
    }

    /// Total across all categories ("interactions").
    pub fn total(&self) -> u32 {
        self.thumbs_up
            + self.thumbs_down
            + self.laugh
            + self.hooray
            + self.confused
            + self.heart
            + self.rocket
            + self.eyes
    }
}

/// A scalar field value resolved off a record, for sorting and templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Str(String),
    Num(f64),
    Time(DateTime<Utc>),
    Bool(bool),
}

impl FieldValue {
    /// Plain-text rendering used by templates and raw-field columns.
    pub fn display(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Num(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Self::Time(t) => t.format("%Y-%m-%d").to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

impl Record {
    /// Resolve a field by name: built-in fields first, then board fields.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        if let Some(v) = self.builtin_field(name) {
            return Some(v);
        }
        self.board_fields.get(name).cloned()
    }

    fn builtin_field(&self, name: &str) -> Option<FieldValue> {
        if let Some(category) = name.strip_prefix("reactions_") {
            return self
                .reactions
                .get(category)
                .map(|c| FieldValue::Num(c as f64));
        }
        match name {
            "number" => Some(FieldValue::Num(self.number as f64)),
            "url" => Some(FieldValue::Str(self.url.clone())),
            "title" => Some(FieldValue::Str(self.title.clone())),
            "state" => Some(FieldValue::Str(self.state.label().to_string())),
            "body" => Some(FieldValue::Str(self.body.clone())),
            "repository" => Some(FieldValue::Str(self.repository.clone())),
            "author" => Some(FieldValue::Str(self.author.clone())),
            "affiliation" => Some(FieldValue::Str(self.affiliation.clone())),
            "created" => self.created.map(FieldValue::Time),
            "updated" => self.updated.map(FieldValue::Time),
            "closed" => self.closed.map(FieldValue::Time),
            "merged" => self.merged.map(FieldValue::Time),
            "comments" => Some(FieldValue::Num(self.comments as f64)),
            "reactions" | "interactions" => Some(FieldValue::Num(self.reactions.total() as f64)),
            "draft" => Some(FieldValue::Bool(self.draft)),
            _ => None,
        }
    }

    /// Linked PRs whose merge will close this record.
    pub fn closing_prs(&self) -> Vec<&LinkedPr> {
        self.linked_prs.iter().filter(|pr| pr.will_close).collect()
    }

    /// Records missing identity fields are dropped before sort/render.
    pub fn is_renderable(&self) -> bool {
        self.number != 0 && !self.url.is_empty() && !self.title.is_empty()
    }
}

// =============================================================================
// Sort specification
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// One (field, direction) sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

/// Ordered multi-key sort specification.
pub type SortSpec = Vec<SortKey>;

/// Parse a comma-separated `field-direction` list, e.g.
/// `"reactions-desc,updated-asc"`. Direction defaults to desc when omitted.
pub fn parse_sort_spec(raw: &str) -> SortSpec {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|part| {
            if let Some(field) = part.strip_suffix("-desc") {
                SortKey {
                    field: field.to_string(),
                    direction: Direction::Desc,
                }
            } else if let Some(field) = part.strip_suffix("-asc") {
                SortKey {
                    field: field.to_string(),
                    direction: Direction::Asc,
                }
            } else {
                SortKey {
                    field: part.to_string(),
                    direction: Direction::Desc,
                }
            }
        })
        .collect()
}

/// Render a sort spec back into its `field-direction` list form.
/// Used for cache keys, which must distinguish fetches by requested sort.
pub fn sort_spec_display(spec: &[SortKey]) -> String {
    spec.iter()
        .map(|key| {
            let dir = match key.direction {
                Direction::Asc => "asc",
                Direction::Desc => "desc",
            };
            format!("{}-{}", key.field, dir)
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record {
            number: 7,
            url: "https://github.com/acme/widgets/issues/7".to_string(),
            kind: RecordKind::Issue,
            title: "Widget breaks".to_string(),
            state: RecordState::Open,
            body: String::new(),
            repository: "acme/widgets".to_string(),
            author: "alice".to_string(),
            affiliation: "Acme".to_string(),
            created: None,
            updated: None,
            closed: None,
            merged: None,
            labels: vec![],
            reactions: Reactions {
                thumbs_up: 3,
                eyes: 1,
                ..Default::default()
            },
            comments: 2,
            draft: false,
            linked_prs: vec![],
            sub_issues: vec![],
            board_fields: BTreeMap::new(),
        }
    }

    #[test]
    fn test_builtin_field_lookup() {
        let r = record();
        assert_eq!(
            r.field("title"),
            Some(FieldValue::Str("Widget breaks".into()))
        );
        assert_eq!(r.field("reactions"), Some(FieldValue::Num(4.0)));
        assert_eq!(r.field("reactions_thumbsup"), Some(FieldValue::Num(3.0)));
        assert_eq!(r.field("closed"), None);
        assert_eq!(r.field("no_such_field"), None);
    }

    #[test]
    fn test_board_field_shadowed_by_builtin() {
        let mut r = record();
        r.board_fields
            .insert("title".to_string(), FieldValue::Str("Board title".into()));
        r.board_fields
            .insert("Status".to_string(), FieldValue::Str("In progress".into()));

        // Built-in wins the collision; board-only names resolve.
        assert_eq!(
            r.field("title"),
            Some(FieldValue::Str("Widget breaks".into()))
        );
        assert_eq!(r.field("Status"), Some(FieldValue::Str("In progress".into())));
    }

    #[test]
    fn test_parse_sort_spec_defaults_desc() {
        let spec = parse_sort_spec("reactions,updated-asc");
        assert_eq!(spec.len(), 2);
        assert_eq!(spec[0].field, "reactions");
        assert_eq!(spec[0].direction, Direction::Desc);
        assert_eq!(spec[1].field, "updated");
        assert_eq!(spec[1].direction, Direction::Asc);
    }

    #[test]
    fn test_sort_spec_display_roundtrip() {
        let spec = parse_sort_spec("comments-asc,created-desc");
        assert_eq!(sort_spec_display(&spec), "comments-asc,created-desc");
    }
}
