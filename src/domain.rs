use crate::constants::{DEFAULT_LIMIT, DEFAULT_OFFSET};
use crate::error::{Result, RiskError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle label of a risk. Only these four labels are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Open,
    Closed,
    Accepted,
    Investigating,
}

impl State {
    pub const ALL: [State; 4] = [
        State::Open,
        State::Closed,
        State::Accepted,
        State::Investigating,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            State::Open => "open",
            State::Closed => "closed",
            State::Accepted => "accepted",
            State::Investigating => "investigating",
        }
    }

    /// Membership test against the fixed set of labels. Case-sensitive.
    pub fn is_valid(label: &str) -> bool {
        Self::ALL.iter().any(|state| state.as_str() == label)
    }
}

impl FromStr for State {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| RiskError::Validation(format!("unknown risk state '{s}'")))
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored risk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    pub id: Uuid,
    pub state: State,
    pub title: String,
    pub description: String,
}

/// Body of a create request.
///
/// The state stays a raw string here so that an unknown label is reported by
/// the service as a validation failure instead of a decode failure. A client
/// supplied `id` is accepted on the wire and then discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskDraft {
    pub id: Option<Uuid>,
    pub state: String,
    pub title: String,
    pub description: String,
}

impl RiskDraft {
    pub fn new(
        state: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            state: state.into(),
            title: title.into(),
            description: description.into(),
        }
    }

    /// Validate the state label and build the record under the given id.
    pub fn into_risk(self, id: Uuid) -> Result<Risk> {
        let state = self.state.parse::<State>()?;
        Ok(Risk {
            id,
            state,
            title: self.title,
            description: self.description,
        })
    }
}

/// Columns a listing may be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    Id,
    #[default]
    Title,
    Description,
    State,
}

impl SortColumn {
    /// Column name as it appears in the `risks` table.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::Title => "title",
            SortColumn::Description => "description",
            SortColumn::State => "state",
        }
    }
}

impl FromStr for SortColumn {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "id" => Ok(SortColumn::Id),
            "title" => Ok(SortColumn::Title),
            "description" => Ok(SortColumn::Description),
            "state" => Ok(SortColumn::State),
            other => Err(RiskError::Validation(format!(
                "cannot sort by '{other}', expected one of id, title, description, state"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything other than exactly `desc` sorts ascending.
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Pagination and ordering for a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    pub offset: i64,
    pub limit: i64,
    pub sort_by: SortColumn,
    pub sort_order: SortOrder,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            offset: DEFAULT_OFFSET,
            limit: DEFAULT_LIMIT,
            sort_by: SortColumn::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl Options {
    /// Bring offset and limit back into range: negative offsets become 0 and
    /// a non-positive limit falls back to the default page size.
    pub fn clamped(mut self) -> Self {
        if self.offset < 0 {
            self.offset = DEFAULT_OFFSET;
        }
        if self.limit <= 0 {
            self.limit = DEFAULT_LIMIT;
        }
        self
    }
}

/// One page of risks plus the size of the whole collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginatedResponse {
    #[serde(rename = "totalCount")]
    pub total_count: i64,
    pub risks: Vec<Risk>,
}
