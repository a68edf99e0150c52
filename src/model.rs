use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;


/// One row of a result page, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;


/// Server-side handle for one query execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: String,
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), submitted_at: Utc::now() }
    }
}

/// Body of a successful submission.
#[derive(Debug, Deserialize)]
pub struct JobHandle {
    pub id: String,
}


#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobState {
    Pending,
    Queued,
    Planning,
    Running,
    Completed,
    Cancelled,
    Failed,
    /// Any state the server reports that we have no name for.
    /// Never terminal.
    Other(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Queued => "QUEUED",
            Self::Planning => "PLANNING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELED",
            Self::Failed => "FAILED",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for JobState {
    fn from(name: String) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "PENDING" | "NOT_SUBMITTED" | "STARTING" | "ENGINE_START" => Self::Pending,
            "QUEUED" | "ENQUEUED" => Self::Queued,
            "PLANNING" | "METADATA_RETRIEVAL" | "EXECUTION_PLANNING" => Self::Planning,
            "RUNNING" => Self::Running,
            "COMPLETED" => Self::Completed,
            "CANCELED" | "CANCELLED" => Self::Cancelled,
            "FAILED" => Self::Failed,
            _ => Self::Other(name),
        }
    }
}

impl From<JobState> for String {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Other(name) => name,
            state => state.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(rename = "jobState")]
    pub state: JobState,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl JobStatus {
    pub fn new(state: JobState) -> Self {
        Self { state, row_count: None, error_message: None }
    }

    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.row_count = Some(row_count);
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: FieldType,
}

/// Column type as reported in a result schema.
///
/// Nested types carry the schema of their children.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFieldType", into = "RawFieldType")]
pub enum FieldType {
    Struct(Vec<Field>),
    List(Vec<Field>),
    Union(Vec<Field>),
    Integer,
    BigInt,
    Float,
    Double,
    Varchar,
    Varbinary,
    Boolean,
    Decimal { precision: u32, scale: u32 },
    Time,
    Date,
    Timestamp,
    IntervalDayToSecond,
    IntervalYearToMonth,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Struct(_) => "STRUCT",
            Self::List(_) => "LIST",
            Self::Union(_) => "UNION",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Varchar => "VARCHAR",
            Self::Varbinary => "VARBINARY",
            Self::Boolean => "BOOLEAN",
            Self::Decimal { .. } => "DECIMAL",
            Self::Time => "TIME",
            Self::Date => "DATE",
            Self::Timestamp => "TIMESTAMP",
            Self::IntervalDayToSecond => "INTERVAL DAY TO SECOND",
            Self::IntervalYearToMonth => "INTERVAL YEAR TO MONTH",
        }
    }

    pub fn sub_schema(&self) -> Option<&[Field]> {
        match self {
            Self::Struct(fields) | Self::List(fields) | Self::Union(fields) => Some(fields),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decimal { precision, scale } => write!(f, "DECIMAL({precision},{scale})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Wire shape: `{"name": "DECIMAL", "precision": 10, "scale": 2}`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFieldType {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scale: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sub_schema: Vec<Field>,
}

impl TryFrom<RawFieldType> for FieldType {
    type Error = String;

    fn try_from(raw: RawFieldType) -> Result<Self, Self::Error> {
        let field_type = match raw.name.as_str() {
            "STRUCT" => Self::Struct(raw.sub_schema),
            "LIST" => Self::List(raw.sub_schema),
            "UNION" => Self::Union(raw.sub_schema),
            "INTEGER" => Self::Integer,
            "BIGINT" => Self::BigInt,
            "FLOAT" => Self::Float,
            "DOUBLE" => Self::Double,
            "VARCHAR" => Self::Varchar,
            "VARBINARY" => Self::Varbinary,
            "BOOLEAN" => Self::Boolean,
            "DECIMAL" => Self::Decimal {
                precision: raw.precision.unwrap_or(38),
                scale: raw.scale.unwrap_or(0),
            },
            "TIME" => Self::Time,
            "DATE" => Self::Date,
            "TIMESTAMP" => Self::Timestamp,
            "INTERVAL DAY TO SECOND" => Self::IntervalDayToSecond,
            "INTERVAL YEAR TO MONTH" => Self::IntervalYearToMonth,
            other => return Err(format!("Unknown field type: '{other}'")),
        };
        Ok(field_type)
    }
}

impl From<FieldType> for RawFieldType {
    fn from(field_type: FieldType) -> Self {
        let name = field_type.name().to_string();
        match field_type {
            FieldType::Struct(sub_schema) | FieldType::List(sub_schema) | FieldType::Union(sub_schema) => {
                Self { name, sub_schema, ..Default::default() }
            }
            FieldType::Decimal { precision, scale } => Self {
                name,
                precision: Some(precision),
                scale: Some(scale),
                ..Default::default()
            },
            _ => Self { name, ..Default::default() },
        }
    }
}


/// One window of a completed job's results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPage {
    #[serde(default)]
    pub row_count: u64,
    #[serde(default)]
    pub schema: Vec<Field>,
    #[serde(default)]
    pub rows: Vec<Row>,
}
