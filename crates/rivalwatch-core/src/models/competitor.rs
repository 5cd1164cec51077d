use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{CoreError, CoreErrorKind, CoreResult};

/// Keys tried, in order, when resolving a record's display name.
const NAME_KEYS: [&str; 3] = ["name", "brandName", "companyName"];

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompetitorId(pub u64);

impl Display for CompetitorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One company as it appears in a snapshot: a numeric id plus an open set of
/// fields. Serialized as a single flat JSON object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompetitorRecord {
    pub id: CompetitorId,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl CompetitorRecord {
    pub fn new(id: u64) -> Self {
        Self {
            id: CompetitorId(id),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn display_name(&self) -> String {
        NAME_KEYS
            .iter()
            .filter_map(|key| self.fields.get(*key))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", self.id))
    }

    pub fn to_value(&self) -> Value {
        let mut object = serde_json::Map::new();
        object.insert("id".to_string(), Value::from(self.id.0));
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// Parses a snapshot document: a JSON array of competitor records.
pub fn parse_snapshot(raw: &str) -> CoreResult<Vec<CompetitorRecord>> {
    serde_json::from_str(raw).map_err(|error| {
        CoreError::new(
            CoreErrorKind::ParseFailure,
            format!("invalid competitor snapshot: {error}"),
        )
    })
}
