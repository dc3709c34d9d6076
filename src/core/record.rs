use crate::core::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One untyped item from the upstream `realtimePositionList`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPositionItem {
    pub data: Map<String, Value>,
}

impl RawPositionItem {
    pub fn with_data(data: Map<String, Value>) -> Self {
        Self { data }
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.data.insert(name.into(), value);
    }

    /// JSON `null` counts as absent.
    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.data.get(name).filter(|v| !v.is_null())
    }

    fn text(&self, name: &str) -> Option<String> {
        self.get_field(name).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    fn integer(&self, name: &'static str) -> Result<Option<i32>> {
        let Some(value) = self.get_field(name) else {
            return Ok(None);
        };

        let parsed = match value {
            Value::String(s) => s.trim().parse::<i32>().ok(),
            Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            _ => None,
        };

        parsed.map(Some).ok_or_else(|| PipelineError::Mapping {
            field: name,
            value: value.to_string(),
        })
    }
}

/// Upstream keys of the realtime position feed.
pub mod keys {
    pub const LINE_ID: &str = "subwayId";
    pub const LINE_NAME: &str = "subwayNm";
    pub const STATION_ID: &str = "statnId";
    pub const STATION_NAME: &str = "statnNm";
    pub const TRAIN_NUMBER: &str = "trainNo";
    pub const LAST_RECEIVED_DATE: &str = "lastRecptnDt";
    pub const LAST_RECEIVED_TIME: &str = "recptnDt";
    pub const DIRECTION: &str = "updnLine";
    pub const DESTINATION_STATION_ID: &str = "statnTid";
    pub const DESTINATION_STATION_NAME: &str = "statnTnm";
    pub const TRAIN_STATUS: &str = "trainSttus";
    pub const EXPRESS: &str = "directAt";
    pub const LAST_TRAIN: &str = "lstcarAt";
}

/// Normalized row for the positions table. Column names are the serialized field names;
/// the store fills in its own insertion timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPosition {
    pub line_id: Option<String>,
    pub line_name: Option<String>,
    pub station_id: Option<String>,
    pub station_name: Option<String>,
    pub train_number: Option<String>,
    pub last_received_date: Option<String>,
    pub last_received_time: Option<String>,
    pub direction_type: Option<i32>,
    pub destination_station_id: Option<String>,
    pub destination_station_name: Option<String>,
    pub train_status: Option<i32>,
    pub is_express: Option<i32>,
    pub is_last_train: bool,
}

impl TryFrom<&RawPositionItem> for CanonicalPosition {
    type Error = PipelineError;

    fn try_from(item: &RawPositionItem) -> Result<Self> {
        Ok(Self {
            line_id: item.text(keys::LINE_ID),
            line_name: item.text(keys::LINE_NAME),
            station_id: item.text(keys::STATION_ID),
            station_name: item.text(keys::STATION_NAME),
            train_number: item.text(keys::TRAIN_NUMBER),
            last_received_date: item.text(keys::LAST_RECEIVED_DATE),
            last_received_time: item.text(keys::LAST_RECEIVED_TIME),
            direction_type: item.integer(keys::DIRECTION)?,
            destination_station_id: item.text(keys::DESTINATION_STATION_ID),
            destination_station_name: item.text(keys::DESTINATION_STATION_NAME),
            train_status: item.integer(keys::TRAIN_STATUS)?,
            is_express: item.integer(keys::EXPRESS)?,
            is_last_train: item.integer(keys::LAST_TRAIN)? == Some(1),
        })
    }
}

/// Maps every item, dropping (and logging) the ones that fail coercion.
pub fn map_items(line: &str, items: &[RawPositionItem]) -> Vec<CanonicalPosition> {
    items
        .iter()
        .filter_map(|item| match CanonicalPosition::try_from(item) {
            Ok(position) => Some(position),
            Err(e) => {
                tracing::warn!(line = %line, error = %e, "rejected position item");
                None
            }
        })
        .collect()
}
