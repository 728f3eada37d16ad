use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of an [`Attribute`](super::Attribute) value.
///
/// Values are stored uniformly as text; this tag only drives how the value is
/// presented and parsed at the edges. The data layer does not reject a value
/// that fails to parse under its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Json,
}

impl DataType {
    pub const ALL: [DataType; 7] = [
        DataType::String,
        DataType::Integer,
        DataType::Float,
        DataType::Boolean,
        DataType::Date,
        DataType::DateTime,
        DataType::Json,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::DateTime => "datetime",
            DataType::Json => "json",
        }
    }

    /// Parses a stored text value into a typed JSON value for presentation.
    ///
    /// Booleans use the literal strings `"true"`/`"false"`. Returns an error
    /// message when the text does not conform to the declared type; callers
    /// decide whether to surface or ignore it.
    pub fn parse_value(self, raw: &str) -> Result<Value, String> {
        match self {
            DataType::String => Ok(Value::String(raw.to_string())),
            DataType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("'{raw}' is not an integer")),
            DataType::Float => raw
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| format!("'{raw}' is not a float")),
            DataType::Boolean => match raw.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(format!("'{raw}' is not 'true' or 'false'")),
            },
            DataType::Date => chrono::NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map(|d| Value::String(d.to_string()))
                .map_err(|_| format!("'{raw}' is not a YYYY-MM-DD date")),
            DataType::DateTime => chrono::DateTime::parse_from_rfc3339(raw.trim())
                .map(|dt| Value::String(dt.to_rfc3339()))
                .map_err(|_| format!("'{raw}' is not an RFC 3339 datetime")),
            DataType::Json => {
                serde_json::from_str(raw).map_err(|_| format!("'{raw}' is not valid JSON"))
            }
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("unknown data type '{s}'"))
    }
}
