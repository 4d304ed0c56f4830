//! Native values and the literal datatype coercion table
//!
//! | native            | datatype       | lexical form            |
//! |-------------------|----------------|-------------------------|
//! | `bool`            | `xsd:boolean`  | `true` / `false`        |
//! | `i64` (and ints)  | `xsd:integer`  | decimal                 |
//! | `f32`             | `xsd:float`    | shortest round-trip     |
//! | `f64`             | `xsd:double`   | shortest round-trip     |
//! | `NaiveDate`       | `xsd:date`     | `%Y-%m-%d`              |
//! | `NaiveTime`       | `xsd:time`     | `%H:%M:%S%.f`           |
//! | `DateTime`        | `xsd:dateTime` | RFC 3339                |
//! | `String` / `&str` | `xsd:string`   | verbatim                |
//!
//! Non-finite floats use the XSD spellings `NaN`, `INF` and `-INF`.

use super::node::{NodeError, NodeResult};
use super::uri::Uri;
use super::vocab::xsd;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, SecondsFormat, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Native value a node converts to and from
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Resource node value
    Uri(Uri),
    /// Blank node identifier
    Blank(String),
    Boolean(bool),
    Integer(i64),
    Float(f32),
    Double(f64),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<FixedOffset>),
    String(String),
    /// Language-tagged text
    LangString { value: String, language: String },
    /// Literal with a datatype outside the coercion table, or a lexical form
    /// its datatype cannot parse
    Typed { lexical: String, datatype: Uri },
}

impl Value {
    /// Get type name as string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Uri(_) => "Uri",
            Value::Blank(_) => "Blank",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Double(_) => "Double",
            Value::Date(_) => "Date",
            Value::Time(_) => "Time",
            Value::DateTime(_) => "DateTime",
            Value::String(_) => "String",
            Value::LangString { .. } => "LangString",
            Value::Typed { .. } => "Typed",
        }
    }

    /// Canonical lexical form and datatype IRI for literal-coercible values
    ///
    /// Returns `None` for `Uri`, `Blank` and `LangString`, which do not map
    /// onto a typed literal.
    pub(crate) fn to_lexical(&self) -> Option<(String, Uri)> {
        let (lexical, datatype) = match self {
            Value::Boolean(b) => lexical_pair(b),
            Value::Integer(i) => lexical_pair(i),
            Value::Float(f) => lexical_pair(f),
            Value::Double(f) => lexical_pair(f),
            Value::Date(d) => lexical_pair(d),
            Value::Time(t) => lexical_pair(t),
            Value::DateTime(dt) => lexical_pair(dt),
            Value::String(s) => (s.clone(), xsd::STRING),
            Value::Typed { lexical, datatype } => return Some((lexical.clone(), datatype.clone())),
            Value::Uri(_) | Value::Blank(_) | Value::LangString { .. } => return None,
        };
        Some((lexical, Uri::new_unchecked(datatype)))
    }

    /// Inverse coercion: rebuild a native value from a lexical form
    ///
    /// Unknown datatypes and unparsable lexical forms fall back to
    /// [`Value::Typed`].
    pub(crate) fn from_lexical(lexical: &str, datatype: &Uri) -> Value {
        let parsed = match datatype.as_str() {
            xsd::STRING => Some(Value::String(lexical.to_string())),
            xsd::BOOLEAN => match lexical {
                "true" | "1" => Some(Value::Boolean(true)),
                "false" | "0" => Some(Value::Boolean(false)),
                _ => None,
            },
            xsd::INTEGER | xsd::INT | xsd::LONG => lexical.parse().ok().map(Value::Integer),
            xsd::FLOAT => parse_float(lexical).map(|f| Value::Float(f as f32)),
            xsd::DOUBLE => parse_float(lexical).map(Value::Double),
            xsd::DATE => NaiveDate::parse_from_str(lexical, DATE_FORMAT).ok().map(Value::Date),
            xsd::TIME => NaiveTime::parse_from_str(lexical, TIME_FORMAT).ok().map(Value::Time),
            xsd::DATE_TIME => DateTime::parse_from_rfc3339(lexical).ok().map(Value::DateTime),
            _ => None,
        };

        parsed.unwrap_or_else(|| Value::Typed {
            lexical: lexical.to_string(),
            datatype: datatype.clone(),
        })
    }
}

/// Natives with a fixed XML Schema datatype
pub(crate) trait XsdLexical {
    const DATATYPE: &'static str;

    fn to_xsd_lexical(&self) -> String;
}

fn lexical_pair<T: XsdLexical>(value: &T) -> (String, &'static str) {
    (value.to_xsd_lexical(), T::DATATYPE)
}

macro_rules! xsd_lexical_display {
    ($datatype:expr => $($ty:ty),*) => {
        $(
            impl XsdLexical for $ty {
                const DATATYPE: &'static str = $datatype;

                fn to_xsd_lexical(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

xsd_lexical_display!(xsd::BOOLEAN => bool);
xsd_lexical_display!(xsd::INTEGER => i32, i64, u32);

impl XsdLexical for f32 {
    const DATATYPE: &'static str = xsd::FLOAT;

    fn to_xsd_lexical(&self) -> String {
        format_float(f64::from(*self), self.to_string())
    }
}

impl XsdLexical for f64 {
    const DATATYPE: &'static str = xsd::DOUBLE;

    fn to_xsd_lexical(&self) -> String {
        format_float(*self, self.to_string())
    }
}

impl XsdLexical for NaiveDate {
    const DATATYPE: &'static str = xsd::DATE;

    fn to_xsd_lexical(&self) -> String {
        self.format(DATE_FORMAT).to_string()
    }
}

impl XsdLexical for NaiveTime {
    const DATATYPE: &'static str = xsd::TIME;

    fn to_xsd_lexical(&self) -> String {
        self.format(TIME_FORMAT).to_string()
    }
}

impl XsdLexical for DateTime<FixedOffset> {
    const DATATYPE: &'static str = xsd::DATE_TIME;

    fn to_xsd_lexical(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl XsdLexical for DateTime<Utc> {
    const DATATYPE: &'static str = xsd::DATE_TIME;

    fn to_xsd_lexical(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

fn format_float(value: f64, display: String) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "INF".to_string()
    } else if value == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        display
    }
}

fn parse_float(lexical: &str) -> Option<f64> {
    match lexical {
        "NaN" => Some(f64::NAN),
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        _ => lexical.parse().ok(),
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Double(f)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        Value::Time(t)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt.with_timezone(&dt.offset().fix()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Uri> for Value {
    fn from(uri: Uri) -> Self {
        Value::Uri(uri)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = NodeError;

    fn try_from(json: serde_json::Value) -> NodeResult<Self> {
        match json {
            serde_json::Value::Bool(b) => Ok(Value::Boolean(b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Integer(i)),
                None => n
                    .as_f64()
                    .map(Value::Double)
                    .ok_or_else(|| NodeError::UnsupportedValueType(format!("number {}", n))),
            },
            serde_json::Value::String(s) => Ok(Value::String(s)),
            serde_json::Value::Null => Err(NodeError::UnsupportedValueType("null".to_string())),
            serde_json::Value::Array(_) => Err(NodeError::UnsupportedValueType("array".to_string())),
            serde_json::Value::Object(_) => Err(NodeError::UnsupportedValueType("object".to_string())),
        }
    }
}
