#![forbid(unsafe_code)]

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyType {
    String,
    Binary,
    Long,
    Double,
    Date,
    Boolean,
    Name,
    Path,
    Reference,
    WeakReference,
    Uri,
    Decimal,
}

impl PropertyType {
    pub const ALL: [PropertyType; 12] = [
        Self::String,
        Self::Binary,
        Self::Long,
        Self::Double,
        Self::Date,
        Self::Boolean,
        Self::Name,
        Self::Path,
        Self::Reference,
        Self::WeakReference,
        Self::Uri,
        Self::Decimal,
    ];

    /// Numeric code as used by the type catalogue and the reference index.
    pub fn code(self) -> i64 {
        match self {
            Self::String => 1,
            Self::Binary => 2,
            Self::Long => 3,
            Self::Double => 4,
            Self::Date => 5,
            Self::Boolean => 6,
            Self::Name => 7,
            Self::Path => 8,
            Self::Reference => 9,
            Self::WeakReference => 10,
            Self::Uri => 11,
            Self::Decimal => 12,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Binary => "Binary",
            Self::Long => "Long",
            Self::Double => "Double",
            Self::Date => "Date",
            Self::Boolean => "Boolean",
            Self::Name => "Name",
            Self::Path => "Path",
            Self::Reference => "Reference",
            Self::WeakReference => "WeakReference",
            Self::Uri => "URI",
            Self::Decimal => "Decimal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn is_reference(self) -> bool {
        matches!(self, Self::Reference | Self::WeakReference)
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Binary content is either a payload handed in by the caller or a stored
/// value whose bytes live out-of-line and are known only by length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BinaryValue {
    Payload(Vec<u8>),
    Stored { length: u64 },
}

impl BinaryValue {
    pub fn len(&self) -> u64 {
        match self {
            Self::Payload(bytes) => bytes.len() as u64,
            Self::Stored { length } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::Payload(bytes) => Some(bytes),
            Self::Stored { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Binary(BinaryValue),
    Long(i64),
    Double(f64),
    Date(OffsetDateTime),
    Boolean(bool),
    Name(String),
    Path(String),
    Reference(String),
    WeakReference(String),
    Uri(String),
    Decimal(String),
}

impl Value {
    pub fn kind(&self) -> PropertyType {
        match self {
            Self::String(_) => PropertyType::String,
            Self::Binary(_) => PropertyType::Binary,
            Self::Long(_) => PropertyType::Long,
            Self::Double(_) => PropertyType::Double,
            Self::Date(_) => PropertyType::Date,
            Self::Boolean(_) => PropertyType::Boolean,
            Self::Name(_) => PropertyType::Name,
            Self::Path(_) => PropertyType::Path,
            Self::Reference(_) => PropertyType::Reference,
            Self::WeakReference(_) => PropertyType::WeakReference,
            Self::Uri(_) => PropertyType::Uri,
            Self::Decimal(_) => PropertyType::Decimal,
        }
    }

    /// Raw string form of the textual kinds.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value)
            | Self::Name(value)
            | Self::Path(value)
            | Self::Reference(value)
            | Self::WeakReference(value)
            | Self::Uri(value)
            | Self::Decimal(value) => Some(value),
            _ => None,
        }
    }

    /// Parses the textual form of a value, e.g. a declared default.
    pub fn parse(kind: PropertyType, raw: &str) -> Result<Self, ValueError> {
        let raw_owned = raw.to_string();
        Ok(match kind {
            PropertyType::String => Self::String(raw_owned),
            PropertyType::Name => Self::Name(raw_owned),
            PropertyType::Path => Self::Path(raw_owned),
            PropertyType::Reference => Self::Reference(raw_owned),
            PropertyType::WeakReference => Self::WeakReference(raw_owned),
            PropertyType::Uri => Self::Uri(raw_owned),
            PropertyType::Decimal => Self::Decimal(raw_owned),
            PropertyType::Long => Self::Long(
                raw.trim()
                    .parse::<i64>()
                    .map_err(|_| ValueError::InvalidLong)?,
            ),
            PropertyType::Double => Self::Double(
                raw.trim()
                    .parse::<f64>()
                    .map_err(|_| ValueError::InvalidDouble)?,
            ),
            PropertyType::Boolean => match raw.trim() {
                "true" | "1" => Self::Boolean(true),
                "false" | "0" => Self::Boolean(false),
                _ => return Err(ValueError::InvalidBoolean),
            },
            PropertyType::Date => Self::Date(
                OffsetDateTime::parse(raw.trim(), &Rfc3339).map_err(|_| ValueError::InvalidDate)?,
            ),
            PropertyType::Binary => Self::Binary(BinaryValue::Payload(raw.as_bytes().to_vec())),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueError {
    InvalidLong,
    InvalidDouble,
    InvalidBoolean,
    InvalidDate,
}

impl ValueError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidLong => "value is not a valid long",
            Self::InvalidDouble => "value is not a valid double",
            Self::InvalidBoolean => "value is not a valid boolean",
            Self::InvalidDate => "value is not an RFC 3339 date",
        }
    }
}

/// A named, typed value or ordered list of values.
///
/// Multiplicity is part of the property, not a function of the value count:
/// a multi-valued property holding one value is distinct from a single-valued
/// one.
#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    name: String,
    kind: PropertyType,
    multiple: bool,
    values: Vec<Value>,
}

impl Property {
    pub fn try_new(
        name: impl Into<String>,
        kind: PropertyType,
        multiple: bool,
        values: Vec<Value>,
    ) -> Result<Self, PropertyError> {
        let name = name.into();
        validate_property_name(&name)?;
        if values.is_empty() {
            return Err(PropertyError::NoValues);
        }
        if !multiple && values.len() != 1 {
            return Err(PropertyError::SingleValuedWithMany {
                count: values.len(),
            });
        }
        if let Some(found) = values.iter().map(Value::kind).find(|found| *found != kind) {
            return Err(PropertyError::TypeMismatch {
                expected: kind,
                found,
            });
        }
        Ok(Self {
            name,
            kind,
            multiple,
            values,
        })
    }

    pub fn single(name: impl Into<String>, value: Value) -> Result<Self, PropertyError> {
        let kind = value.kind();
        Self::try_new(name, kind, false, vec![value])
    }

    pub fn multiple(
        name: impl Into<String>,
        kind: PropertyType,
        values: Vec<Value>,
    ) -> Result<Self, PropertyError> {
        Self::try_new(name, kind, true, values)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PropertyType {
        self.kind
    }

    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// First value; the only one for single-valued properties.
    pub fn value(&self) -> &Value {
        &self.values[0]
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// String forms of all values of the textual kinds.
    pub fn strings(&self) -> Vec<&str> {
        self.values.iter().filter_map(Value::as_str).collect()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Result<Self, PropertyError> {
        let name = name.into();
        validate_property_name(&name)?;
        self.name = name;
        Ok(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyError {
    EmptyName,
    InvalidName,
    NoValues,
    SingleValuedWithMany {
        count: usize,
    },
    TypeMismatch {
        expected: PropertyType,
        found: PropertyType,
    },
}

impl PropertyError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::EmptyName => "property name must not be empty",
            Self::InvalidName => "property name contains '/' or control characters",
            Self::NoValues => "property must carry at least one value",
            Self::SingleValuedWithMany { .. } => "single-valued property carries several values",
            Self::TypeMismatch { .. } => "property value does not match the property type",
        }
    }
}

fn validate_property_name(name: &str) -> Result<(), PropertyError> {
    if name.trim().is_empty() {
        return Err(PropertyError::EmptyName);
    }
    if name.contains('/') || name.chars().any(|c| c.is_control()) {
        return Err(PropertyError::InvalidName);
    }
    Ok(())
}
