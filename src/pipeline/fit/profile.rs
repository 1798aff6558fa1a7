//! The slice of the FIT global profile used when writing treadmill activities.

use chrono::{DateTime, Utc};

use crate::error::EncodeError;

/// Seconds between the Unix epoch and the FIT epoch (1989-12-31T00:00:00Z).
pub const FIT_EPOCH_OFFSET: i64 = 631_065_600;

pub const PROTOCOL_VERSION: u8 = 0x20;
pub const PROFILE_VERSION: u16 = 2140;

pub mod mesg_num {
    pub const FILE_ID: u16 = 0;
    pub const USER_PROFILE: u16 = 3;
    pub const SESSION: u16 = 18;
    pub const LAP: u16 = 19;
    pub const RECORD: u16 = 20;
    pub const ACTIVITY: u16 = 34;
}

/// Field 253 carries the message timestamp in every message that has one.
pub const TIMESTAMP_FIELD: u8 = 253;

pub mod file_id {
    pub const TYPE: u8 = 0;
    pub const MANUFACTURER: u8 = 1;
    pub const PRODUCT: u8 = 2;
    pub const SERIAL_NUMBER: u8 = 3;
    pub const TIME_CREATED: u8 = 4;
    pub const PRODUCT_NAME: u8 = 8;
}

pub mod activity {
    pub const TOTAL_TIMER_TIME: u8 = 0;
    pub const NUM_SESSIONS: u8 = 1;
    pub const TYPE: u8 = 2;
    pub const LOCAL_TIMESTAMP: u8 = 5;
}

pub mod user_profile {
    pub const WEIGHT: u8 = 4;
}

pub mod session {
    pub const START_TIME: u8 = 2;
    pub const START_POSITION_LAT: u8 = 3;
    pub const START_POSITION_LONG: u8 = 4;
    pub const SPORT: u8 = 5;
    pub const TOTAL_ELAPSED_TIME: u8 = 7;
    pub const TOTAL_TIMER_TIME: u8 = 8;
    pub const TOTAL_DISTANCE: u8 = 9;
    pub const TOTAL_CALORIES: u8 = 11;
    pub const TOTAL_ASCENT: u8 = 22;
    pub const TOTAL_DESCENT: u8 = 23;
    pub const NUM_LAPS: u8 = 26;
}

pub mod lap {
    pub const START_TIME: u8 = 2;
    pub const START_POSITION_LAT: u8 = 3;
    pub const START_POSITION_LONG: u8 = 4;
    pub const TOTAL_ELAPSED_TIME: u8 = 7;
    pub const TOTAL_TIMER_TIME: u8 = 8;
    pub const TOTAL_DISTANCE: u8 = 9;
    pub const TOTAL_CALORIES: u8 = 11;
    pub const TOTAL_ASCENT: u8 = 21;
    pub const TOTAL_DESCENT: u8 = 22;
    pub const SPORT: u8 = 25;
}

pub mod record {
    pub const POSITION_LAT: u8 = 0;
    pub const POSITION_LONG: u8 = 1;
    pub const ALTITUDE: u8 = 2;
    pub const DISTANCE: u8 = 5;
    pub const SPEED: u8 = 6;
    pub const CALORIES: u8 = 33;
}

pub const FILE_TYPE_ACTIVITY: u8 = 4;
pub const MANUFACTURER_GARMIN: u16 = 1;
pub const ACTIVITY_TYPE_MANUAL: u8 = 0;
pub const SPORT_WALKING: u8 = 11;

/// FIT base types, identified on the wire by their base type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Enum,
    UInt16,
    SInt32,
    UInt32,
    UInt32z,
    String,
}

impl BaseType {
    pub fn id(self) -> u8 {
        match self {
            BaseType::Enum => 0x00,
            BaseType::UInt16 => 0x84,
            BaseType::SInt32 => 0x85,
            BaseType::UInt32 => 0x86,
            BaseType::UInt32z => 0x8C,
            BaseType::String => 0x07,
        }
    }
}

/// A field value ready for the encoder.
///
/// Integer variants already carry the profile's scale and offset. Times and
/// positions stay in their natural units because the encoder converts those
/// itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Enum(u8),
    UInt16(u16),
    UInt32(u32),
    UInt32z(u32),
    /// Unix seconds, written relative to the FIT epoch.
    Time(u32),
    /// Degrees, written as semicircles.
    Position(f32),
    String(String),
}

impl Value {
    pub fn base_type(&self) -> BaseType {
        match self {
            Value::Enum(_) => BaseType::Enum,
            Value::UInt16(_) => BaseType::UInt16,
            Value::UInt32(_) | Value::Time(_) => BaseType::UInt32,
            Value::UInt32z(_) => BaseType::UInt32z,
            Value::Position(_) => BaseType::SInt32,
            Value::String(_) => BaseType::String,
        }
    }

    /// Size in bytes on the wire. Strings carry a null terminator.
    pub fn size(&self) -> usize {
        match self {
            Value::Enum(_) => 1,
            Value::UInt16(_) => 2,
            Value::UInt32(_) | Value::UInt32z(_) | Value::Time(_) | Value::Position(_) => 4,
            Value::String(s) => s.len() + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub number: u8,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub global: u16,
    pub fields: Vec<Field>,
}

impl Message {
    pub fn new(global: u16) -> Self {
        Self {
            global,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, number: u8, value: Value) -> Self {
        self.fields.push(Field { number, value });
        self
    }

    pub fn maybe_field(self, number: u8, value: Option<Value>) -> Self {
        match value {
            Some(value) => self.field(number, value),
            None => self,
        }
    }
}

pub fn date_time(time: DateTime<Utc>) -> Result<Value, EncodeError> {
    let seconds = time.timestamp();
    if seconds < FIT_EPOCH_OFFSET {
        return Err(EncodeError::OutOfRange {
            field: "timestamp",
            value: seconds as f64,
        });
    }
    u32::try_from(seconds)
        .map(Value::Time)
        .map_err(|_| EncodeError::OutOfRange {
            field: "timestamp",
            value: seconds as f64,
        })
}

pub fn position(degrees: f64) -> Result<Value, EncodeError> {
    if !degrees.is_finite() || degrees.abs() > 180.0 {
        return Err(EncodeError::OutOfRange {
            field: "position",
            value: degrees,
        });
    }
    Ok(Value::Position(degrees as f32))
}

/// Stores `(value + offset) * scale` as a uint32.
pub fn scaled_u32(field: &'static str, value: f64, scale: f64, offset: f64) -> Result<Value, EncodeError> {
    let raw = ((value + offset) * scale).round();
    // u32::MAX is the invalid marker.
    if !raw.is_finite() || raw < 0.0 || raw >= u32::MAX as f64 {
        return Err(EncodeError::OutOfRange { field, value });
    }
    Ok(Value::UInt32(raw as u32))
}

/// Stores `(value + offset) * scale` as a uint16.
pub fn scaled_u16(field: &'static str, value: f64, scale: f64, offset: f64) -> Result<Value, EncodeError> {
    let raw = ((value + offset) * scale).round();
    if !raw.is_finite() || raw < 0.0 || raw >= u16::MAX as f64 {
        return Err(EncodeError::OutOfRange { field, value });
    }
    Ok(Value::UInt16(raw as u16))
}
