//! Core types for sensor readings.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A quantity a peripheral exposes as one characteristic.
///
/// Each role maps to exactly one characteristic UUID in the
/// Environmental Sensing / Battery profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Role {
    /// Temperature in degrees Celsius.
    Temperature,
    /// Relative humidity in percent.
    Humidity,
    /// Battery level.
    Battery,
}

impl Role {
    /// Every role, in the order they are reported.
    pub const ALL: [Role; 3] = [Role::Temperature, Role::Humidity, Role::Battery];

    /// The characteristic UUID carrying this role's value.
    ///
    /// ```
    /// use bluetemp_types::{Role, uuids};
    ///
    /// assert_eq!(Role::Humidity.characteristic(), uuids::HUMIDITY);
    /// ```
    #[must_use]
    pub fn characteristic(self) -> uuid::Uuid {
        match self {
            Role::Temperature => crate::uuid::TEMPERATURE,
            Role::Humidity => crate::uuid::HUMIDITY,
            Role::Battery => crate::uuid::BATTERY_LEVEL,
        }
    }

    /// Classify a characteristic UUID into a role.
    #[must_use]
    pub fn from_characteristic(uuid: &uuid::Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.characteristic() == *uuid)
    }

    /// Lowercase name used on the command line and in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Temperature => "temperature",
            Role::Humidity => "humidity",
            Role::Battery => "battery",
        }
    }

    /// Display unit for values of this role.
    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Role::Temperature => "°C",
            Role::Humidity => "%",
            Role::Battery => "%",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    /// Parse a role name, ignoring case.
    ///
    /// ```
    /// use bluetemp_types::Role;
    ///
    /// assert_eq!("Temperature".parse::<Role>(), Ok(Role::Temperature));
    /// assert!("pressure".parse::<Role>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temperature" | "temp" => Ok(Role::Temperature),
            "humidity" => Ok(Role::Humidity),
            "battery" => Ok(Role::Battery),
            _ => Err(ParseError::UnknownRole(s.to_string())),
        }
    }
}

impl TryFrom<uuid::Uuid> for Role {
    type Error = ParseError;

    fn try_from(uuid: uuid::Uuid) -> Result<Self, Self::Error> {
        Role::from_characteristic(&uuid).ok_or(ParseError::UnknownCharacteristic(uuid))
    }
}

/// One decoded characteristic value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// Which quantity was read.
    pub role: Role,
    /// Decoded value in engineering units.
    pub value: f64,
}

impl Reading {
    /// Create a new reading.
    #[must_use]
    pub fn new(role: Role, value: f64) -> Self {
        Self { role, value }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}{}", self.value, self.role.unit())
    }
}

/// A temperature and humidity pair taken in one session.
///
/// This is the record handed to the persistence sink.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Climate {
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
}

impl Climate {
    /// Assemble a climate record from a set of readings.
    ///
    /// Returns `None` unless both a temperature and a humidity reading are present.
    #[must_use]
    pub fn from_readings(readings: &[Reading]) -> Option<Self> {
        let find = |role| readings.iter().find(|r| r.role == role).map(|r| r.value);
        Some(Self {
            temperature: find(Role::Temperature)?,
            humidity: find(Role::Humidity)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_characteristic_roundtrip() {
        for role in Role::ALL {
            assert_eq!(Role::from_characteristic(&role.characteristic()), Some(role));
        }
    }

    #[test]
    fn test_role_from_unknown_characteristic() {
        assert_eq!(
            Role::from_characteristic(&crate::uuid::ENVIRONMENTAL_SENSING_SERVICE),
            None
        );
        let err = Role::try_from(crate::uuid::ENVIRONMENTAL_SENSING_SERVICE).unwrap_err();
        assert!(err.to_string().contains("0000181a"));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("temperature".parse::<Role>(), Ok(Role::Temperature));
        assert_eq!("TEMP".parse::<Role>(), Ok(Role::Temperature));
        assert_eq!(" humidity ".parse::<Role>(), Ok(Role::Humidity));
        assert_eq!("Battery".parse::<Role>(), Ok(Role::Battery));
        assert_eq!(
            "co2".parse::<Role>(),
            Err(ParseError::UnknownRole("co2".to_string()))
        );
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Temperature.to_string(), "temperature");
        assert_eq!(Role::Humidity.to_string(), "humidity");
        assert_eq!(Role::Battery.to_string(), "battery");
    }

    #[test]
    fn test_role_units() {
        assert_eq!(Role::Temperature.unit(), "°C");
        assert_eq!(Role::Humidity.unit(), "%");
        assert_eq!(Role::Battery.unit(), "%");
    }

    #[test]
    fn test_reading_display() {
        assert_eq!(Reading::new(Role::Temperature, 28.32).to_string(), "28.32°C");
        assert_eq!(Reading::new(Role::Humidity, 45.0).to_string(), "45.00%");
        assert_eq!(Reading::new(Role::Battery, 0.98).to_string(), "0.98%");
    }

    #[test]
    fn test_climate_from_readings() {
        let readings = [
            Reading::new(Role::Humidity, 45.1),
            Reading::new(Role::Temperature, 21.5),
        ];
        let climate = Climate::from_readings(&readings).unwrap();
        assert_eq!(climate.temperature, 21.5);
        assert_eq!(climate.humidity, 45.1);
    }

    #[test]
    fn test_climate_requires_both_roles() {
        let readings = [Reading::new(Role::Temperature, 21.5)];
        assert!(Climate::from_readings(&readings).is_none());
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(
            serde_json::to_string(&Role::Temperature).unwrap(),
            "\"temperature\""
        );
        let role: Role = serde_json::from_str("\"battery\"").unwrap();
        assert_eq!(role, Role::Battery);
    }

    #[test]
    fn test_climate_serialization() {
        let climate = Climate {
            temperature: 28.32,
            humidity: 40.5,
        };
        let json = serde_json::to_string(&climate).unwrap();
        assert_eq!(json, r#"{"temperature":28.32,"humidity":40.5}"#);
    }
}
