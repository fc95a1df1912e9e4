use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Field-bus protocol a simulated meter is reachable over
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
pub enum Protocol {
    #[serde(rename = "ModbusRTU")]
    #[strum(serialize = "ModbusRTU")]
    ModbusRtu,
    #[serde(rename = "ModbusTCP")]
    #[strum(serialize = "ModbusTCP")]
    ModbusTcp,
}

/// Meter manufacturer profile
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
pub enum Brand {
    #[default]
    Brand1,
    Brand2,
}

/// Behavior driving how readings evolve while a meter runs
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SimulationType {
    /// Nominal values with sensor noise
    #[default]
    Steady,
    /// Slow sinusoidal swing around the baseline
    Fluctuating,
    /// Developing overcurrent: values ramp up to a ceiling
    Overload,
    /// Sustained undervoltage: values ramp down to a floor
    Brownout,
}

/// Electrical domain of a phase triple
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ValueDomain {
    Voltage,
    Current,
    Power,
}

/// Longest serial number a meter accepts
pub const SERIAL_NUMBER_MAX_DIGITS: usize = 7;

/// Serial numbers are 1 to 7 ASCII digits
pub fn is_valid_serial_number(serial: &str) -> bool {
    !serial.is_empty()
        && serial.len() <= SERIAL_NUMBER_MAX_DIGITS
        && serial.bytes().all(|b| b.is_ascii_digit())
}

/// Default serial for the `seq`-th meter created in this process
pub fn generated_serial_number(seq: u64) -> String {
    // 7 digits, never starting with 0 so it survives numeric register encoding
    format!("{}", 1_000_000 + seq % 9_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_protocol_names_are_verbatim() {
        assert_eq!(Protocol::from_str("ModbusRTU").unwrap(), Protocol::ModbusRtu);
        assert_eq!(Protocol::from_str("ModbusTCP").unwrap(), Protocol::ModbusTcp);
        assert!(Protocol::from_str("modbustcp").is_err());
        assert!(Protocol::from_str("dummy").is_err());
        assert_eq!(Protocol::ModbusTcp.to_string(), "ModbusTCP");
        assert_eq!(
            serde_json::to_string(&Protocol::ModbusRtu).unwrap(),
            "\"ModbusRTU\""
        );
    }

    #[test]
    fn test_simulation_type_round_trips_through_display() {
        for profile in SimulationType::iter() {
            let name = profile.to_string();
            assert_eq!(SimulationType::from_str(&name).unwrap(), profile);
            assert_eq!(serde_json::to_string(&profile).unwrap(), format!("\"{name}\""));
        }
        assert!(SimulationType::from_str("spiky").is_err());
    }

    #[test]
    fn test_brand_defaults() {
        assert_eq!(Brand::default(), Brand::Brand1);
        assert_eq!(Brand::from_str("Brand2").unwrap(), Brand::Brand2);
        assert!(Brand::from_str("Brand3").is_err());
    }

    #[test]
    fn test_serial_number_rules() {
        assert!(is_valid_serial_number("1234567"));
        assert!(is_valid_serial_number("1"));
        assert!(!is_valid_serial_number(""));
        assert!(!is_valid_serial_number("12345678"));
        assert!(!is_valid_serial_number("12a4567"));
        assert!(!is_valid_serial_number("-123"));
    }

    #[test]
    fn test_generated_serials_are_valid() {
        for seq in [0, 1, 42, 8_999_999, 9_000_000, u64::MAX] {
            let serial = generated_serial_number(seq);
            assert!(is_valid_serial_number(&serial), "{serial}");
            assert_eq!(serial.len(), 7);
        }
    }
}
