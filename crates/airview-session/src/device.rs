use serde::Serialize;

use crate::error::DecodeError;

const FIELD_COUNT: usize = 6;
const RF_FIELD_COUNT: usize = 4;
const RF_FIELD_INDEX: usize = 5;

/// Hardware and RF parameters reported by a `devi` response.
///
/// Payload layout:
/// ```text
/// usb_id,firmware_version,hardware_version,firmware_date,<unused>,rf_start rf_end rf_spacing rf_sample_count
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub usb_id: String,
    pub firmware_version: String,
    pub hardware_version: String,
    pub firmware_date: String,
    /// First scanned frequency, MHz.
    pub rf_start_mhz: f64,
    /// Last scanned frequency, MHz.
    pub rf_end_mhz: f64,
    /// Spacing between scanned frequencies, MHz.
    pub rf_channel_spacing_mhz: f64,
    /// RSSI readings per scan batch.
    pub rf_sample_count: u32,
}

impl DeviceInfo {
    /// Decode a `devi` payload.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(payload).map_err(|_| DecodeError::NotUtf8)?;

        let fields: Vec<&str> = text.split(',').collect();
        if fields.len() != FIELD_COUNT {
            return Err(DecodeError::FieldCount {
                expected: FIELD_COUNT,
                found: fields.len(),
            });
        }

        let rf: Vec<&str> = fields[RF_FIELD_INDEX].split_whitespace().collect();
        if rf.len() != RF_FIELD_COUNT {
            return Err(DecodeError::RfFieldCount {
                expected: RF_FIELD_COUNT,
                found: rf.len(),
            });
        }

        Ok(Self {
            usb_id: fields[0].to_string(),
            firmware_version: fields[1].to_string(),
            hardware_version: fields[2].to_string(),
            firmware_date: fields[3].to_string(),
            rf_start_mhz: parse_number("rf_start_mhz", rf[0])?,
            rf_end_mhz: parse_number("rf_end_mhz", rf[1])?,
            rf_channel_spacing_mhz: parse_number("rf_channel_spacing_mhz", rf[2])?,
            rf_sample_count: parse_number("rf_sample_count", rf[3])?,
        })
    }
}

fn parse_number<N: std::str::FromStr>(field: &'static str, value: &str) -> Result<N, DecodeError> {
    value.parse().map_err(|_| DecodeError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = "USB123,1.2.0,revB,2015-01-01,ignored,2400.0 2483.5 5.0 173";

    #[test]
    fn decodes_reference_payload() {
        let info = DeviceInfo::decode(PAYLOAD.as_bytes()).unwrap();
        assert_eq!(info.usb_id, "USB123");
        assert_eq!(info.firmware_version, "1.2.0");
        assert_eq!(info.hardware_version, "revB");
        assert_eq!(info.firmware_date, "2015-01-01");
        assert_eq!(info.rf_start_mhz, 2400.0);
        assert_eq!(info.rf_end_mhz, 2483.5);
        assert_eq!(info.rf_channel_spacing_mhz, 5.0);
        assert_eq!(info.rf_sample_count, 173);
    }

    #[test]
    fn trailing_carriage_return_is_tolerated() {
        let payload = format!("{PAYLOAD}\r");
        let info = DeviceInfo::decode(payload.as_bytes()).unwrap();
        assert_eq!(info.rf_sample_count, 173);
    }

    #[test]
    fn wrong_field_count_is_decode_error() {
        assert_eq!(
            DeviceInfo::decode(b"USB123,1.2.0,revB,2015-01-01,2400.0 2483.5 5.0 173"),
            Err(DecodeError::FieldCount {
                expected: 6,
                found: 5
            })
        );
        assert!(matches!(
            DeviceInfo::decode(format!("{PAYLOAD},extra").as_bytes()),
            Err(DecodeError::FieldCount { found: 7, .. })
        ));
    }

    #[test]
    fn wrong_rf_field_count_is_decode_error() {
        assert_eq!(
            DeviceInfo::decode(b"a,b,c,d,e,2400.0 2483.5 5.0"),
            Err(DecodeError::RfFieldCount {
                expected: 4,
                found: 3
            })
        );
    }

    #[test]
    fn non_numeric_rf_field_is_decode_error() {
        assert_eq!(
            DeviceInfo::decode(b"a,b,c,d,e,2400.0 high 5.0 173"),
            Err(DecodeError::InvalidNumber {
                field: "rf_end_mhz",
                value: "high".to_string()
            })
        );
        assert!(matches!(
            DeviceInfo::decode(b"a,b,c,d,e,2400.0 2483.5 5.0 17.3"),
            Err(DecodeError::InvalidNumber {
                field: "rf_sample_count",
                ..
            })
        ));
    }

    #[test]
    fn invalid_utf8_is_decode_error() {
        assert_eq!(
            DeviceInfo::decode(&[0xff, b',', 0xfe]),
            Err(DecodeError::NotUtf8)
        );
    }

    #[test]
    fn serializes_typed_fields() {
        let info = DeviceInfo::decode(PAYLOAD.as_bytes()).unwrap();
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["rf_sample_count"], 173);
        assert_eq!(json["rf_end_mhz"], 2483.5);
        assert_eq!(json["usb_id"], "USB123");
    }
}
