//! Mapping and coercion of trip record CSV rows.
//!
//! The TLC has renamed and re-cased its columns several times over the years, so headers are
//! normalized before they are matched. Values that fail to parse become NULL; only rows lacking
//! a pickup time, dropoff time or fare are rejected outright.


use std::fmt;

use chrono::NaiveDateTime;
use csv::StringRecord;
use taxidash_common::model::{PaymentType, TripRecord, Vendor};


const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TargetColumn {
    PickupTime,
    DropoffTime,
    Distance,
    Fare,
    TipAmount,
    TotalAmount,
    PassengerCount,
    PickupZoneId,
    DropoffZoneId,
    VendorRaw,
    PaymentRaw,
    PickupLong,
    PickupLat,
    DropoffLong,
    DropoffLat,
    RateCodeId,
    StoreAndFwdFlag,
    Extra,
    MtaTax,
    TollsAmount,
    ImprovementSurcharge,
    CongestionSurcharge,
    AirportFee,
    CbdCongestionFee,
}
impl TargetColumn {
    /// Maps a normalized header name to the column it feeds.
    pub fn from_header(normalized: &str) -> Option<Self> {
        let column = match normalized {
            "tpep_pickup_datetime"|"pickup_datetime"|"pickup_time" => Self::PickupTime,
            "tpep_dropoff_datetime"|"dropoff_datetime"|"dropoff_time" => Self::DropoffTime,
            "trip_distance"|"distance" => Self::Distance,
            "fare_amount"|"fare" => Self::Fare,
            "tip_amount" => Self::TipAmount,
            "total_amount" => Self::TotalAmount,
            "passenger_count" => Self::PassengerCount,
            "pulocationid"|"pickup_zone_id" => Self::PickupZoneId,
            "dolocationid"|"dropoff_zone_id" => Self::DropoffZoneId,
            "vendorid"|"vendor_id" => Self::VendorRaw,
            "payment_type" => Self::PaymentRaw,
            "pickup_longitude"|"pickup_long" => Self::PickupLong,
            "pickup_latitude"|"pickup_lat" => Self::PickupLat,
            "dropoff_longitude"|"dropoff_long" => Self::DropoffLong,
            "dropoff_latitude"|"dropoff_lat" => Self::DropoffLat,
            "ratecodeid" => Self::RateCodeId,
            "store_and_fwd_flag" => Self::StoreAndFwdFlag,
            "extra" => Self::Extra,
            "mta_tax" => Self::MtaTax,
            "tolls_amount" => Self::TollsAmount,
            "improvement_surcharge" => Self::ImprovementSurcharge,
            "congestion_surcharge" => Self::CongestionSurcharge,
            "airport_fee" => Self::AirportFee,
            "cbd_congestion_fee" => Self::CbdCongestionFee,
            _ => return None,
        };
        Some(column)
    }
}


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SkipReason {
    MissingPickupTime,
    MissingDropoffTime,
    MissingFare,
}
impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPickupTime => write!(f, "missing or invalid pickup time"),
            Self::MissingDropoffTime => write!(f, "missing or invalid dropoff time"),
            Self::MissingFare => write!(f, "missing or invalid fare"),
        }
    }
}


pub fn normalize_header(header: &str) -> String {
    header.trim()
        .trim_start_matches('\u{FEFF}')
        .to_lowercase()
        .replace(' ', "_")
}


/// Which target column (if any) each CSV column feeds.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ColumnMapping {
    targets: Vec<Option<TargetColumn>>,
}
impl ColumnMapping {
    pub fn from_headers(headers: &StringRecord) -> Self {
        let mut targets: Vec<Option<TargetColumn>> = Vec::with_capacity(headers.len());
        for header in headers.iter() {
            let target = TargetColumn::from_header(&normalize_header(header));
            // first occurrence wins if a file carries a column twice
            if target.is_some() && targets.contains(&target) {
                targets.push(None);
            } else {
                targets.push(target);
            }
        }
        Self {
            targets,
        }
    }

    pub fn has(&self, column: TargetColumn) -> bool {
        self.targets.contains(&Some(column))
    }

    /// The required columns absent from the header row.
    pub fn missing_required(&self) -> Vec<TargetColumn> {
        [TargetColumn::PickupTime, TargetColumn::DropoffTime, TargetColumn::Fare]
            .into_iter()
            .filter(|c| !self.has(*c))
            .collect()
    }

    pub fn parse_record(&self, record: &StringRecord) -> Result<TripRecord, SkipReason> {
        let mut pickup_time = None;
        let mut dropoff_time = None;
        let mut fare = None;
        let mut trip = TripRecord::default();

        for (target_opt, value) in self.targets.iter().zip(record.iter()) {
            let Some(target) = target_opt else { continue };
            match target {
                TargetColumn::PickupTime => pickup_time = parse_timestamp(value),
                TargetColumn::DropoffTime => dropoff_time = parse_timestamp(value),
                TargetColumn::Fare => fare = parse_float(value),
                TargetColumn::Distance => trip.distance = parse_float(value),
                TargetColumn::TipAmount => trip.tip_amount = parse_float(value),
                TargetColumn::TotalAmount => trip.total_amount = parse_float(value),
                TargetColumn::PassengerCount => trip.passenger_count = parse_int32(value),
                TargetColumn::PickupZoneId => trip.pickup_zone_id = parse_int32(value),
                TargetColumn::DropoffZoneId => trip.dropoff_zone_id = parse_int32(value),
                TargetColumn::VendorRaw => trip.vendor = parse_int(value).and_then(Vendor::from_raw),
                TargetColumn::PaymentRaw => trip.payment = PaymentType::from_raw(parse_int(value)),
                TargetColumn::PickupLong => trip.pickup_long = parse_float(value),
                TargetColumn::PickupLat => trip.pickup_lat = parse_float(value),
                TargetColumn::DropoffLong => trip.dropoff_long = parse_float(value),
                TargetColumn::DropoffLat => trip.dropoff_lat = parse_float(value),
                TargetColumn::RateCodeId => trip.ratecodeid = parse_int32(value),
                TargetColumn::StoreAndFwdFlag => trip.store_and_fwd_flag = parse_flag(value),
                TargetColumn::Extra => trip.extra = parse_float(value),
                TargetColumn::MtaTax => trip.mta_tax = parse_float(value),
                TargetColumn::TollsAmount => trip.tolls_amount = parse_float(value),
                TargetColumn::ImprovementSurcharge => trip.improvement_surcharge = parse_float(value),
                TargetColumn::CongestionSurcharge => trip.congestion_surcharge = parse_float(value),
                TargetColumn::AirportFee => trip.airport_fee = parse_float(value),
                TargetColumn::CbdCongestionFee => trip.cbd_congestion_fee = parse_float(value),
            }
        }

        trip.pickup_time = pickup_time.ok_or(SkipReason::MissingPickupTime)?;
        trip.dropoff_time = dropoff_time.ok_or(SkipReason::MissingDropoffTime)?;
        trip.fare = fare.ok_or(SkipReason::MissingFare)?;
        Ok(trip)
    }
}


pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.len() == 0 {
        return None;
    }
    TIMESTAMP_FORMATS.iter()
        .filter_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .next()
}

pub fn parse_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
        .filter(|f| f.is_finite())
}

/// Parses an integer, also accepting integral floats such as `1.0`.
pub fn parse_int(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(i);
    }
    let f = parse_float(trimmed)?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

pub fn parse_int32(value: &str) -> Option<i32> {
    parse_int(value)
        .and_then(|i| i32::try_from(i).ok())
}

pub fn parse_flag(value: &str) -> Option<String> {
    match value.trim() {
        "Y"|"y" => Some("Y".to_owned()),
        "N"|"n" => Some("N".to_owned()),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d).unwrap()
            .and_hms_opt(h, mi, s).unwrap()
    }

    fn tlc_headers() -> StringRecord {
        StringRecord::from(vec![
            "VendorID", "tpep_pickup_datetime", "tpep_dropoff_datetime", "passenger_count",
            "trip_distance", "RatecodeID", "store_and_fwd_flag", "PULocationID", "DOLocationID",
            "payment_type", "fare_amount", "extra", "mta_tax", "tip_amount", "tolls_amount",
            "improvement_surcharge", "total_amount", "congestion_surcharge", "Airport_fee",
            "cbd_congestion_fee",
        ])
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header(" PULocationID "), "pulocationid");
        assert_eq!(normalize_header("Airport_fee"), "airport_fee");
        assert_eq!(normalize_header("Pickup Longitude"), "pickup_longitude");
        assert_eq!(normalize_header("\u{FEFF}VendorID"), "vendorid");
    }

    #[test]
    fn test_mapping() {
        let mapping = ColumnMapping::from_headers(&tlc_headers());
        assert!(mapping.has(TargetColumn::PickupZoneId));
        assert!(mapping.has(TargetColumn::AirportFee));
        assert!(!mapping.has(TargetColumn::PickupLong));
        assert!(mapping.missing_required().is_empty());

        let partial = ColumnMapping::from_headers(&StringRecord::from(vec!["tpep_pickup_datetime", "unrelated"]));
        assert_eq!(partial.missing_required(), vec![TargetColumn::DropoffTime, TargetColumn::Fare]);
    }

    #[test]
    fn test_parse_full_record() {
        let mapping = ColumnMapping::from_headers(&tlc_headers());
        let record = StringRecord::from(vec![
            "2", "2025-01-05 23:50:00", "2025-01-06 00:12:30", "1.0",
            "3.4", "1", "N", "161", "237",
            "1", "21.9", "1", "0.5", "5.0", "0",
            "1", "33.4", "2.5", "0", "0.75",
        ]);
        let trip = mapping.parse_record(&record).unwrap();
        assert_eq!(trip.vendor, Some(Vendor::VeriFone));
        assert_eq!(trip.pickup_time, at(2025, 1, 5, 23, 50, 0));
        assert_eq!(trip.dropoff_time, at(2025, 1, 6, 0, 12, 30));
        assert_eq!(trip.passenger_count, Some(1));
        assert_eq!(trip.distance, Some(3.4));
        assert_eq!(trip.ratecodeid, Some(1));
        assert_eq!(trip.store_and_fwd_flag.as_deref(), Some("N"));
        assert_eq!(trip.pickup_zone_id, Some(161));
        assert_eq!(trip.dropoff_zone_id, Some(237));
        assert_eq!(trip.payment, PaymentType::CreditCard);
        assert_eq!(trip.fare, 21.9);
        assert_eq!(trip.tip_amount, Some(5.0));
        assert_eq!(trip.total_amount, Some(33.4));
        assert_eq!(trip.airport_fee, Some(0.0));
        assert_eq!(trip.cbd_congestion_fee, Some(0.75));
        assert_eq!(trip.pickup_weekday(), 0);
        assert_eq!(trip.duration_min(), 22.5);
    }

    #[test]
    fn test_coercion_to_null() {
        let mapping = ColumnMapping::from_headers(&tlc_headers());
        let record = StringRecord::from(vec![
            "7", "2025-02-01T08:00:00.250", "2025-02-01T08:10:00", "",
            "n/a", "99.5", "maybe", "", "xyz",
            "", "12.5", "", "", "", "",
            "", "", "", "", "",
        ]);
        let trip = mapping.parse_record(&record).unwrap();
        assert_eq!(trip.vendor, None);
        assert_eq!(trip.pickup_time, at(2025, 2, 1, 8, 0, 0) + chrono::Duration::milliseconds(250));
        assert_eq!(trip.passenger_count, None);
        assert_eq!(trip.distance, None);
        assert_eq!(trip.ratecodeid, None);
        assert_eq!(trip.store_and_fwd_flag, None);
        assert_eq!(trip.pickup_zone_id, None);
        assert_eq!(trip.dropoff_zone_id, None);
        assert_eq!(trip.payment, PaymentType::Unknown);
        assert_eq!(trip.tip_amount, None);
    }

    #[test]
    fn test_skipped_records() {
        let mapping = ColumnMapping::from_headers(&StringRecord::from(vec![
            "tpep_pickup_datetime", "tpep_dropoff_datetime", "fare_amount",
        ]));
        assert_eq!(
            mapping.parse_record(&StringRecord::from(vec!["", "2025-01-01 00:10:00", "5"])),
            Err(SkipReason::MissingPickupTime),
        );
        assert_eq!(
            mapping.parse_record(&StringRecord::from(vec!["2025-01-01 00:00:00", "soon", "5"])),
            Err(SkipReason::MissingDropoffTime),
        );
        assert_eq!(
            mapping.parse_record(&StringRecord::from(vec!["2025-01-01 00:00:00", "2025-01-01 00:10:00", "NaN"])),
            Err(SkipReason::MissingFare),
        );
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("3"), Some(3));
        assert_eq!(parse_int(" 2.0 "), Some(2));
        assert_eq!(parse_int("2.5"), None);
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int32("4294967296"), None);
    }
}
