use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};


/// A taxi technology provider ("vendor") as recorded by the TLC.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Vendor {
    #[serde(rename = "CMT")]
    CreativeMobile,
    #[serde(rename = "VTS")]
    VeriFone,
}
impl Vendor {
    pub const ALL: [Vendor; 2] = [Vendor::CreativeMobile, Vendor::VeriFone];

    pub fn code(&self) -> &'static str {
        match self {
            Self::CreativeMobile => "CMT",
            Self::VeriFone => "VTS",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreativeMobile => "Creative Mobile Technologies",
            Self::VeriFone => "VeriFone Transportation Systems",
        }
    }

    /// Looks up a vendor by its code, ignoring case and surrounding whitespace.
    pub fn from_code(code: &str) -> Option<Self> {
        let trimmed = code.trim();
        Self::ALL.iter()
            .copied()
            .find(|v| v.code().eq_ignore_ascii_case(trimmed))
    }

    /// Maps the numeric `VendorID` of the trip record files.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            1 => Some(Self::CreativeMobile),
            2 => Some(Self::VeriFone),
            _ => None,
        }
    }
}


#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum PaymentType {
    CreditCard,
    Cash,
    NoCharge,
    Dispute,
    #[default]
    Unknown,
    Voided,
}
impl PaymentType {
    pub const ALL: [PaymentType; 6] = [
        PaymentType::CreditCard,
        PaymentType::Cash,
        PaymentType::NoCharge,
        PaymentType::Dispute,
        PaymentType::Unknown,
        PaymentType::Voided,
    ];

    pub fn id(&self) -> i32 {
        match self {
            Self::CreditCard => 1,
            Self::Cash => 2,
            Self::NoCharge => 3,
            Self::Dispute => 4,
            Self::Unknown => 5,
            Self::Voided => 6,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::CreditCard => "CRD",
            Self::Cash => "CSH",
            Self::NoCharge => "NOC",
            Self::Dispute => "DIS",
            Self::Unknown => "UNK",
            Self::Voided => "VOD",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::CreditCard => "Credit Card",
            Self::Cash => "Cash",
            Self::NoCharge => "No Charge",
            Self::Dispute => "Dispute",
            Self::Unknown => "Unknown",
            Self::Voided => "Voided Trip",
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.iter()
            .copied()
            .find(|p| i64::from(p.id()) == id)
    }

    /// Maps a raw payment code; anything missing or unrecognized counts as unknown.
    pub fn from_raw(raw: Option<i64>) -> Self {
        raw.and_then(Self::from_id)
            .unwrap_or(Self::Unknown)
    }
}


#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Zone {
    pub zone_id: i32,
    pub borough: Option<String>,
    pub zone_name: Option<String>,
    pub service_zone: Option<String>,
}


/// One taxi trip as stored in the fact table.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TripRecord {
    pub pickup_time: NaiveDateTime,
    pub dropoff_time: NaiveDateTime,
    pub distance: Option<f64>,
    pub fare: f64,
    pub tip_amount: Option<f64>,
    pub total_amount: Option<f64>,
    pub passenger_count: Option<i32>,
    pub pickup_zone_id: Option<i32>,
    pub dropoff_zone_id: Option<i32>,
    pub vendor: Option<Vendor>,
    pub payment: PaymentType,
    pub pickup_long: Option<f64>,
    pub pickup_lat: Option<f64>,
    pub dropoff_long: Option<f64>,
    pub dropoff_lat: Option<f64>,
    pub ratecodeid: Option<i32>,
    pub store_and_fwd_flag: Option<String>,
    pub extra: Option<f64>,
    pub mta_tax: Option<f64>,
    pub tolls_amount: Option<f64>,
    pub improvement_surcharge: Option<f64>,
    pub congestion_surcharge: Option<f64>,
    pub airport_fee: Option<f64>,
    pub cbd_congestion_fee: Option<f64>,
}
impl TripRecord {
    /// Day of the week of the pickup, 0 = Sunday through 6 = Saturday.
    pub fn pickup_weekday(&self) -> i32 {
        self.pickup_time.weekday().num_days_from_sunday() as i32
    }

    pub fn pickup_hour(&self) -> i32 {
        self.pickup_time.hour() as i32
    }

    /// Trip duration in minutes; negative if the record has its timestamps swapped.
    pub fn duration_min(&self) -> f64 {
        let delta = self.dropoff_time - self.pickup_time;
        delta.num_milliseconds() as f64 / 60_000.0
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d).unwrap()
            .and_hms_opt(h, mi, s).unwrap()
    }

    #[test]
    fn test_vendor_codes() {
        assert_eq!(Vendor::from_code("CMT"), Some(Vendor::CreativeMobile));
        assert_eq!(Vendor::from_code("vts"), Some(Vendor::VeriFone));
        assert_eq!(Vendor::from_code(" Vts "), Some(Vendor::VeriFone));
        assert_eq!(Vendor::from_code("DDS"), None);
        assert_eq!(Vendor::from_code(""), None);
        assert_eq!(Vendor::from_raw(1), Some(Vendor::CreativeMobile));
        assert_eq!(Vendor::from_raw(2), Some(Vendor::VeriFone));
        assert_eq!(Vendor::from_raw(6), None);
    }

    #[test]
    fn test_payment_types() {
        for (i, payment) in PaymentType::ALL.iter().enumerate() {
            assert_eq!(payment.id(), (i + 1) as i32);
            assert_eq!(PaymentType::from_id(i64::from(payment.id())), Some(*payment));
        }
        assert_eq!(PaymentType::from_raw(Some(2)), PaymentType::Cash);
        assert_eq!(PaymentType::from_raw(Some(0)), PaymentType::Unknown);
        assert_eq!(PaymentType::from_raw(Some(7)), PaymentType::Unknown);
        assert_eq!(PaymentType::from_raw(None), PaymentType::Unknown);
    }

    #[test]
    fn test_derived_fields() {
        // 2025-01-05 is a Sunday
        let trip = TripRecord {
            pickup_time: at(2025, 1, 5, 23, 50, 0),
            dropoff_time: at(2025, 1, 6, 0, 12, 30),
            fare: 21.9,
            ..TripRecord::default()
        };
        assert_eq!(trip.pickup_weekday(), 0);
        assert_eq!(trip.pickup_hour(), 23);
        assert_eq!(trip.duration_min(), 22.5);

        let trip = TripRecord {
            pickup_time: at(2025, 1, 11, 8, 0, 0),
            dropoff_time: at(2025, 1, 11, 7, 59, 0),
            fare: 3.0,
            ..TripRecord::default()
        };
        assert_eq!(trip.pickup_weekday(), 6);
        assert_eq!(trip.pickup_hour(), 8);
        assert_eq!(trip.duration_min(), -1.0);
    }
}
