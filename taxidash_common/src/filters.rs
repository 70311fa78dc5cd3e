//! Request filter parameters and their translation into SQL predicates.
//!
//! Every endpoint accepts a subset of the trip filters. Values are validated up front so that a
//! malformed parameter is reported to the client instead of reaching the database; absent or
//! empty parameters impose no constraint.


use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tokio_postgres::types::ToSql;

use crate::errors::FilterError;
use crate::model::{PaymentType, Vendor};


pub type QueryPairs<'a> = HashMap<Cow<'a, str>, Cow<'a, str>>;

pub const DEFAULT_MAP_LIMIT: i64 = 150;
pub const MIN_MAP_LIMIT: i64 = 10;
pub const MAX_MAP_LIMIT: i64 = 1000;


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum FilterField {
    VendorId,
    PaymentId,
    Weekday,
    Hour,
    Start,
    End,
}
impl FilterField {
    pub const ALL: [FilterField; 6] = [
        FilterField::VendorId,
        FilterField::PaymentId,
        FilterField::Weekday,
        FilterField::Hour,
        FilterField::Start,
        FilterField::End,
    ];

    pub fn parameter_name(&self) -> &'static str {
        match self {
            Self::VendorId => "vendor_id",
            Self::PaymentId => "payment_id",
            Self::Weekday => "weekday",
            Self::Hour => "hour",
            Self::Start => "start",
            Self::End => "end",
        }
    }
}


/// Conjunctive filters over the trips fact table.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize)]
pub struct TripFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekday: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDateTime>,
}
impl TripFilters {
    /// Parses the filters in `accepted` from the query string; other parameters are ignored.
    pub fn from_query_pairs(query_pairs: &QueryPairs<'_>, accepted: &[FilterField]) -> Result<Self, FilterError> {
        let mut filters = TripFilters::default();
        for field in accepted {
            let value = match non_empty(query_pairs, field.parameter_name()) {
                Some(v) => v,
                None => continue,
            };
            match field {
                FilterField::VendorId => {
                    let vendor = Vendor::from_code(value)
                        .ok_or_else(|| FilterError::UnknownVendor(value.to_owned()))?;
                    filters.vendor_id = Some(vendor.code().to_owned());
                },
                FilterField::PaymentId => {
                    let payment = value.trim().parse::<i64>().ok()
                        .and_then(PaymentType::from_id)
                        .ok_or_else(|| FilterError::PaymentOutOfRange(value.to_owned()))?;
                    filters.payment_id = Some(payment.id());
                },
                FilterField::Weekday => {
                    filters.weekday = Some(parse_weekday(value)?);
                },
                FilterField::Hour => {
                    filters.hour = Some(parse_hour(value)?);
                },
                FilterField::Start => {
                    filters.start = Some(parse_date_bound("start", value)?);
                },
                FilterField::End => {
                    filters.end = Some(parse_date_bound("end", value)?);
                },
            }
        }

        if let (Some(start), Some(end)) = (&filters.start, &filters.end) {
            if end < start {
                return Err(FilterError::EndBeforeStart);
            }
        }

        Ok(filters)
    }

    pub fn is_empty(&self) -> bool {
        self.vendor_id.is_none()
            && self.payment_id.is_none()
            && self.weekday.is_none()
            && self.hour.is_none()
            && self.start.is_none()
            && self.end.is_none()
    }

    /// Builds the predicates against the trips table aliased as `alias`.
    pub fn sql_filter<'a>(&'a self, alias: &str) -> SqlFilter<'a> {
        let mut filter = SqlFilter::new();
        if let Some(vendor_id) = &self.vendor_id {
            filter.push(&format!("{}.vendor_id", alias), "=", vendor_id);
        }
        if let Some(payment_id) = &self.payment_id {
            filter.push(&format!("{}.payment_id", alias), "=", payment_id);
        }
        if let Some(weekday) = &self.weekday {
            filter.push(&format!("{}.pickup_weekday", alias), "=", weekday);
        }
        if let Some(hour) = &self.hour {
            filter.push(&format!("{}.pickup_hour", alias), "=", hour);
        }
        if let Some(start) = &self.start {
            filter.push(&format!("{}.pickup_time", alias), ">=", start);
        }
        if let Some(end) = &self.end {
            filter.push(&format!("{}.pickup_time", alias), "<", end);
        }
        filter
    }
}


/// Filters over the borough × weekday × hour summary aggregate.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize)]
pub struct SummaryFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borough: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekday: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<i32>,
}
impl SummaryFilters {
    pub fn from_query_pairs(query_pairs: &QueryPairs<'_>) -> Result<Self, FilterError> {
        let borough = non_empty(query_pairs, "borough")
            .map(|b| b.trim().to_owned());
        let weekday = match non_empty(query_pairs, "weekday") {
            Some(w) => Some(parse_weekday(w)?),
            None => None,
        };
        let hour = match non_empty(query_pairs, "hour") {
            Some(h) => Some(parse_hour(h)?),
            None => None,
        };
        Ok(Self {
            borough,
            weekday,
            hour,
        })
    }

    pub fn sql_filter<'a>(&'a self, alias: &str) -> SqlFilter<'a> {
        let mut filter = SqlFilter::new();
        if let Some(borough) = &self.borough {
            filter.push(&format!("{}.borough", alias), "=", borough);
        }
        if let Some(weekday) = &self.weekday {
            filter.push(&format!("{}.weekday", alias), "=", weekday);
        }
        if let Some(hour) = &self.hour {
            filter.push(&format!("{}.hour", alias), "=", hour);
        }
        filter
    }
}


#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    #[default]
    Pickup,
    Dropoff,
}
impl ZoneKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Dropoff => "dropoff",
        }
    }

    pub fn zone_column(&self) -> &'static str {
        match self {
            Self::Pickup => "pickup_zone_id",
            Self::Dropoff => "dropoff_zone_id",
        }
    }

    pub fn from_query_pairs(query_pairs: &QueryPairs<'_>) -> Result<Self, FilterError> {
        let value = match non_empty(query_pairs, "type") {
            Some(v) => v,
            None => return Ok(Self::default()),
        };
        match value.trim().to_lowercase().as_str() {
            "pickup" => Ok(Self::Pickup),
            "dropoff" => Ok(Self::Dropoff),
            _ => Err(FilterError::InvalidZoneKind(value.to_owned())),
        }
    }
}


/// Reads the `limit` parameter of the map endpoint, clamping it to the supported range.
pub fn map_limit_from_query_pairs(query_pairs: &QueryPairs<'_>) -> Result<i64, FilterError> {
    let limit = match non_empty(query_pairs, "limit") {
        Some(l) => l.trim().parse::<i64>()
            .map_err(|_| FilterError::InvalidLimit(l.to_owned()))?,
        None => DEFAULT_MAP_LIMIT,
    };
    Ok(limit.clamp(MIN_MAP_LIMIT, MAX_MAP_LIMIT))
}


/// A list of SQL predicates with their positional parameter values (`$1`, `$2`, ...).
pub struct SqlFilter<'a> {
    pieces: Vec<String>,
    values: Vec<&'a (dyn ToSql + Sync)>,
}
impl<'a> SqlFilter<'a> {
    pub fn new() -> Self {
        Self {
            pieces: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn push(&mut self, column: &str, operator: &str, value: &'a (dyn ToSql + Sync)) {
        let index = self.push_value(value);
        self.pieces.push(format!("{} {} ${}", column, operator, index));
    }

    /// Appends a parameter that is not part of the predicates (e.g. a limit) and returns its index.
    pub fn push_value(&mut self, value: &'a (dyn ToSql + Sync)) -> usize {
        self.values.push(value);
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.len() == 0
    }

    pub fn pieces(&self) -> &[String] {
        &self.pieces
    }

    pub fn values(&self) -> &[&'a (dyn ToSql + Sync)] {
        &self.values
    }

    /// `WHERE a AND b`, or an empty string if there are no predicates.
    pub fn where_clause(&self) -> String {
        if self.pieces.len() > 0 {
            format!("WHERE {}", self.pieces.join(" AND "))
        } else {
            String::new()
        }
    }
}


fn non_empty<'q>(query_pairs: &'q QueryPairs<'_>, key: &str) -> Option<&'q str> {
    query_pairs.get(key)
        .map(|v| v.as_ref())
        .filter(|v| v.trim().len() > 0)
}

fn parse_bounded(value: &str, min: i32, max: i32) -> Option<i32> {
    value.trim().parse::<i32>().ok()
        .filter(|v| *v >= min && *v <= max)
}

fn parse_weekday(value: &str) -> Result<i32, FilterError> {
    parse_bounded(value, 0, 6)
        .ok_or_else(|| FilterError::WeekdayOutOfRange(value.to_owned()))
}

fn parse_hour(value: &str) -> Result<i32, FilterError> {
    parse_bounded(value, 0, 23)
        .ok_or_else(|| FilterError::HourOutOfRange(value.to_owned()))
}

/// Accepts `YYYY-MM-DD` (midnight) or a timestamp with a space or `T` separator.
pub fn parse_date_bound(parameter: &'static str, value: &str) -> Result<NaiveDateTime, FilterError> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight);
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(timestamp);
        }
    }
    Err(FilterError::InvalidDate(parameter, value.to_owned()))
}
