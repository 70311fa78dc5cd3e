use std::time::Instant;

use hyper::Method;
use hyper::http::request::Parts;
use taxidash_common::filters::{FilterField, TripFilters};
use taxidash_common::queries::{peak_hours, PEAK_HOUR_LIMIT};

use crate::{
    connect_to_db, get_query_pairs, render_api_response, return_400, return_405, return_db_error,
    ResponseResult,
};
use crate::response::Metadata;


const ACCEPTED_FILTERS: [FilterField; 4] = [
    FilterField::VendorId,
    FilterField::PaymentId,
    FilterField::Start,
    FilterField::End,
];


pub(crate) async fn handle_peak_hours(parts: &Parts) -> ResponseResult {
    if parts.method != Method::GET {
        return return_405(&["GET"]);
    }

    let query_pairs = get_query_pairs(parts);
    let filters = match TripFilters::from_query_pairs(&query_pairs, &ACCEPTED_FILTERS) {
        Ok(f) => f,
        Err(e) => return return_400(&e.to_string()),
    };

    let started = Instant::now();
    let client = match connect_to_db().await {
        Ok(c) => c,
        Err(response) => return response,
    };
    let queried = match peak_hours(&client, &filters).await {
        Ok(q) => q,
        Err(e) => return return_db_error(&e),
    };

    let metadata = Metadata::new(queried.data.len(), &filters, Some(queried.data_source), started)
        .with_extra("limit", PEAK_HOUR_LIMIT);
    render_api_response(metadata, &queried.data)
}
