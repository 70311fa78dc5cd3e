use askama::Template;
use serde::Serialize;


#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub(crate) struct EndpointPart {
    pub method: &'static str,
    pub path: &'static str,
    pub parameters: &'static str,
    pub description: &'static str,
}

pub(crate) const ENDPOINTS: [EndpointPart; 8] = [
    EndpointPart {
        method: "GET",
        path: "/api/health",
        parameters: "",
        description: "database connectivity check",
    },
    EndpointPart {
        method: "GET",
        path: "/api/trip-analytics",
        parameters: "vendor_id, payment_id, weekday, hour, start, end",
        description: "KPIs with payment, borough, weekday and hour breakdowns",
    },
    EndpointPart {
        method: "POST",
        path: "/api/refresh-trip-analytics",
        parameters: "",
        description: "recompute all aggregates",
    },
    EndpointPart {
        method: "GET",
        path: "/api/trip-summary",
        parameters: "borough, weekday, hour",
        description: "trip counts and averages by borough, weekday and hour",
    },
    EndpointPart {
        method: "GET",
        path: "/api/map-density",
        parameters: "vendor_id, payment_id, weekday, hour, start, end, type, limit",
        description: "trip counts per pickup or dropoff zone",
    },
    EndpointPart {
        method: "GET",
        path: "/api/fare-tip-analysis",
        parameters: "vendor_id, payment_id, weekday, hour, start, end",
        description: "average fare, tip and tip ratio by weekday, hour and payment type",
    },
    EndpointPart {
        method: "GET",
        path: "/api/peak-hours",
        parameters: "vendor_id, payment_id, start, end",
        description: "the ten busiest weekday/hour slots",
    },
    EndpointPart {
        method: "GET",
        path: "/api/vendor-performance",
        parameters: "payment_id, weekday, hour, start, end",
        description: "averages and revenue per vendor",
    },
];


#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Template)]
#[template(path = "index.html")]
pub(crate) struct IndexTemplate {
    pub endpoints: Vec<EndpointPart>,
}
impl IndexTemplate {
    pub fn new() -> Self {
        Self {
            endpoints: ENDPOINTS.to_vec(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_lists_every_endpoint() {
        let rendered = IndexTemplate::new().render().unwrap();
        for endpoint in ENDPOINTS {
            assert!(rendered.contains(endpoint.path), "index lacks {}", endpoint.path);
        }
    }
}
