use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::path::Path;

use serde::Deserialize;
use taxidash_common::errors::DbError;
use taxidash_common::model::Zone;
use tracing::{info, warn};

use crate::errors::LoadError;


/// A row of the TLC `taxi_zone_lookup.csv`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
struct ZoneLookupRow {
    #[serde(rename = "LocationID")]
    pub location_id: i32,
    #[serde(rename = "Borough")]
    pub borough: Option<String>,
    #[serde(rename = "Zone")]
    pub zone: Option<String>,
    pub service_zone: Option<String>,
}
impl From<ZoneLookupRow> for Zone {
    fn from(row: ZoneLookupRow) -> Self {
        Zone {
            zone_id: row.location_id,
            borough: row.borough,
            zone_name: row.zone,
            service_zone: row.service_zone,
        }
    }
}


pub fn read_zones_from<R: io::Read>(reader: R) -> Result<Vec<Zone>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .quote(b'"')
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut zones = Vec::new();
    for row_res in csv_reader.deserialize() {
        let row: ZoneLookupRow = row_res?;
        zones.push(Zone::from(row));
    }
    Ok(zones)
}


/// Upserts every zone by ID inside one transaction.
pub async fn upsert_zones(client: &mut tokio_postgres::Client, zones: &[Zone]) -> Result<u64, DbError> {
    let transaction = client.transaction().await
        .map_err(|e| DbError::Querying(e))?;
    let stmt = transaction.prepare(
        "
            INSERT INTO zones (zone_id, borough, zone_name, service_zone)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (zone_id) DO UPDATE SET
                borough = excluded.borough,
                zone_name = excluded.zone_name,
                service_zone = excluded.service_zone
        "
    ).await
        .map_err(|e| DbError::Querying(e))?;

    let mut count = 0;
    for zone in zones {
        count += transaction.execute(&stmt, &[&zone.zone_id, &zone.borough, &zone.zone_name, &zone.service_zone]).await
            .map_err(|e| DbError::Querying(e))?;
    }
    transaction.commit().await
        .map_err(|e| DbError::Querying(e))?;
    Ok(count)
}


/// Loads the zone lookup file if one is configured and present.
///
/// A missing file is not an error; trips then reference no zones.
pub async fn load_zones(client: &mut tokio_postgres::Client, path_opt: Option<&Path>) -> Result<usize, LoadError> {
    let Some(path) = path_opt else {
        warn!("no zone lookup file configured; skipping zone load");
        return Ok(0);
    };
    if !path.exists() {
        warn!("zone lookup file {} not found; skipping zone load", path.display());
        return Ok(0);
    }

    info!("loading zones from {}", path.display());
    let file = File::open(path)
        .map_err(|e| LoadError::OpeningFile(path.to_owned(), e))?;
    let zones = read_zones_from(file)
        .map_err(|e| LoadError::Csv(path.to_owned(), e))?;
    upsert_zones(client, &zones).await?;
    info!("loaded {} zones", zones.len());
    Ok(zones.len())
}


pub async fn known_zone_ids(client: &tokio_postgres::Client) -> Result<HashSet<i32>, DbError> {
    let rows = client.query("SELECT zone_id FROM zones", &[]).await
        .map_err(|e| DbError::Querying(e))?;
    Ok(rows.iter().map(|r| r.get(0)).collect())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_zones() {
        let csv_text = concat!(
            "\"LocationID\",\"Borough\",\"Zone\",\"service_zone\"\n",
            "1,\"EWR\",\"Newark Airport\",\"EWR\"\n",
            "132,\"Queens\",\"JFK Airport\",\"Airports\"\n",
            "264,\"Unknown\",\"N/A\",\"N/A\"\n",
            "265,\"N/A\",\"Outside of NYC\",\n",
        );
        let zones = read_zones_from(csv_text.as_bytes()).unwrap();
        assert_eq!(zones.len(), 4);
        assert_eq!(zones[1], Zone {
            zone_id: 132,
            borough: Some("Queens".to_owned()),
            zone_name: Some("JFK Airport".to_owned()),
            service_zone: Some("Airports".to_owned()),
        });
        assert_eq!(zones[3].service_zone, None);
    }

    #[test]
    fn test_read_zones_rejects_bad_ids() {
        let csv_text = "LocationID,Borough,Zone,service_zone\nabc,Queens,Somewhere,Boro Zone\n";
        assert!(read_zones_from(csv_text.as_bytes()).is_err());
    }
}
