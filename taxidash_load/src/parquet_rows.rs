//! Row-wise reading of Parquet trip files.
//!
//! Every cell is rendered as text and handed out as a `StringRecord`, so Parquet rows pass through
//! the same header mapping and coercion as CSV rows.


use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use csv::StringRecord;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};

use crate::errors::LoadError;


const BATCH_SIZE: usize = 8192;


pub struct ParquetRows {
    path: PathBuf,
    reader: ParquetRecordBatchReader,
    pending: VecDeque<StringRecord>,
}
impl ParquetRows {
    /// Opens a Parquet file, returning its column names alongside the row iterator.
    pub fn open(path: &Path) -> Result<(StringRecord, Self), LoadError> {
        let file = File::open(path)
            .map_err(|e| LoadError::OpeningFile(path.to_owned(), e))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| LoadError::Parquet(path.to_owned(), e))?;

        let headers: StringRecord = builder.schema()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();

        let reader = builder
            .with_batch_size(BATCH_SIZE)
            .build()
            .map_err(|e| LoadError::Parquet(path.to_owned(), e))?;
        let rows = Self {
            path: path.to_owned(),
            reader,
            pending: VecDeque::new(),
        };
        Ok((headers, rows))
    }
}
impl Iterator for ParquetRows {
    type Item = Result<StringRecord, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            let batch = match self.reader.next()? {
                Ok(b) => b,
                Err(e) => return Some(Err(LoadError::Arrow(self.path.clone(), e))),
            };
            match batch_records(&batch) {
                Ok(records) => self.pending.extend(records),
                Err(e) => return Some(Err(LoadError::Arrow(self.path.clone(), e))),
            }
        }
    }
}


/// Renders a record batch as text rows; NULL cells become empty fields.
pub fn batch_records(batch: &RecordBatch) -> Result<Vec<StringRecord>, ArrowError> {
    let options = FormatOptions::default();
    let formatters = batch.columns()
        .iter()
        .map(|column| ArrayFormatter::try_new(column.as_ref(), &options))
        .collect::<Result<Vec<ArrayFormatter>, ArrowError>>()?;

    let mut records = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let mut record = StringRecord::with_capacity(0, formatters.len());
        for formatter in &formatters {
            record.push_field(&formatter.value(row).to_string());
        }
        records.push(record);
    }
    Ok(records)
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Float64Array, Int32Array, Int64Array, StringArray, TimestampMicrosecondArray};
    use chrono::NaiveDate;
    use parquet::arrow::ArrowWriter;
    use taxidash_common::model::{PaymentType, Vendor};

    use super::*;
    use crate::records::ColumnMapping;

    fn micros(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, mo, d).unwrap()
            .and_hms_opt(h, mi, s).unwrap()
            .and_utc()
            .timestamp_micros()
    }

    fn tlc_batch() -> RecordBatch {
        let columns: Vec<(&str, ArrayRef)> = vec![
            ("VendorID", Arc::new(Int32Array::from(vec![Some(1), Some(7), None]))),
            ("tpep_pickup_datetime", Arc::new(TimestampMicrosecondArray::from(vec![
                Some(micros(2025, 1, 5, 23, 50, 0)),
                Some(micros(2025, 1, 6, 8, 0, 0)),
                None,
            ]))),
            ("tpep_dropoff_datetime", Arc::new(TimestampMicrosecondArray::from(vec![
                Some(micros(2025, 1, 6, 0, 12, 30)),
                Some(micros(2025, 1, 6, 8, 20, 0)),
                Some(micros(2025, 1, 6, 9, 0, 0)),
            ]))),
            ("passenger_count", Arc::new(Float64Array::from(vec![Some(2.0), None, Some(1.0)]))),
            ("PULocationID", Arc::new(Int32Array::from(vec![Some(161), Some(132), Some(1)]))),
            ("payment_type", Arc::new(Int64Array::from(vec![Some(2), Some(0), Some(1)]))),
            ("fare_amount", Arc::new(Float64Array::from(vec![Some(21.9), Some(70.0), Some(5.0)]))),
            ("store_and_fwd_flag", Arc::new(StringArray::from(vec![Some("N"), None, Some("Y")]))),
        ];
        RecordBatch::try_from_iter(columns).unwrap()
    }

    #[test]
    fn test_batch_records_render_text() {
        let records = batch_records(&tlc_batch()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get(0), Some("1"));
        assert_eq!(records[1].get(3), Some(""));
        assert_eq!(records[2].get(1), Some(""));
        assert_eq!(records[0].get(7), Some("N"));
    }

    #[test]
    fn test_parquet_file_through_column_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yellow_tripdata_2025-01.parquet");
        let batch = tlc_batch();
        {
            let file = File::create(&path).unwrap();
            let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
            writer.write(&batch).unwrap();
            writer.close().unwrap();
        }

        let (headers, rows) = ParquetRows::open(&path).unwrap();
        assert_eq!(headers.get(1), Some("tpep_pickup_datetime"));
        let mapping = ColumnMapping::from_headers(&headers);
        assert!(mapping.missing_required().is_empty());

        let records: Vec<StringRecord> = rows.map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);

        let first = mapping.parse_record(&records[0]).unwrap();
        assert_eq!(first.vendor, Some(Vendor::CreativeMobile));
        assert_eq!(first.pickup_weekday(), 0);
        assert_eq!(first.duration_min(), 22.5);
        assert_eq!(first.passenger_count, Some(2));
        assert_eq!(first.pickup_zone_id, Some(161));
        assert_eq!(first.payment, PaymentType::Cash);
        assert_eq!(first.fare, 21.9);
        assert_eq!(first.store_and_fwd_flag.as_deref(), Some("N"));

        let second = mapping.parse_record(&records[1]).unwrap();
        assert_eq!(second.vendor, None);
        assert_eq!(second.passenger_count, None);
        assert_eq!(second.payment, PaymentType::Unknown);

        // no pickup time
        assert!(mapping.parse_record(&records[2]).is_err());
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let res = ParquetRows::open(&dir.path().join("absent.parquet"));
        assert!(matches!(res, Err(LoadError::OpeningFile(_, _))));
    }
}
