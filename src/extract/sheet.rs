//! Public restroom registry spreadsheets.
//!
//! Registries come as XLSX/XLS/ODS workbooks or as CSV (optionally gzipped). Only
//! the first worksheet is read; the first row holds the headers. Header names vary
//! between publishers, so every field is looked up through a list of aliases.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::Facility;
use crate::region::{infer_region, Region};

const LAT_KEYS: &[&str] = &["위도", "WGS84위도", "latitude"];
const LNG_KEYS: &[&str] = &["경도", "WGS84경도", "longitude"];
const NAME_KEYS: &[&str] = &["화장실명", "시설명", "name"];
const ADDRESS_KEYS: &[&str] = &["소재지도로명주소", "소재지지번주소", "도로명주소", "주소"];
const KIND_KEYS: &[&str] = &["구분", "화장실구분", "유형"];
const OPEN_TIME_KEYS: &[&str] = &["개방시간", "운영시간"];
const MANAGER_KEYS: &[&str] = &["관리기관명", "관리기관"];
const PHONE_KEYS: &[&str] = &["전화번호", "연락처"];

/// Fixture count columns: attribute key → header aliases
const COUNT_COLUMNS: &[(&str, &[&str])] = &[
    ("maleToilet", &["남성용-대변기수", "남성용대변기수"]),
    ("maleUrinal", &["남성용-소변기수", "남성용소변기수"]),
    ("femaleToilet", &["여성용-대변기수", "여성용대변기수"]),
    ("disabledToilet", &["장애인용-남성대변기수", "장애인용남성대변기수"]),
];

const DEFAULT_NAME: &str = "공중화장실";
const DEFAULT_OPEN_TIME: &str = "24시간";

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];

/// One data row keyed by header name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetRow {
    cells: HashMap<String, String>,
}

impl SheetRow {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// First non-empty cell among the alias headers.
    pub fn first(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.cells.get(*k))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }

    /// First alias cell that parses as a finite, non-zero number.
    pub fn first_number(&self, keys: &[&str]) -> Option<f64> {
        let value: f64 = self.first(keys)?.parse().ok()?;
        (value.is_finite() && value != 0.0).then_some(value)
    }

    pub fn address(&self) -> &str {
        self.first(ADDRESS_KEYS).unwrap_or("")
    }

    fn is_blank(&self) -> bool {
        self.cells.values().all(|v| v.trim().is_empty())
    }
}

/// Result of turning a registry sheet into facilities.
#[derive(Debug, Clone)]
pub struct FacilityBatch {
    pub region: Region,
    pub facilities: Vec<Facility>,
    pub total_rows: usize,
}

impl FacilityBatch {
    pub fn dropped_rows(&self) -> usize {
        self.total_rows - self.facilities.len()
    }
}

/// Read the rows of the first worksheet of a registry file.
pub fn read_rows(file_name: Option<&str>, bytes: &[u8]) -> Result<Vec<SheetRow>> {
    let lower = file_name.map(str::to_ascii_lowercase).unwrap_or_default();

    if bytes.starts_with(GZIP_MAGIC) || lower.ends_with(".gz") {
        debug!("Reading gzip-compressed CSV");
        return read_csv_rows(GzDecoder::new(bytes));
    }
    if lower.ends_with(".csv") {
        return read_csv_rows(bytes);
    }
    read_workbook_rows(bytes)
}

fn read_workbook_rows(bytes: &[u8]) -> Result<Vec<SheetRow>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::NoDataFound("workbook has no worksheets".to_string()))?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row.iter().map(|c| cell_text(c).trim().to_string()).collect();

    Ok(rows
        .map(|row| {
            SheetRow::from_pairs(
                headers
                    .iter()
                    .zip(row.iter())
                    .filter(|(h, _)| !h.is_empty())
                    .map(|(h, c)| (h.clone(), cell_text(c))),
            )
        })
        .filter(|row| !row.is_blank())
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        other => other.to_string(),
    }
}

fn read_csv_rows<R: Read>(reader: R) -> Result<Vec<SheetRow>> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let row = SheetRow::from_pairs(
            headers
                .iter()
                .zip(record.iter())
                .filter(|(h, _)| !h.is_empty())
                .map(|(h, v)| (h.clone(), v.to_string())),
        );
        if !row.is_blank() {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Turn registry rows into facilities stamped with the batch region.
///
/// The region is inferred once from the leading rows and applied to every row.
/// Rows without a usable latitude and longitude are dropped; ids keep the row's
/// position in the sheet.
pub fn extract_facilities(rows: &[SheetRow], ingested_at: DateTime<Utc>) -> FacilityBatch {
    let region = infer_region(rows.iter().map(SheetRow::address));
    info!("Inferred region {} from {} rows", region, rows.len());

    let stamp = ingested_at.timestamp_millis();
    let facilities: Vec<Facility> = rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| row_to_facility(row, region, stamp, index))
        .collect();

    FacilityBatch {
        region,
        facilities,
        total_rows: rows.len(),
    }
}

fn row_to_facility(row: &SheetRow, region: Region, stamp: i64, index: usize) -> Option<Facility> {
    let lat = row.first_number(LAT_KEYS)?;
    let lng = row.first_number(LNG_KEYS)?;

    let attribute_counts: BTreeMap<String, u32> = COUNT_COLUMNS
        .iter()
        .filter_map(|(key, aliases)| {
            let value: f64 = row.first(aliases)?.parse().ok()?;
            (value.is_finite() && value >= 0.0).then(|| (key.to_string(), value.round() as u32))
        })
        .collect();

    Some(Facility {
        id: Facility::make_id(region, stamp, index),
        name: row.first(NAME_KEYS).unwrap_or(DEFAULT_NAME).to_string(),
        address: row.address().to_string(),
        region,
        lat,
        lng,
        kind: row.first(KIND_KEYS).unwrap_or("").to_string(),
        attribute_counts,
        open_time: row.first(OPEN_TIME_KEYS).unwrap_or(DEFAULT_OPEN_TIME).to_string(),
        manager: row.first(MANAGER_KEYS).unwrap_or("").to_string(),
        phone: row.first(PHONE_KEYS).unwrap_or("").to_string(),
    })
}
