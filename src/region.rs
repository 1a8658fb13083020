//! Korean administrative regions and batch-level region inference.
//!
//! Facility registries are published per region without a region column, so the
//! region of an uploaded batch is inferred from the addresses of its first rows and
//! then applied to every row of the batch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rows inspected when inferring the region of a batch.
pub const REGION_SAMPLE_SIZE: usize = 20;

/// Canonical region values (17 metropolitan/provincial areas plus "other").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "서울시")]
    Seoul,
    #[serde(rename = "부산시")]
    Busan,
    #[serde(rename = "대구시")]
    Daegu,
    #[serde(rename = "인천시")]
    Incheon,
    #[serde(rename = "광주시")]
    Gwangju,
    #[serde(rename = "대전시")]
    Daejeon,
    #[serde(rename = "울산시")]
    Ulsan,
    #[serde(rename = "세종시")]
    Sejong,
    #[serde(rename = "경기도")]
    Gyeonggi,
    #[serde(rename = "강원도")]
    Gangwon,
    #[serde(rename = "충청북도")]
    Chungbuk,
    #[serde(rename = "충청남도")]
    Chungnam,
    #[serde(rename = "전라북도")]
    Jeonbuk,
    #[serde(rename = "전라남도")]
    Jeonnam,
    #[serde(rename = "경상북도")]
    Gyeongbuk,
    #[serde(rename = "경상남도")]
    Gyeongnam,
    #[serde(rename = "제주도")]
    Jeju,
    #[serde(rename = "기타")]
    Other,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Seoul => "서울시",
            Region::Busan => "부산시",
            Region::Daegu => "대구시",
            Region::Incheon => "인천시",
            Region::Gwangju => "광주시",
            Region::Daejeon => "대전시",
            Region::Ulsan => "울산시",
            Region::Sejong => "세종시",
            Region::Gyeonggi => "경기도",
            Region::Gangwon => "강원도",
            Region::Chungbuk => "충청북도",
            Region::Chungnam => "충청남도",
            Region::Jeonbuk => "전라북도",
            Region::Jeonnam => "전라남도",
            Region::Gyeongbuk => "경상북도",
            Region::Gyeongnam => "경상남도",
            Region::Jeju => "제주도",
            Region::Other => "기타",
        }
    }

    /// All regions, "other" last
    pub fn all() -> &'static [Region] {
        &[
            Region::Seoul,
            Region::Busan,
            Region::Daegu,
            Region::Incheon,
            Region::Gwangju,
            Region::Daejeon,
            Region::Ulsan,
            Region::Sejong,
            Region::Gyeonggi,
            Region::Gangwon,
            Region::Chungbuk,
            Region::Chungnam,
            Region::Jeonbuk,
            Region::Jeonnam,
            Region::Gyeongbuk,
            Region::Gyeongnam,
            Region::Jeju,
            Region::Other,
        ]
    }

    /// Region named by the first alias contained in `address`.
    ///
    /// Aliases are checked in table order, so "경기도 광주시" resolves to 광주시.
    pub fn from_address(address: &str) -> Option<Region> {
        REGION_ALIASES
            .iter()
            .find(|(alias, _)| address.contains(alias))
            .map(|(_, region)| *region)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == Region::Other.as_str() {
            return Ok(Region::Other);
        }
        REGION_ALIASES
            .iter()
            .find(|(alias, _)| *alias == s)
            .map(|(_, region)| *region)
            .ok_or_else(|| format!("unknown region: {}", s))
    }
}

/// Alias → canonical region. Order matters: the first contained alias wins.
const REGION_ALIASES: &[(&str, Region)] = &[
    ("서울", Region::Seoul),
    ("서울특별시", Region::Seoul),
    ("서울시", Region::Seoul),
    ("부산", Region::Busan),
    ("부산광역시", Region::Busan),
    ("부산시", Region::Busan),
    ("대구", Region::Daegu),
    ("대구광역시", Region::Daegu),
    ("대구시", Region::Daegu),
    ("인천", Region::Incheon),
    ("인천광역시", Region::Incheon),
    ("인천시", Region::Incheon),
    ("광주", Region::Gwangju),
    ("광주광역시", Region::Gwangju),
    ("광주시", Region::Gwangju),
    ("대전", Region::Daejeon),
    ("대전광역시", Region::Daejeon),
    ("대전시", Region::Daejeon),
    ("울산", Region::Ulsan),
    ("울산광역시", Region::Ulsan),
    ("울산시", Region::Ulsan),
    ("세종", Region::Sejong),
    ("세종특별자치시", Region::Sejong),
    ("세종시", Region::Sejong),
    ("경기", Region::Gyeonggi),
    ("경기도", Region::Gyeonggi),
    ("강원", Region::Gangwon),
    ("강원도", Region::Gangwon),
    ("강원특별자치도", Region::Gangwon),
    ("충북", Region::Chungbuk),
    ("충청북도", Region::Chungbuk),
    ("충남", Region::Chungnam),
    ("충청남도", Region::Chungnam),
    ("전북", Region::Jeonbuk),
    ("전라북도", Region::Jeonbuk),
    ("전북특별자치도", Region::Jeonbuk),
    ("전남", Region::Jeonnam),
    ("전라남도", Region::Jeonnam),
    ("경북", Region::Gyeongbuk),
    ("경상북도", Region::Gyeongbuk),
    ("경남", Region::Gyeongnam),
    ("경상남도", Region::Gyeongnam),
    ("제주", Region::Jeju),
    ("제주도", Region::Jeju),
    ("제주특별자치도", Region::Jeju),
];

/// Infer the dominant region of a batch from its addresses.
///
/// Only the first [`REGION_SAMPLE_SIZE`] entries are inspected; blank addresses
/// count as a sampled row without a vote. Each row votes for at most one region.
/// Ties go to the region that comes first in the alias table. Without any vote
/// the batch is [`Region::Other`].
pub fn infer_region<'a, I>(addresses: I) -> Region
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = [0usize; 18];

    for address in addresses.into_iter().take(REGION_SAMPLE_SIZE) {
        if address.trim().is_empty() {
            continue;
        }
        if let Some(region) = Region::from_address(address) {
            counts[region as usize] += 1;
        }
    }

    let mut best = Region::Other;
    let mut best_count = 0;
    for (_, region) in REGION_ALIASES {
        let count = counts[*region as usize];
        if count > best_count {
            best = *region;
            best_count = count;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_normalization() {
        assert_eq!(Region::from_address("서울특별시 중구 세종대로 110"), Some(Region::Seoul));
        assert_eq!(Region::from_address("강원특별자치도 춘천시"), Some(Region::Gangwon));
        assert_eq!(Region::from_address("전북특별자치도 전주시"), Some(Region::Jeonbuk));
        assert_eq!(Region::from_address("Tokyo"), None);
    }

    #[test]
    fn test_first_alias_wins() {
        // 광주 precedes 경기 in the table
        assert_eq!(Region::from_address("경기도 광주시 오포읍"), Some(Region::Gwangju));
    }

    #[test]
    fn test_majority_region() {
        let mut addresses = vec!["경기도 수원시 팔달구"; 15];
        addresses.extend(vec!["서울시 강남구"; 5]);
        assert_eq!(infer_region(addresses), Region::Gyeonggi);
    }

    #[test]
    fn test_only_first_twenty_sampled() {
        let mut addresses = vec!["부산광역시 해운대구"; 20];
        addresses.extend(vec!["대구광역시 중구"; 100]);
        assert_eq!(infer_region(addresses), Region::Busan);
    }

    #[test]
    fn test_blank_rows_consume_sample() {
        let mut addresses = vec![""; 20];
        addresses.push("서울시 종로구");
        assert_eq!(infer_region(addresses), Region::Other);
    }

    #[test]
    fn test_no_match_is_other() {
        assert_eq!(infer_region(vec!["", "unknown"]), Region::Other);
        assert_eq!(infer_region(Vec::<&str>::new()), Region::Other);
    }

    #[test]
    fn test_tie_uses_table_order() {
        let addresses = vec!["제주시 연동", "서울시 종로구"];
        assert_eq!(infer_region(addresses), Region::Seoul);
    }

    #[test]
    fn test_serde_uses_canonical_labels() {
        let json = serde_json::to_string(&Region::Gyeonggi).unwrap();
        assert_eq!(json, "\"경기도\"");
        let region: Region = serde_json::from_str("\"기타\"").unwrap();
        assert_eq!(region, Region::Other);
    }

    #[test]
    fn test_from_str_accepts_aliases() {
        assert_eq!("서울".parse::<Region>(), Ok(Region::Seoul));
        assert_eq!("경상남도".parse::<Region>(), Ok(Region::Gyeongnam));
        assert!("Atlantis".parse::<Region>().is_err());
    }
}
