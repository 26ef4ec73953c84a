//! Row-to-record mapping
//!
//! Pure functions from a header-keyed CSV row to the typed domain records.
//! Nothing here does I/O; unrecognized values are reported back to the
//! caller instead of being logged from inside the mapping.

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};

use crate::services::csv_stream::RawRecord;
use crate::types::{
    property_key, tenant_id, Contract, Location, Management, Name, Property, Room, Tenant,
    TimePeriod,
};

// Column names of the vendor export
pub const COL_PROPERTY_NO: &str = "物件No";
pub const COL_PROPERTY_NAME: &str = "物件名";
pub const COL_PROPERTY_NAME_KANA: &str = "物件名カナ";
pub const COL_POSTAL_CODE: &str = "郵便番号";
pub const COL_PREFECTURE: &str = "都道府県名";
pub const COL_MUNICIPALITY: &str = "市区町村名";
pub const COL_DISTRICT: &str = "町地域";
pub const COL_BLOCK: &str = "丁目など";
pub const COL_HOUSE_NUMBER: &str = "番地";
pub const COL_KIND: &str = "物件分類";
pub const COL_MGMT_START: &str = "業務対象開始";
pub const COL_MGMT_END: &str = "業務対象終了";
pub const COL_ROOM_NO: &str = "部屋No";
pub const COL_LAYOUT: &str = "間取り";
pub const COL_CONTRACT_STATUS: &str = "契約状況";
pub const COL_CONTRACT_START: &str = "契約始期";
pub const COL_TENANT_NAME: &str = "契約者名(SJIS)";
pub const COL_TENANT_NO: &str = "契約者No";

// Contract status codes
const STATUS_TENANTED: &str = "契約中";
const STATUS_TERMINATING: &str = "解約予定";
const STATUS_ENDED: &str = "契約終了";
const STATUS_VACANT: &str = "空　室";
const STATUS_OTHER_AGENCY: &str = "契約中(他社)";

fn field<'a>(row: &'a RawRecord, name: &str) -> &'a str {
    row.get(name).map(String::as_str).unwrap_or("")
}

/// Join the block segment and the house-number segment of an address.
///
/// A literal hyphen goes between them iff both are non-empty and the
/// adjacent characters are both digits ("1丁目2" + "3" reads wrong without
/// one); otherwise plain concatenation.
pub fn concat_address(left: &str, right: &str) -> String {
    let left_digit = left.chars().next_back().is_some_and(char::is_numeric);
    let right_digit = right.chars().next().is_some_and(char::is_numeric);
    if !left.is_empty() && !right.is_empty() && left_digit && right_digit {
        format!("{}-{}", left, right)
    } else {
        format!("{}{}", left, right)
    }
}

/// Map one row of the ck-properties export.
///
/// Returns `None` when the property number column is empty, since no
/// stable key can be derived for the row.
pub fn property_from_row(row: &RawRecord) -> Option<(String, Property)> {
    let source_no = field(row, COL_PROPERTY_NO);
    if source_no.is_empty() {
        return None;
    }

    let block = format!(
        "{}{}{}{}",
        field(row, COL_PREFECTURE),
        field(row, COL_MUNICIPALITY),
        field(row, COL_DISTRICT),
        field(row, COL_BLOCK),
    );
    let property = Property {
        name: Name {
            ja: field(row, COL_PROPERTY_NAME).to_string(),
            ja_kata: field(row, COL_PROPERTY_NAME_KANA).to_string(),
        },
        location: Location {
            address: concat_address(&block, field(row, COL_HOUSE_NUMBER)),
            postal_code: field(row, COL_POSTAL_CODE).to_string(),
            ..Default::default()
        },
        kind: field(row, COL_KIND).to_string(),
        management: Management::default(),
    };

    Some((property_key(source_no), property))
}

fn tokyo() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("UTC+9 is a valid offset")
}

/// Parse an exactly-7-byte `YYYY/MM` string. Anything else means absent.
fn year_month(s: &str) -> Option<(i32, u32)> {
    if s.len() != 7 {
        return None;
    }
    let year = s.get(0..4)?.parse().ok()?;
    let month = s.get(5..7)?.parse().ok()?;
    Some((year, month))
}

/// First instant of the given month, Asia/Tokyo.
fn month_start(s: &str) -> Option<DateTime<Utc>> {
    let (year, month) = year_month(s)?;
    tokyo()
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .map(|t| t.with_timezone(&Utc))
}

/// Last second of the given month, Asia/Tokyo.
fn month_end(s: &str) -> Option<DateTime<Utc>> {
    let (year, month) = year_month(s)?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    tokyo()
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .map(|t| (t - Duration::seconds(1)).with_timezone(&Utc))
}

/// Map one row of the ck-property-managements export.
///
/// `now` is the wall-clock snapshot taken once for the whole import run,
/// so every row of one upload sees the same instant.
pub fn management_from_row(row: &RawRecord, now: DateTime<Utc>) -> Option<(String, Management)> {
    let source_no = field(row, COL_PROPERTY_NO);
    if source_no.is_empty() {
        return None;
    }

    let mut management = Management {
        start_date: month_start(field(row, COL_MGMT_START)),
        end_date: month_end(field(row, COL_MGMT_END)),
        in_service: false,
    };
    management.compute_in_service(now);

    Some((property_key(source_no), management))
}

/// A mapped room row, plus the raw status code when it matched no branch
#[derive(Debug, Clone)]
pub struct MappedRoom {
    pub property_key: String,
    pub room_no: String,
    pub room: Room,
    pub unknown_status: Option<String>,
}

/// Map one row of the ck-rooms export.
///
/// Returns `None` for rows with an empty room number: those are the
/// vendor's per-property summary rows and must never be persisted.
pub fn room_from_row(row: &RawRecord) -> Option<MappedRoom> {
    let room_no = field(row, COL_ROOM_NO);
    if room_no.is_empty() {
        return None;
    }

    let mut room = Room {
        layout: field(row, COL_LAYOUT).to_string(),
        ..Default::default()
    };
    let mut unknown_status = None;

    match field(row, COL_CONTRACT_STATUS) {
        STATUS_TENANTED | STATUS_TERMINATING | STATUS_ENDED => {
            let start = field(row, COL_CONTRACT_START).to_string();
            room.contract = Some(Contract {
                // TODO: confirm which vendor column carries the contract end
                // date — the export is currently read with both ends of the
                // period taken from 契約始期.
                period: TimePeriod {
                    from: start.clone(),
                    to: start,
                },
                tenant: Tenant {
                    id: tenant_id(field(row, COL_TENANT_NO)),
                    name: field(row, COL_TENANT_NAME).to_string(),
                },
            });
        }
        STATUS_VACANT => room.rentable.rentable = true,
        STATUS_OTHER_AGENCY => room.rentable.reason = STATUS_OTHER_AGENCY.to_string(),
        other => unknown_status = Some(other.to_string()),
    }

    Some(MappedRoom {
        property_key: property_key(field(row, COL_PROPERTY_NO)),
        room_no: room_no.to_string(),
        room,
        unknown_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_concat_address_hyphen_between_digits() {
        assert_eq!(concat_address("123", "4"), "123-4");
    }

    #[test]
    fn test_concat_address_no_hyphen_after_non_digit() {
        assert_eq!(concat_address("東京都", "4"), "東京都4");
    }

    #[test]
    fn test_concat_address_empty_left() {
        assert_eq!(concat_address("", "4"), "4");
        assert_eq!(concat_address("123", ""), "123");
    }

    #[test]
    fn test_concat_address_fullwidth_digits() {
        // Unicode digit classification, not ASCII
        assert_eq!(concat_address("銀座４", "５"), "銀座４-５");
    }

    #[test]
    fn test_property_from_row() {
        let rec = row(&[
            (COL_PROPERTY_NO, "42"),
            (COL_PROPERTY_NAME, "グリーンハイツ"),
            (COL_PROPERTY_NAME_KANA, "グリーンハイツ"),
            (COL_POSTAL_CODE, "150-0001"),
            (COL_PREFECTURE, "東京都"),
            (COL_MUNICIPALITY, "渋谷区"),
            (COL_DISTRICT, "神宮前"),
            (COL_BLOCK, "1丁目2"),
            (COL_HOUSE_NUMBER, "3"),
            (COL_KIND, "マンション"),
        ]);
        let (key, prop) = property_from_row(&rec).unwrap();
        assert_eq!(key, "ck-42");
        assert_eq!(prop.name.ja, "グリーンハイツ");
        assert_eq!(prop.location.postal_code, "150-0001");
        assert_eq!(prop.location.address, "東京都渋谷区神宮前1丁目2-3");
        assert_eq!(prop.kind, "マンション");
    }

    #[test]
    fn test_property_from_row_without_source_no() {
        assert!(property_from_row(&row(&[(COL_PROPERTY_NAME, "名無し")])).is_none());
    }

    #[test]
    fn test_month_start_is_first_instant_jst() {
        let start = month_start("2023/04").unwrap();
        assert_eq!(start.to_rfc3339(), "2023-03-31T15:00:00+00:00"); // 2023-04-01T00:00:00+09:00
    }

    #[test]
    fn test_month_end_is_last_second_jst() {
        let end = month_end("2023/04").unwrap();
        assert_eq!(end.to_rfc3339(), "2023-04-30T14:59:59+00:00"); // 2023-04-30T23:59:59+09:00
    }

    #[test]
    fn test_month_end_december_rollover() {
        let end = month_end("2022/12").unwrap();
        assert_eq!(end.to_rfc3339(), "2022-12-31T14:59:59+00:00"); // 2022-12-31T23:59:59+09:00
    }

    #[test]
    fn test_year_month_rejects_other_lengths() {
        assert!(month_start("2023/4").is_none());
        assert!(month_start("2023-004").is_none());
        assert!(month_start("").is_none());
        assert!(month_start("2023/1x").is_none());
    }

    #[test]
    fn test_management_window_straddling_now_is_in_service() {
        let now = Utc.with_ymd_and_hms(2023, 6, 15, 0, 0, 0).unwrap();
        let rec = row(&[
            (COL_PROPERTY_NO, "7"),
            (COL_MGMT_START, "2023/04"),
            (COL_MGMT_END, "2024/03"),
        ]);
        let (key, man) = management_from_row(&rec, now).unwrap();
        assert_eq!(key, "ck-7");
        assert!(man.in_service);
    }

    #[test]
    fn test_management_past_end_not_in_service() {
        let now = Utc.with_ymd_and_hms(2023, 6, 15, 0, 0, 0).unwrap();
        let rec = row(&[
            (COL_PROPERTY_NO, "7"),
            (COL_MGMT_START, "2022/04"),
            (COL_MGMT_END, "2023/03"),
        ]);
        let (_, man) = management_from_row(&rec, now).unwrap();
        assert!(man.start_date.is_some());
        assert!(!man.in_service);
    }

    #[test]
    fn test_management_bad_lengths_mean_absent() {
        let now = Utc::now();
        let rec = row(&[
            (COL_PROPERTY_NO, "7"),
            (COL_MGMT_START, "2023/4"),
            (COL_MGMT_END, ""),
        ]);
        let (_, man) = management_from_row(&rec, now).unwrap();
        assert!(man.start_date.is_none());
        assert!(man.end_date.is_none());
        assert!(!man.in_service);
    }

    #[test]
    fn test_room_tenanted_builds_contract() {
        let rec = row(&[
            (COL_PROPERTY_NO, "42"),
            (COL_ROOM_NO, "201"),
            (COL_LAYOUT, "1LDK"),
            (COL_CONTRACT_STATUS, "契約中"),
            (COL_CONTRACT_START, "2021/04/01"),
            (COL_TENANT_NAME, "山田太郎"),
            (COL_TENANT_NO, "555"),
        ]);
        let mapped = room_from_row(&rec).unwrap();
        assert_eq!(mapped.property_key, "ck-42");
        assert_eq!(mapped.room_no, "201");
        assert_eq!(mapped.room.layout, "1LDK");
        let contract = mapped.room.contract.unwrap();
        // Observed vendor behaviour: both period ends come from 契約始期
        assert_eq!(contract.period.from, "2021/04/01");
        assert_eq!(contract.period.to, "2021/04/01");
        assert_eq!(contract.tenant.id, "ck-tenant-555");
        assert_eq!(contract.tenant.name, "山田太郎");
        assert!(!mapped.room.rentable.rentable);
        assert!(mapped.unknown_status.is_none());
    }

    #[test]
    fn test_room_vacant_is_rentable() {
        let rec = row(&[
            (COL_PROPERTY_NO, "42"),
            (COL_ROOM_NO, "202"),
            (COL_CONTRACT_STATUS, "空　室"),
        ]);
        let mapped = room_from_row(&rec).unwrap();
        assert!(mapped.room.contract.is_none());
        assert!(mapped.room.rentable.rentable);
        assert!(mapped.room.rentable.reason.is_empty());
    }

    #[test]
    fn test_room_other_agency_sets_reason() {
        let rec = row(&[
            (COL_PROPERTY_NO, "42"),
            (COL_ROOM_NO, "203"),
            (COL_CONTRACT_STATUS, "契約中(他社)"),
        ]);
        let mapped = room_from_row(&rec).unwrap();
        assert!(mapped.room.contract.is_none());
        assert!(!mapped.room.rentable.rentable);
        assert_eq!(mapped.room.rentable.reason, "契約中(他社)");
    }

    #[test]
    fn test_room_unknown_status_is_surfaced() {
        let rec = row(&[
            (COL_PROPERTY_NO, "42"),
            (COL_ROOM_NO, "204"),
            (COL_CONTRACT_STATUS, "審査中"),
        ]);
        let mapped = room_from_row(&rec).unwrap();
        assert!(mapped.room.contract.is_none());
        assert!(!mapped.room.rentable.rentable);
        assert_eq!(mapped.unknown_status.as_deref(), Some("審査中"));
    }

    #[test]
    fn test_summary_row_is_discarded() {
        let rec = row(&[(COL_PROPERTY_NO, "42"), (COL_ROOM_NO, "")]);
        assert!(room_from_row(&rec).is_none());
    }
}
