//! Built-in Availability Period report
//!
//! Builds the complete aggregation script for the availability report:
//! capacity, availability, sold room-nights, occupancy, share of sold rooms,
//! average daily rate and RevPAR per room category, plus a totals row.
//!
//! The script works on session temp tables, so it must run as one batch on a
//! single connection (see `PgQueryExecutor`).
//!
//! Source tables:
//! - `kat` (room categories: `katnr`, `kat`, `katpos`, `zimmer`)
//! - `zimmer` (rooms: `ziname`, `kat`, `mpehotel`)
//! - `hitstatistic` (daily statistics: `katnr`, `date`, `occupancy`, `reschar`,
//!   `kattyp`, `mpehotel`, `stationid`, `logis`, `logisnet`)

use chrono::NaiveDate;

use crate::definitions::SqlValue;
use crate::models::{CommitmentType, RevenueType, HOTEL_ID, STATION_ID};

pub const AVAILABILITY_REPORT_TITLE: &str = "Availability Period Report";

/// Group tags of the scratch table; the final projection orders by them
pub const GROUP_HEADER: i32 = -10;
pub const GROUP_CATEGORY: i32 = 1;
pub const GROUP_TOTALS: i32 = 100;

/// Reservation status codes counted as sold
pub const SOLD_STATUS_CODES: &[u8] = &[0, 1];
/// Reservation status codes counted as out of service
pub const OUT_OF_SERVICE_STATUS_CODES: &[u8] = &[6];

/// Column names of the result set, in order
pub const COLUMNS: [&str; 8] = [
    "Descr",
    "Capacity",
    "Availability",
    "Sold",
    "OccPst",
    "SoldPerc",
    "ADR",
    "RevPar",
];

/// Captions of the synthetic header row, aligned with `COLUMNS`
pub const HEADER_CAPTIONS: [&str; 8] = [
    "Room Type",
    "Capacity",
    "Avail.",
    "Sold",
    "Occ %",
    "Perc Sold%",
    "ADR",
    "RevPar",
];

/// Build the availability script for the given period
///
/// Pure: no I/O, every value enters the SQL through `SqlValue`.
pub fn build(
    from_date: NaiveDate,
    to_date: NaiveDate,
    revenue_type: RevenueType,
    commitment_type: CommitmentType,
) -> String {
    let stages = [
        declare_parameters(from_date, to_date, revenue_type, commitment_type),
        insert_header_and_categories(),
        insert_totals_row(),
        compute_category_metrics(),
        aggregate_totals(),
        final_projection(),
    ];

    stages.join("\n")
}

/// Stage 1: scoped parameters and a fresh scratch table
fn declare_parameters(
    from_date: NaiveDate,
    to_date: NaiveDate,
    revenue_type: RevenueType,
    commitment_type: CommitmentType,
) -> String {
    let dt_from = SqlValue::Date(from_date).literal();
    let dt_to = SqlValue::Date(to_date).literal();

    format!(
        r#"
DROP TABLE IF EXISTS pg_temp.report_params, pg_temp.period_avail, pg_temp.kats,
    pg_temp.sold_rms, pg_temp.ooo, pg_temp.revenues;

CREATE TEMP TABLE report_params AS
SELECT {dt_from} AS dt_from,
       {dt_to} AS dt_to,
       ({dt_to} - {dt_from}) AS ndays,
       {is_net} AS is_net,
       {com} AS com,
       {hotel} AS mpehotel,
       {station} AS station_id;

CREATE TEMP TABLE period_avail (
    id SERIAL,
    grp INT,
    rtype INT DEFAULT -1,
    descr VARCHAR(100) DEFAULT '',
    capacity VARCHAR(50) DEFAULT '',
    availability VARCHAR(50) DEFAULT '',
    sold VARCHAR(50) DEFAULT '',
    occ_pct VARCHAR(50) DEFAULT '',
    sold_pct VARCHAR(50) DEFAULT '',
    adr VARCHAR(50) DEFAULT '',
    revpar VARCHAR(50) DEFAULT ''
);"#,
        is_net = SqlValue::Code(revenue_type.code()).literal(),
        com = SqlValue::Code(commitment_type.code()).literal(),
        hotel = SqlValue::Code(HOTEL_ID).literal(),
        station = SqlValue::Code(STATION_ID).literal(),
    )
}

/// Stage 2: header captions, then one row per category in display order
fn insert_header_and_categories() -> String {
    let captions = HEADER_CAPTIONS
        .iter()
        .map(|c| SqlValue::Text((*c).to_string()).literal())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"
INSERT INTO period_avail (grp, descr, capacity, availability, sold, occ_pct, sold_pct, adr, revpar)
VALUES ({GROUP_HEADER}, {captions});

CREATE TEMP TABLE kats AS
SELECT k.katnr, k.katpos, COUNT(z.ziname)::int AS kat_total
FROM kat AS k
INNER JOIN zimmer AS z ON z.kat = k.katnr
CROSS JOIN report_params AS p
WHERE k.zimmer = 1 AND z.mpehotel = p.mpehotel
GROUP BY k.katnr, k.katpos;

INSERT INTO period_avail (grp, rtype, descr)
SELECT {GROUP_CATEGORY}, k.katnr, k.kat || ' (' || COUNT(z.ziname) || ')'
FROM kat AS k
INNER JOIN zimmer AS z ON z.kat = k.katnr
CROSS JOIN report_params AS p
WHERE k.zimmer = 1 AND z.mpehotel = p.mpehotel
GROUP BY k.katnr, k.kat, k.katpos
ORDER BY k.katpos, k.katnr;"#
    )
}

/// Stage 3: synthetic totals row
fn insert_totals_row() -> String {
    format!(
        r#"
INSERT INTO period_avail (grp, rtype, descr)
VALUES ({GROUP_TOTALS}, -1, 'Totals');"#
    )
}

/// Stage 4: per-category aggregates and derived metrics
fn compute_category_metrics() -> String {
    let sold_codes = code_list(SOLD_STATUS_CODES);
    let ooo_codes = code_list(OUT_OF_SERVICE_STATUS_CODES);
    let stats_filter = "hsl.kattyp = 0 AND hsl.mpehotel = p.mpehotel \
                        AND hsl.stationid = p.station_id \
                        AND hsl.date BETWEEN p.dt_from AND p.dt_to";

    format!(
        r#"
CREATE TEMP TABLE sold_rms AS
SELECT hsl.katnr, SUM(hsl.occupancy)::int AS kat_total
FROM hitstatistic AS hsl
INNER JOIN kats AS k ON k.katnr = hsl.katnr
CROSS JOIN report_params AS p
WHERE hsl.reschar IN ({sold_codes}) AND {stats_filter}
GROUP BY hsl.katnr;

CREATE TEMP TABLE ooo AS
SELECT hsl.katnr, COUNT(hsl.occupancy)::int AS kat_total
FROM hitstatistic AS hsl
INNER JOIN kats AS k ON k.katnr = hsl.katnr
CROSS JOIN report_params AS p
WHERE hsl.reschar IN ({ooo_codes}) AND {stats_filter}
GROUP BY hsl.katnr;

CREATE TEMP TABLE revenues AS
SELECT hsl.katnr,
       SUM(CASE WHEN p.is_net = 1 THEN hsl.logisnet ELSE hsl.logis END)::numeric(18, 2) AS revenue
FROM hitstatistic AS hsl
INNER JOIN kats AS k ON k.katnr = hsl.katnr
CROSS JOIN report_params AS p
WHERE hsl.reschar IN ({sold_codes}) AND {stats_filter}
GROUP BY hsl.katnr;

UPDATE period_avail AS pa
SET capacity = m.cap::text,
    sold = m.sold::text,
    availability = (m.cap - m.sold)::text,
    occ_pct = {occ_pct},
    sold_pct = '100 %',
    adr = {adr},
    revpar = {revpar}
FROM (
    SELECT k.katnr,
           k.kat_total * (p.ndays + 1) - COALESCE(o.kat_total, 0) AS cap,
           COALESCE(s.kat_total, 0) AS sold,
           COALESCE(r.revenue, 0) AS revenue
    FROM kats AS k
    CROSS JOIN report_params AS p
    LEFT JOIN ooo AS o ON o.katnr = k.katnr
    LEFT JOIN sold_rms AS s ON s.katnr = k.katnr
    LEFT JOIN revenues AS r ON r.katnr = k.katnr
) AS m
WHERE pa.rtype = m.katnr AND pa.grp = {GROUP_CATEGORY};"#,
        occ_pct = percent_expr("m.sold", "m.cap"),
        adr = ratio_expr("m.revenue", "m.sold"),
        revpar = ratio_expr("m.revenue", "m.cap"),
    )
}

/// Stage 5: totals row, then each category's share of sold rooms
fn aggregate_totals() -> String {
    format!(
        r#"
UPDATE period_avail AS pa
SET capacity = t.cap::text,
    availability = t.avail::text,
    sold = t.sold::text,
    occ_pct = {occ_pct},
    adr = {adr},
    revpar = {revpar}
FROM (
    SELECT COALESCE(SUM(capacity::int), 0) AS cap,
           COALESCE(SUM(availability::int), 0) AS avail,
           COALESCE(SUM(sold::int), 0) AS sold,
           (SELECT COALESCE(SUM(revenue), 0) FROM revenues) AS revenue
    FROM period_avail
    WHERE grp = {GROUP_CATEGORY}
) AS t
WHERE pa.grp = {GROUP_TOTALS};

UPDATE period_avail AS pa
SET sold_pct = {sold_pct}
FROM (
    SELECT COALESCE(SUM(sold::int), 0) AS sold
    FROM period_avail
    WHERE grp = {GROUP_CATEGORY}
) AS t
WHERE pa.grp = {GROUP_CATEGORY};"#,
        occ_pct = percent_expr("t.sold", "t.cap"),
        adr = ratio_expr("t.revenue", "t.sold"),
        revpar = ratio_expr("t.revenue", "t.cap"),
        sold_pct = percent_expr("COALESCE(NULLIF(pa.sold, ''), '0')::int", "t.sold"),
    )
}

fn final_projection() -> String {
    let select_list = [
        "descr", "capacity", "availability", "sold", "occ_pct", "sold_pct", "adr", "revpar",
    ]
    .iter()
    .zip(COLUMNS.iter())
    .map(|(col, alias)| format!("{} AS \"{}\"", col, alias))
    .collect::<Vec<_>>()
    .join(", ");

    format!(
        r#"
SELECT {select_list}
FROM period_avail
ORDER BY grp, id;"#
    )
}

/// `numerator * 100 / denominator` as text with a ` %` suffix; `'0 %'` when the denominator is zero
pub fn percent_expr(numerator: &str, denominator: &str) -> String {
    format!(
        "CASE WHEN ({den}) = 0 THEN '0 %' \
         ELSE trim_scale(ROUND(({num})::numeric * 100 / ({den})::numeric, 2))::text || ' %' END",
        num = numerator,
        den = denominator,
    )
}

/// `numerator / denominator` as text rounded to 2 places; `'0'` when the denominator is zero
pub fn ratio_expr(numerator: &str, denominator: &str) -> String {
    format!(
        "CASE WHEN ({den}) = 0 THEN '0' \
         ELSE trim_scale(ROUND(({num})::numeric / ({den})::numeric, 2))::text END",
        num = numerator,
        den = denominator,
    )
}

fn code_list(codes: &[u8]) -> String {
    codes
        .iter()
        .map(|c| SqlValue::Code(*c).literal())
        .collect::<Vec<_>>()
        .join(", ")
}
