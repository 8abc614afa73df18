//! The on-disk cache entry format.
//!
//! An entry is a header line followed by a payload:
//!
//! ```text
//! branchdrift-cache,1,diff,<payload bytes>,<sha256 of payload>
//! record,7
//! str,baseCommit,1111aaaa
//! str,compareCommit,2222bbbb
//! str,directory,ant/dev
//! int,insertions,10
//! int,deletions,4
//! int,total,14
//! int,filesChanged,3
//! ```
//!
//! Every field line is `<tag>,<name>,<value>` with tag `int`, `str` or `date`.
//! A `record,<n>` line announces how many field lines belong to the next
//! record, which is how a history entry holds several points. Dates are
//! written as their day ordinal (0001-01-01 is day 1). The header's length and
//! checksum make truncated or edited entries detectable.

use std::collections::BTreeMap;

use branchdrift_core::{CommitRef, DiffRecord, HistoryPoint};
use chrono::{Datelike, NaiveDate};
use sha2::{Digest, Sha256};

const FORMAT_NAME: &str = "branchdrift-cache";
const FORMAT_VERSION: u32 = 1;

const KIND_DIFF: &str = "diff";
const KIND_HISTORY: &str = "history";

const TAG_INT: &str = "int";
const TAG_STR: &str = "str";
const TAG_DATE: &str = "date";

/// A value the cache can store.
///
/// # Examples
///
/// ```
/// use branchdrift_cache::codec::{decode, encode};
/// use branchdrift_cache::CacheRecord;
/// use branchdrift_core::{CommitRef, DiffRecord};
///
/// let record = CacheRecord::Diff(DiffRecord::new(
///     CommitRef::new("a"),
///     CommitRef::new("b"),
///     "src",
///     3,
///     1,
///     2,
/// ));
/// assert_eq!(decode(&encode(&record)).unwrap(), record);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheRecord {
    /// A single diff statistic.
    Diff(DiffRecord),
    /// A sampled history series, most recent first.
    History(Vec<HistoryPoint>),
}

impl CacheRecord {
    fn kind(&self) -> &'static str {
        match self {
            CacheRecord::Diff(_) => KIND_DIFF,
            CacheRecord::History(_) => KIND_HISTORY,
        }
    }
}

/// Why a cache entry could not be decoded.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CacheCorruption {
    /// The header line is missing or malformed.
    #[error("malformed header: {0}")]
    Header(String),

    /// The entry was written by an incompatible format version.
    #[error("unsupported format version {0}")]
    Version(String),

    /// The payload length does not match the header.
    #[error("payload is {actual} bytes, header says {expected}")]
    Length {
        /// Length recorded in the header.
        expected: usize,
        /// Length found on disk.
        actual: usize,
    },

    /// The payload digest does not match the header.
    #[error("checksum mismatch")]
    Checksum,

    /// A record or field line is malformed.
    #[error("line {line}: {message}")]
    Line {
        /// 1-based line number within the payload.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// A field is absent or carries the wrong type tag.
    #[error("field `{0}` is missing or has the wrong type")]
    Field(&'static str),

    /// The decoded values violate a record invariant.
    #[error("invalid record: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Int(u64),
    Str(String),
    Date(NaiveDate),
}

type Fields = BTreeMap<String, Value>;

/// Serialize a record into the framed text format.
pub fn encode(record: &CacheRecord) -> String {
    let mut payload = String::new();
    match record {
        CacheRecord::Diff(diff) => write_record(&mut payload, &diff_fields(diff)),
        CacheRecord::History(points) => {
            for point in points {
                write_record(&mut payload, &point_fields(point));
            }
        }
    }

    format!(
        "{FORMAT_NAME},{FORMAT_VERSION},{},{},{}\n{payload}",
        record.kind(),
        payload.len(),
        digest(&payload)
    )
}

/// Parse an entry produced by [`encode`].
///
/// # Errors
///
/// Returns [`CacheCorruption`] when the framing, checksum, tags, or record
/// invariants do not hold.
pub fn decode(text: &str) -> Result<CacheRecord, CacheCorruption> {
    let (header, payload) = text
        .split_once('\n')
        .ok_or_else(|| CacheCorruption::Header("no header line".into()))?;

    let parts: Vec<&str> = header.split(',').collect();
    let [name, version, kind, length, checksum] = parts.as_slice() else {
        return Err(CacheCorruption::Header(header.to_string()));
    };
    if *name != FORMAT_NAME {
        return Err(CacheCorruption::Header(header.to_string()));
    }
    if version.parse::<u32>().ok() != Some(FORMAT_VERSION) {
        return Err(CacheCorruption::Version((*version).to_string()));
    }
    let expected: usize = length
        .parse()
        .map_err(|_| CacheCorruption::Header(header.to_string()))?;
    if payload.len() != expected {
        return Err(CacheCorruption::Length {
            expected,
            actual: payload.len(),
        });
    }
    if digest(payload) != *checksum {
        return Err(CacheCorruption::Checksum);
    }

    let records = read_records(payload)?;
    match *kind {
        KIND_DIFF => {
            let [fields] = records.as_slice() else {
                return Err(CacheCorruption::Invalid(format!(
                    "diff entry holds {} records",
                    records.len()
                )));
            };
            Ok(CacheRecord::Diff(diff_from_fields(fields)?))
        }
        KIND_HISTORY => records
            .iter()
            .map(point_from_fields)
            .collect::<Result<Vec<_>, _>>()
            .map(CacheRecord::History),
        other => Err(CacheCorruption::Header(format!("unknown kind `{other}`"))),
    }
}

fn digest(payload: &str) -> String {
    format!("{:x}", Sha256::digest(payload.as_bytes()))
}

fn diff_fields(diff: &DiffRecord) -> Vec<(&'static str, Value)> {
    vec![
        ("baseCommit", Value::Str(diff.base_commit.to_string())),
        ("compareCommit", Value::Str(diff.compare_commit.to_string())),
        ("directory", Value::Str(diff.directory.clone())),
        ("insertions", Value::Int(diff.insertions)),
        ("deletions", Value::Int(diff.deletions)),
        ("total", Value::Int(diff.total)),
        ("filesChanged", Value::Int(diff.files_changed)),
    ]
}

fn point_fields(point: &HistoryPoint) -> Vec<(&'static str, Value)> {
    vec![
        ("date", Value::Date(point.date)),
        ("total", Value::Int(point.total)),
        ("baseCommit", Value::Str(point.base_commit.to_string())),
        ("compareCommit", Value::Str(point.compare_commit.to_string())),
        ("directory", Value::Str(point.directory.clone())),
    ]
}

fn write_record(out: &mut String, fields: &[(&'static str, Value)]) {
    out.push_str(&format!("record,{}\n", fields.len()));
    for (name, value) in fields {
        let (tag, text) = match value {
            Value::Int(n) => (TAG_INT, n.to_string()),
            Value::Str(s) => (TAG_STR, escape(s)),
            Value::Date(d) => (TAG_DATE, d.num_days_from_ce().to_string()),
        };
        out.push_str(&format!("{tag},{name},{text}\n"));
    }
}

fn read_records(payload: &str) -> Result<Vec<Fields>, CacheCorruption> {
    let mut records = Vec::new();
    let mut lines = payload.lines().enumerate().map(|(i, l)| (i + 1, l));

    while let Some((line_no, line)) = lines.next() {
        let count = line
            .strip_prefix("record,")
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(|| CacheCorruption::Line {
                line: line_no,
                message: format!("expected `record,<n>`, found `{line}`"),
            })?;

        let mut fields = Fields::new();
        for _ in 0..count {
            let (line_no, line) = lines.next().ok_or(CacheCorruption::Line {
                line: line_no,
                message: "record ends early".into(),
            })?;
            let (name, value) = read_field(line).map_err(|message| CacheCorruption::Line {
                line: line_no,
                message,
            })?;
            fields.insert(name, value);
        }
        records.push(fields);
    }

    Ok(records)
}

fn read_field(line: &str) -> Result<(String, Value), String> {
    let mut parts = line.splitn(3, ',');
    let (Some(tag), Some(name), Some(raw)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("malformed field `{line}`"));
    };
    let value = match tag {
        TAG_INT => Value::Int(raw.trim().parse().unwrap_or_default()),
        TAG_DATE => {
            let ordinal: i32 = raw
                .trim()
                .parse()
                .map_err(|_| format!("bad date ordinal `{raw}`"))?;
            let date = NaiveDate::from_num_days_from_ce_opt(ordinal)
                .ok_or_else(|| format!("date ordinal {ordinal} out of range"))?;
            Value::Date(date)
        }
        TAG_STR => Value::Str(unescape(raw)?),
        other => return Err(format!("unknown type tag `{other}`")),
    };
    Ok((name.to_string(), value))
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> Result<String, String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            other => return Err(format!("bad escape `\\{}`", other.unwrap_or(' '))),
        }
    }
    Ok(out)
}

fn take_int(fields: &Fields, name: &'static str) -> Result<u64, CacheCorruption> {
    match fields.get(name) {
        Some(Value::Int(n)) => Ok(*n),
        _ => Err(CacheCorruption::Field(name)),
    }
}

fn take_str(fields: &Fields, name: &'static str) -> Result<String, CacheCorruption> {
    match fields.get(name) {
        Some(Value::Str(s)) => Ok(s.clone()),
        _ => Err(CacheCorruption::Field(name)),
    }
}

fn take_date(fields: &Fields, name: &'static str) -> Result<NaiveDate, CacheCorruption> {
    match fields.get(name) {
        Some(Value::Date(d)) => Ok(*d),
        _ => Err(CacheCorruption::Field(name)),
    }
}

fn diff_from_fields(fields: &Fields) -> Result<DiffRecord, CacheCorruption> {
    let record = DiffRecord {
        base_commit: CommitRef::new(take_str(fields, "baseCommit")?),
        compare_commit: CommitRef::new(take_str(fields, "compareCommit")?),
        directory: take_str(fields, "directory")?,
        insertions: take_int(fields, "insertions")?,
        deletions: take_int(fields, "deletions")?,
        total: take_int(fields, "total")?,
        files_changed: take_int(fields, "filesChanged")?,
    };
    if !record.is_consistent() {
        return Err(CacheCorruption::Invalid(format!(
            "total {} != {} + {}",
            record.total, record.insertions, record.deletions
        )));
    }
    Ok(record)
}

fn point_from_fields(fields: &Fields) -> Result<HistoryPoint, CacheCorruption> {
    Ok(HistoryPoint {
        date: take_date(fields, "date")?,
        total: take_int(fields, "total")?,
        base_commit: CommitRef::new(take_str(fields, "baseCommit")?),
        compare_commit: CommitRef::new(take_str(fields, "compareCommit")?),
        directory: take_str(fields, "directory")?,
    })
}
