use crate::record::Record;

/// Converts the raw limit setting; anything other than a positive count means unbounded.
pub fn record_limit(raw: i64) -> Option<usize> {
    usize::try_from(raw).ok().filter(|&n| n > 0)
}

/// Keeps the first `limit` records, preserving order.
pub fn apply_limit(mut records: Vec<Record>, limit: Option<usize>) -> Vec<Record> {
    if let Some(limit) = limit {
        records.truncate(limit);
    }
    records
}

/// Drops records without a non-empty value for `external_id_field`.
pub fn require_external_id(records: Vec<Record>, external_id_field: &str) -> Vec<Record> {
    records
        .into_iter()
        .filter(|r| r.has_value(external_id_field))
        .collect()
}
