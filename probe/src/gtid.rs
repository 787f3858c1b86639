//! Comparison of opaque GTID position strings.
//!
//! A MySQL executed-GTID set looks like `3E11FA47-71CA-11E1-9E33-C80AA9429562:1-57,…`: one or
//! more UUID-tagged transaction-count spans, comma separated. For promotion purposes we only
//! need the total count of committed transactions across all spans, so the most advanced
//! replica can be picked without understanding the full GTID grammar.
use std::cmp::Ordering;

/// Outcome of comparing two GTID positions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GtidOrder {
    Ahead,
    Behind,
    Equal,
}

/// Compare two GTID position strings.
///
/// An empty operand is strictly behind a non-empty one; two empty operands are equal.
/// This exists so promotion always prefers the most advanced replica, minimising lost
/// transactions.
pub fn compare_gtid(a: &str, b: &str) -> GtidOrder {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return GtidOrder::Equal,
        (true, false) => return GtidOrder::Behind,
        (false, true) => return GtidOrder::Ahead,
        (false, false) => (),
    }
    let count_a = transaction_count(a);
    let count_b = transaction_count(b);
    match count_a.cmp(&count_b) {
        Ordering::Greater => GtidOrder::Ahead,
        Ordering::Less => GtidOrder::Behind,
        Ordering::Equal => GtidOrder::Equal,
    }
}

/// Sum the trailing `<start>-<end>` (or single-number) transaction-count spans across every
/// comma-separated, colon-tagged segment of a GTID set.
fn transaction_count(gtid: &str) -> u64 {
    gtid.split(',')
        .filter_map(|segment| segment.rsplit_once(':').map(|(_, span)| span))
        .map(span_length)
        .sum()
}

/// Length of a single `<start>-<end>` or `<n>` span.
fn span_length(span: &str) -> u64 {
    match span.split_once('-') {
        Some((start, end)) => match (start.trim().parse::<u64>(), end.trim().parse::<u64>()) {
            (Ok(start), Ok(end)) if end >= start => end - start + 1,
            _ => 0,
        },
        None => span.trim().parse::<u64>().map(|_| 1).unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::compare_gtid;
    use super::GtidOrder;

    const UUID: &str = "3E11FA47-71CA-11E1-9E33-C80AA9429562";

    #[test]
    fn two_empty_sets_are_equal() {
        assert_eq!(compare_gtid("", ""), GtidOrder::Equal);
    }

    #[test]
    fn empty_is_behind_non_empty() {
        assert_eq!(compare_gtid("", &format!("{}:1-5", UUID)), GtidOrder::Behind);
        assert_eq!(compare_gtid(&format!("{}:1-5", UUID), ""), GtidOrder::Ahead);
    }

    #[test]
    fn more_transactions_wins() {
        let a = format!("{}:1-100", UUID);
        let b = format!("{}:1-120", UUID);
        assert_eq!(compare_gtid(&a, &b), GtidOrder::Behind);
        assert_eq!(compare_gtid(&b, &a), GtidOrder::Ahead);
    }

    #[test]
    fn identical_spans_tie() {
        let a = format!("{}:1-50", UUID);
        let b = format!("{}:1-50", UUID);
        assert_eq!(compare_gtid(&a, &b), GtidOrder::Equal);
    }

    #[test]
    fn multiple_segments_are_summed() {
        let a = format!("{}:1-10,{}:1-5", UUID, "4E11FA47-71CA-11E1-9E33-C80AA9429563");
        let b = format!("{}:1-20", UUID);
        // a totals 10 + 5 = 15, b totals 20.
        assert_eq!(compare_gtid(&a, &b), GtidOrder::Behind);
    }
}
