//! Version ordering used to decide update eligibility.
//!
//! Versions are split into numeric and marker segments (`1.2.0-rc1` becomes
//! `1 . 2 . 0 . rc . 1`). Marker segments rank `dev < alpha|a < beta|b < rc <
//! number < pl|p`; unknown markers rank below `dev`. When one side runs out of
//! segments, the next segment of the longer side decides: a number makes it
//! newer, a pre-release marker makes it older.

use std::cmp::Ordering;

const NUMBER_RANK: i8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Number(u64),
    Marker(i8),
}

impl Segment {
    fn rank(self) -> i8 {
        match self {
            Segment::Number(_) => NUMBER_RANK,
            Segment::Marker(rank) => rank,
        }
    }
}

fn marker_rank(token: &str) -> i8 {
    match token.to_ascii_lowercase().as_str() {
        "dev" => 0,
        "alpha" | "a" => 1,
        "beta" | "b" => 2,
        "rc" => 3,
        "pl" | "p" => 5,
        _ => -1,
    }
}

fn parse_segments(raw: &str) -> Option<Vec<Segment>> {
    let trimmed = raw.trim();
    let core = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if core.is_empty()
        || !core.chars().any(|ch| ch.is_ascii_digit())
        || !core
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_' | '+'))
    {
        return None;
    }

    let mut segments = Vec::new();
    let mut token = String::new();
    let flush = |token: &mut String, segments: &mut Vec<Segment>| -> Option<()> {
        if token.is_empty() {
            return Some(());
        }
        let segment = if token.chars().all(|ch| ch.is_ascii_digit()) {
            Segment::Number(token.parse::<u64>().ok()?)
        } else {
            Segment::Marker(marker_rank(token))
        };
        segments.push(segment);
        token.clear();
        Some(())
    };

    for ch in core.chars() {
        if matches!(ch, '.' | '-' | '_' | '+') {
            flush(&mut token, &mut segments)?;
            continue;
        }
        let boundary = token
            .chars()
            .last()
            .is_some_and(|last| last.is_ascii_digit() != ch.is_ascii_digit());
        if boundary {
            flush(&mut token, &mut segments)?;
        }
        token.push(ch);
    }
    flush(&mut token, &mut segments)?;
    Some(segments)
}

fn compare_segment(left: Segment, right: Segment) -> Ordering {
    match (left, right) {
        (Segment::Number(left), Segment::Number(right)) => left.cmp(&right),
        _ => left.rank().cmp(&right.rank()),
    }
}

fn compare_tail(next: Option<&Segment>) -> Ordering {
    match next {
        None => Ordering::Equal,
        Some(segment) => segment.rank().cmp(&NUMBER_RANK).then(Ordering::Greater),
    }
}

/// Orders two version strings; `None` when either side is unparseable.
pub fn compare_versions(left: &str, right: &str) -> Option<Ordering> {
    let left = parse_segments(left)?;
    let right = parse_segments(right)?;
    for (left_segment, right_segment) in left.iter().zip(right.iter()) {
        match compare_segment(*left_segment, *right_segment) {
            Ordering::Equal => {}
            decided => return Some(decided),
        }
    }
    let shared = left.len().min(right.len());
    let ordering = match left.len().cmp(&right.len()) {
        Ordering::Equal => Ordering::Equal,
        Ordering::Greater => compare_tail(left.get(shared)),
        Ordering::Less => compare_tail(right.get(shared)).reverse(),
    };
    Some(ordering)
}

pub fn is_well_formed(raw: &str) -> bool {
    parse_segments(raw).is_some()
}

/// True only when `candidate` parses and orders strictly after `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare_versions(candidate, current) == Some(Ordering::Greater)
}
