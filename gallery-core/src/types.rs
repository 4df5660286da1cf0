use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// One entry of the remote collection. Identity is `name`; the server
/// assigns it and guarantees uniqueness within the gallery.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GalleryItem {
    pub name: String,
    pub url: String,
}

/// A single page of the listing endpoint, normalized from either wire
/// shape (paginated object or bare array).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPage {
    pub items: Vec<GalleryItem>,
    pub has_more: bool,
    pub next_token: Option<String>,
}

/// Numeric-aware name ordering: runs of ASCII digits compare by value,
/// everything else compares case-insensitively. "9.webp" sorts before
/// "10.webp", "02" and "2" tie on value and fall back to run length.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.as_bytes();
    let mut right = b.as_bytes();
    loop {
        match (left.first().copied(), right.first().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(lc), Some(rc)) if lc.is_ascii_digit() && rc.is_ascii_digit() => {
                let (lnum, lrest) = split_digit_run(left);
                let (rnum, rrest) = split_digit_run(right);
                let ltrim = trim_leading_zeros(lnum);
                let rtrim = trim_leading_zeros(rnum);
                let by_value = ltrim
                    .len()
                    .cmp(&rtrim.len())
                    .then_with(|| ltrim.cmp(rtrim));
                if by_value != Ordering::Equal {
                    return by_value;
                }
                let by_zeros = lnum.len().cmp(&rnum.len());
                if by_zeros != Ordering::Equal {
                    return by_zeros;
                }
                left = lrest;
                right = rrest;
            }
            (Some(lc), Some(rc)) => {
                match lc.to_ascii_lowercase().cmp(&rc.to_ascii_lowercase()) {
                    Ordering::Equal => {
                        left = &left[1..];
                        right = &right[1..];
                    }
                    other => return other,
                }
            }
        }
    }
}

fn split_digit_run(bytes: &[u8]) -> (&[u8], &[u8]) {
    let end = bytes
        .iter()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(bytes.len());
    bytes.split_at(end)
}

fn trim_leading_zeros(digits: &[u8]) -> &[u8] {
    let start = digits
        .iter()
        .position(|&b| b != b'0')
        .unwrap_or(digits.len());
    &digits[start..]
}
