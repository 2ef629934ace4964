//! Bundled most-common-password lists.
//!
//! One file per decade of list size, compiled into the binary. Derived from
//! the SecLists common-credentials collection.

const TOP_10: &str = include_str!("../resources/wordlists/10.txt");
const TOP_100: &str = include_str!("../resources/wordlists/100.txt");

/// The bundled list closest to (and not exceeding) `count` entries, or `None`
/// when `count` is below the smallest list.
pub fn bundled(count: usize) -> Option<&'static str> {
    match count {
        0..=9 => None,
        10..=99 => Some(TOP_10),
        _ => Some(TOP_100),
    }
}

/// Lines of the selected bundled list, in list order.
pub fn bundled_lines(count: usize) -> Vec<String> {
    bundled(count)
        .map(|list| {
            list.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
