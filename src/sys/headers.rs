//! The public headers `wrapper.h` aggregates, in order.
//!
//! Also compiled into the build script, so it must not reach into the rest
//! of the crate.

use std::collections::HashSet;

pub const AGGREGATED_HEADERS: [&str; 6] = [
    "speex/speex.h",
    "speex/speex_bits.h",
    "speex/speex_callbacks.h",
    "speex/speex_header.h",
    "speex/speex_stereo.h",
    "speex/speex_types.h",
];

/// Header names from the `#include` lines of `wrapper`, in order.
pub fn included_headers(wrapper: &str) -> Vec<String> {
    wrapper
        .lines()
        .filter_map(|line| line.trim().strip_prefix("#include"))
        .map(|rest| {
            rest.trim()
                .trim_matches(|c| c == '<' || c == '>' || c == '"')
                .to_string()
        })
        .collect()
}

/// Checks that `wrapper` includes every aggregated header exactly once and
/// in the expected order.
pub fn check_wrapper(wrapper: &str) -> Result<Vec<String>, String> {
    let included = included_headers(wrapper);

    let mut seen = HashSet::new();
    for header in &included {
        if !seen.insert(header.as_str()) {
            return Err(format!("wrapper.h includes {} more than once", header));
        }
    }
    for header in AGGREGATED_HEADERS {
        if !seen.contains(header) {
            return Err(format!("wrapper.h is missing {}", header));
        }
    }
    if included.len() != AGGREGATED_HEADERS.len() {
        let extra: Vec<&str> = included
            .iter()
            .map(String::as_str)
            .filter(|h| !AGGREGATED_HEADERS.contains(h))
            .collect();
        return Err(format!("wrapper.h includes unexpected headers {:?}", extra));
    }
    if included.iter().map(String::as_str).ne(AGGREGATED_HEADERS) {
        return Err(format!(
            "wrapper.h includes {:?}, expected the order {:?}",
            included, AGGREGATED_HEADERS
        ));
    }
    Ok(included)
}
