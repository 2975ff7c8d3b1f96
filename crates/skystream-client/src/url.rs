//! Subscribe URL construction.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use skystream_core::constants::{PARAM_WANTED_COLLECTIONS, PARAM_WANTED_DIDS};
use skystream_core::{Result, StreamError};

use crate::config::SubscriptionFilter;

/// Characters left as-is in query values. NSIDs and DIDs only need these,
/// and `,` is the list separator.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b',')
    .remove(b':')
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'~');

/// Build the subscribe URL for `endpoint` with the filter's lists comma-joined.
///
/// A parameter whose list is empty is omitted entirely.
pub fn build_subscribe_url(endpoint: &str, filter: &SubscriptionFilter) -> Result<String> {
    let endpoint = endpoint.trim();
    if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
        return Err(StreamError::InvalidEndpoint(format!(
            "{endpoint} (expected ws:// or wss://)"
        )));
    }

    let params: Vec<String> = [
        (PARAM_WANTED_COLLECTIONS, filter.wanted_collections()),
        (PARAM_WANTED_DIDS, filter.wanted_dids()),
    ]
    .into_iter()
    .filter(|(_, values)| !values.is_empty())
    .map(|(name, values)| {
        let joined = values.join(",");
        format!("{name}={}", utf8_percent_encode(&joined, QUERY_VALUE))
    })
    .collect();

    if params.is_empty() {
        return Ok(endpoint.to_string());
    }

    let separator = match endpoint.find('?') {
        None => "?",
        Some(_) if endpoint.ends_with('?') || endpoint.ends_with('&') => "",
        Some(_) => "&",
    };
    Ok(format!("{endpoint}{separator}{}", params.join("&")))
}
