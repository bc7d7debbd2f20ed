//! Measurement Protocol encodings for the `collect` and `batch` endpoints.

use percent_encoding::{AsciiSet, utf8_percent_encode};
use url::Url;

use crate::event::Event;
use crate::params::vocab::QUERY;
use crate::params::{Parameter, combine_uniquely};

/// Query component escapes plus the pair delimiters. `/` and `?` stay raw and
/// a space becomes `%20`.
const QUERY_PAIR: &AsciiSet = &QUERY.add(b'&').add(b'=').add(b'+');

/// Common parameters first, then the event's own.
pub fn merged(common: &[Parameter], event: &Event) -> Vec<Parameter> {
    combine_uniquely(common, event.parameters())
}

/// `collect_url?k=v&k=v`, one percent-encoded query pair per parameter,
/// appended after any query the base already carries.
pub fn collect_url(collect_url: &Url, common: &[Parameter], event: &Event) -> Url {
    let pairs = merged(common, event)
        .iter()
        .map(|param| {
            format!(
                "{}={}",
                utf8_percent_encode(param.key(), QUERY_PAIR),
                utf8_percent_encode(param.value(), QUERY_PAIR)
            )
        })
        .collect::<Vec<_>>()
        .join("&");

    let query = match collect_url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{pairs}"),
        _ => pairs,
    };
    let mut url = collect_url.clone();
    url.set_query(Some(&query));
    url
}

/// One `k=v&k=v` line per event, joined with `\n`. Values are written as stored.
pub fn batch_body(common: &[Parameter], events: &[Event]) -> String {
    events
        .iter()
        .map(|event| hit_line(&merged(common, event)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn hit_line(params: &[Parameter]) -> String {
    params
        .iter()
        .map(Parameter::to_string)
        .collect::<Vec<_>>()
        .join("&")
}
