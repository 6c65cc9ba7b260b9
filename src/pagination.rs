// PaginatedList (§2, §4.4): deterministic ordering plus an opaque
// continuation-token. List operations sort by a natural key before paging;
// the token is the base64 of the next item's natural key.

use crate::error::{BusError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub fn paginate<T: Clone>(
    mut items: Vec<T>,
    natural_key: impl Fn(&T) -> String,
    continuation_token: Option<&str>,
    max_results: usize,
) -> Result<(Vec<T>, Option<String>)> {
    items.sort_by(|a, b| natural_key(a).cmp(&natural_key(b)));

    let start = match continuation_token {
        None => 0,
        Some(token) => {
            let decoded = BASE64
                .decode(token)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .ok_or_else(|| BusError::InvalidParameter("invalid continuation token".into()))?;
            items
                .iter()
                .position(|item| natural_key(item) >= decoded)
                .unwrap_or(items.len())
        }
    };

    let max_results = max_results.max(1);
    let end = items.len().min(start.saturating_add(max_results));
    let page = items[start..end].to_vec();
    let next_token = if end < items.len() {
        Some(BASE64.encode(natural_key(&items[end])))
    } else {
        None
    };
    Ok((page, next_token))
}
