use url::Url;

use super::query::Query;
use crate::error::RestpaceError;

const DEFAULT_SCHEME: &str = "https://";

/// Parses a configured base URL, assuming `https://` when no scheme is given
/// and dropping trailing slashes.
pub(crate) fn normalize_base_url(raw: &str) -> Result<Url, RestpaceError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(RestpaceError::Config("base_url must not be empty".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("{DEFAULT_SCHEME}{trimmed}")
    };
    let mut url = Url::parse(&with_scheme)?;
    if url.cannot_be_a_base() {
        return Err(RestpaceError::Config(format!(
            "base_url cannot carry paths: {raw}"
        )));
    }

    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);
    Ok(url)
}

/// Appends `path` below the base URL's own path and attaches the query.
pub(crate) fn build_request_url(
    base: &Url,
    path: &str,
    query: Option<&Query>,
) -> Result<Url, RestpaceError> {
    let (path, inline_query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };

    let mut url = base.clone();
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    url.set_query(inline_query);
    url.set_fragment(None);

    if let Some(query) = query {
        query.apply_to(&mut url);
    }
    Ok(url)
}
