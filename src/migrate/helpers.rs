use reqwest::Url;

use crate::MigrateError;

const FILES_SEGMENT: &str = "files";

fn store_url(base: &str, name: Option<&str>) -> Result<Url, MigrateError> {
    let mut url =
        Url::parse(base).map_err(|e| MigrateError::InvalidUrl(base.to_string(), e.to_string()))?;
    {
        let mut segs = url.path_segments_mut().map_err(|_| {
            MigrateError::InvalidUrl(base.to_string(), "url cannot carry a path".to_string())
        })?;
        // tolerate a trailing slash on the base
        segs.pop_if_empty().push(FILES_SEGMENT);
        if let Some(n) = name {
            segs.push(n);
        }
    }
    Ok(url)
}

/// `<base>/files`: list endpoint and upload target of a store.
pub fn files_url(base: &str) -> Result<Url, MigrateError> {
    store_url(base, None)
}

/// `<base>/files/<name>` with `name` percent-encoded as a single segment.
pub fn file_url(base: &str, name: &str) -> Result<Url, MigrateError> {
    store_url(base, Some(name))
}
