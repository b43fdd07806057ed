//! Registry and CDN JSON endpoints: module names, versions, file listings.

use serde::Deserialize;
use std::path::Path;

use crate::types::{DirectoryEntry, EntryKind};
use crate::utils::config::{API_HOST, CDN_HOST};

use super::throttle::ThrottledClient;
use super::RegistryError;

/// Version metadata for one module.
#[derive(Clone, Debug, Deserialize)]
pub struct VersionList {
    pub latest: String,
    pub versions: Vec<String>,
}

#[derive(Deserialize)]
struct VersionMeta {
    directory_listing: Vec<DirectoryEntry>,
}

/// The three registry operations discovery needs. The HTTP implementation is
/// [`HttpRegistry`]; tests substitute a canned one.
pub trait ModuleRegistry: Send + Sync {
    fn list_modules(&self) -> Result<Vec<String>, RegistryError>;
    fn list_versions(&self, name: &str) -> Result<VersionList, RegistryError>;
    fn list_files(&self, name: &str, version: &str) -> Result<Vec<DirectoryEntry>, RegistryError>;
}

/// Registry client over the throttled HTTP client.
pub struct HttpRegistry {
    client: ThrottledClient,
    api_base: String,
    cdn_base: String,
}

impl HttpRegistry {
    pub fn new(client: ThrottledClient) -> Self {
        HttpRegistry {
            client,
            api_base: format!("https://{API_HOST}"),
            cdn_base: format!("https://{CDN_HOST}"),
        }
    }

    fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, RegistryError> {
        let resp = self.client.get(url)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RegistryError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = resp.text().map_err(|source| RegistryError::Request {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_str(&body).map_err(|source| RegistryError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

impl ModuleRegistry for HttpRegistry {
    fn list_modules(&self) -> Result<Vec<String>, RegistryError> {
        let url = format!("{}/modules?simple=1", self.api_base);
        self.fetch_json(&url)
    }

    fn list_versions(&self, name: &str) -> Result<VersionList, RegistryError> {
        let url = format!("{}/{}/meta/versions.json", self.cdn_base, name);
        self.fetch_json(&url)
    }

    fn list_files(&self, name: &str, version: &str) -> Result<Vec<DirectoryEntry>, RegistryError> {
        let url = format!(
            "{}/{}/versions/{}/meta/meta.json",
            self.cdn_base, name, version
        );
        let meta: VersionMeta = self.fetch_json(&url)?;
        let mut listing = meta.directory_listing;
        strip_listing(&mut listing);
        Ok(listing)
    }
}

/// Keep only source files. Directories are dropped, and so is every file
/// that is not `.js`/`.ts`/`.jsx`/`.tsx`; `README.md` is kept as a special
/// case so module documentation stays searchable. In place, order preserved.
pub fn strip_listing(listing: &mut Vec<DirectoryEntry>) {
    listing.retain(keep_entry);
}

fn keep_entry(entry: &DirectoryEntry) -> bool {
    if entry.kind != EntryKind::File {
        return false;
    }
    let path = Path::new(&entry.path);
    if path.file_name().is_some_and(|name| name == "README.md") {
        return true;
    }
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("js" | "ts" | "jsx" | "tsx")
    )
}
