// src/models/keys.rs

//! Property names and markers of the content repository's JSON dialect.

pub const JCR_PREFIX: &str = "jcr:";
pub const REP_PREFIX: &str = "rep:";
pub const CQ_PREFIX: &str = "cq:";
pub const SLING_PREFIX: &str = "sling:";

pub const JCR_CONTENT: &str = "jcr:content";
pub const JCR_PRIMARY_TYPE: &str = "jcr:primaryType";
pub const JCR_CREATED: &str = "jcr:created";
pub const JCR_TITLE: &str = "jcr:title";
pub const JCR_LAST_MODIFIED: &str = "jcr:lastModified";
pub const CQ_LAST_MODIFIED: &str = "cq:lastModified";
pub const CQ_TEMPLATE: &str = "cq:template";
pub const CQ_MODEL: &str = "cq:model";
pub const CQ_TAGS: &str = "cq:tags";
pub const CQ_LAST_REPLICATION_ACTION: &str = "cq:lastReplicationAction";
pub const CQ_LAST_REPLICATION_ACTION_PUBLISH: &str = "cq:lastReplicationAction_publish";
pub const CQ_LAST_REPLICATED: &str = "cq:lastReplicated";
pub const CQ_LAST_REPLICATED_PUBLISH: &str = "cq:lastReplicated_publish";
pub const SLING_RESOURCE_TYPE: &str = "sling:resourceType";

pub const CONTENT_FRAGMENT: &str = "contentFragment";
pub const DATA_FOLDER: &str = "data";
pub const ACTIVATE: &str = "Activate";
pub const LAST_MODIFIED_SUFFIX: &str = "@LastModified";

pub const PAGE_TYPE: &str = "cq:Page";
pub const ASSET_TYPE: &str = "dam:Asset";
pub const STATIC_FILE_SUB_TYPE: &str = "STATIC_FILE";
pub const STATIC_FILE_MODEL: &str = "static-file";
pub const CONTENT_FRAGMENT_MODEL: &str = "contentFragment";
pub const CONTENT_FRAGMENT_DATA_PATH: &str = "data/master";
pub const STATIC_FILE_DATA_PATH: &str = "metadata";

pub const JSON_EXTENSION: &str = ".json";
pub const INFINITY_JSON: &str = ".infinity.json";
pub const HTML_EXTENSION: &str = ".html";
pub const DEFAULT_LABEL: &str = "default";
pub const SITE_ATTRIBUTE: &str = "site";

pub const IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".png", ".jpeg", ".svg", ".webp"];

/// External repository date format, e.g. `Mon Feb 26 2024 12:00:00 GMT+0000`.
pub const REPOSITORY_DATE_FORMAT: &str = "%a %b %d %Y %H:%M:%S GMT%z";

/// Normalized attribute date format.
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Whether a child key belongs to a reserved namespace.
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with(JCR_PREFIX) || key.starts_with(REP_PREFIX) || key.starts_with(CQ_PREFIX)
}

/// Whether a name does not end in a known image extension (case-insensitive).
pub fn has_no_image_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    !IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_keys() {
        assert!(is_reserved_key("jcr:content"));
        assert!(is_reserved_key("rep:policy"));
        assert!(is_reserved_key("cq:tags"));
        assert!(!is_reserved_key("sling:members"));
        assert!(!is_reserved_key("home"));
    }

    #[test]
    fn test_image_extensions() {
        assert!(!has_no_image_extension("logo.PNG"));
        assert!(!has_no_image_extension("hero.webp"));
        assert!(has_no_image_extension("report.pdf"));
        assert!(has_no_image_extension("home"));
    }
}
