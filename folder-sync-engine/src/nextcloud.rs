//! Nextcloud system-tag catalog over WebDAV.
//!
//! Resolution takes three kinds of `PROPFIND`:
//! 1. `systemtags/`: find the tag id whose display name matches.
//! 2. `systemtags-relations/<tag id>/`: ids of every node carrying it.
//! 3. `meta/<node id>/v`: the node's path under the user's files and
//!    whether it is a collection.
//!
//! Responses are parsed as `multistatus` XML into [`DavResponse`] values;
//! nothing is scraped out of raw text.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use quick_xml::events::Event;
use quick_xml::Reader;

use folder_sync_core::NextcloudConfig;

use crate::error::{io_err, SyncError};
use crate::source::{TagCatalog, TaggedNode};

const TAGS_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
  <d:prop><oc:id/><oc:display-name/></d:prop>
</d:propfind>"#;

const RELATIONS_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
  <d:prop><oc:id/></d:prop>
</d:propfind>"#;

const META_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
  <d:prop><oc:meta-path/><d:resourcetype/></d:prop>
</d:propfind>"#;

/// One `<d:response>` of a multistatus document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DavResponse {
    pub href: String,
    /// Property text keyed by local element name (`id`, `display-name`, ...).
    pub props: HashMap<String, String>,
    /// `<d:resourcetype><d:collection/></d:resourcetype>` was present.
    pub collection: bool,
}

impl DavResponse {
    pub fn prop(&self, name: &str) -> Option<&str> {
        self.props.get(name).map(String::as_str)
    }
}

/// Parse a WebDAV `multistatus` body.
pub fn parse_multistatus(xml: &str) -> Result<Vec<DavResponse>, SyncError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut responses = Vec::new();
    let mut current: Option<DavResponse> = None;
    let mut element: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(e.local_name().as_ref());
                match name.as_str() {
                    "response" => current = Some(DavResponse::default()),
                    "collection" => mark_collection(current.as_mut()),
                    _ => {}
                }
                element = Some(name);
            }
            Event::Empty(e) => {
                if local_name(e.local_name().as_ref()) == "collection" {
                    mark_collection(current.as_mut());
                }
            }
            Event::Text(text) => {
                if let (Some(response), Some(name)) = (current.as_mut(), element.as_deref()) {
                    let value = text.unescape()?.trim().to_string();
                    if name == "href" {
                        response.href = value;
                    } else {
                        response.props.insert(name.to_string(), value);
                    }
                }
            }
            Event::End(e) => {
                if local_name(e.local_name().as_ref()) == "response" {
                    if let Some(response) = current.take() {
                        responses.push(response);
                    }
                }
                element = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(responses)
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn mark_collection(response: Option<&mut DavResponse>) {
    if let Some(response) = response {
        response.collection = true;
    }
}

/// Id of the tag whose display name is exactly `tag`.
pub fn find_tag_id(responses: &[DavResponse], tag: &str) -> Option<String> {
    responses
        .iter()
        .find(|r| r.prop("display-name") == Some(tag))
        .and_then(|r| r.prop("id"))
        .map(str::to_string)
}

/// Every non-empty `oc:id` in a relations listing.
pub fn node_ids(responses: &[DavResponse]) -> Vec<String> {
    responses
        .iter()
        .filter_map(|r| r.prop("id"))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Map a `meta/<id>` response onto a path under `data_root`.
pub fn node_from_meta(responses: &[DavResponse], data_root: &Path) -> Option<TaggedNode> {
    let response = responses.iter().find(|r| r.prop("meta-path").is_some())?;
    let relative = response.prop("meta-path")?.trim_start_matches('/');
    if relative.is_empty() {
        return None;
    }
    Some(TaggedNode {
        path: data_root.join(relative),
        is_dir: response.collection,
    })
}

/// [`TagCatalog`] backed by a Nextcloud server's DAV endpoint.
pub struct NextcloudCatalog {
    agent: ureq::Agent,
    base: String,
    authorization: String,
    data_root: PathBuf,
}

impl NextcloudCatalog {
    pub fn new(config: &NextcloudConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout()).build();
        let credentials = format!("{}:{}", config.username, config.app_password);
        Self {
            agent,
            base: config.webdav_base.trim_end_matches('/').to_string(),
            authorization: format!("Basic {}", STANDARD.encode(credentials)),
            data_root: config.local_data_root.clone(),
        }
    }

    fn propfind(&self, url: &str, depth: &str, body: &str) -> Result<String, SyncError> {
        let response = self
            .agent
            .request("PROPFIND", url)
            .set("Authorization", &self.authorization)
            .set("Depth", depth)
            .set("Content-Type", "application/xml; charset=utf-8")
            .send_string(body)
            .map_err(Box::new)?;
        response.into_string().map_err(|e| io_err(url, e))
    }

    fn tag_id(&self, tag: &str) -> Result<String, SyncError> {
        let url = format!("{}/systemtags/", self.base);
        let responses = parse_multistatus(&self.propfind(&url, "1", TAGS_BODY)?)?;
        find_tag_id(&responses, tag)
            .ok_or_else(|| SyncError::Remote(format!("tag '{tag}' not found")))
    }

    fn node(&self, node_id: &str) -> Result<Option<TaggedNode>, SyncError> {
        let url = format!("{}/meta/{node_id}/v", self.base);
        let body = match self.propfind(&url, "0", META_BODY) {
            Ok(body) => body,
            Err(SyncError::Http(err)) if matches!(*err, ureq::Error::Status(..)) => {
                tracing::debug!(node_id, error = %err, "node lookup rejected, skipping");
                return Ok(None);
            }
            Err(other) => return Err(other),
        };
        Ok(node_from_meta(&parse_multistatus(&body)?, &self.data_root))
    }
}

impl TagCatalog for NextcloudCatalog {
    fn tagged_nodes(&self, tag: &str) -> Result<Vec<TaggedNode>, SyncError> {
        let tag_id = self.tag_id(tag)?;
        let url = format!("{}/systemtags-relations/{tag_id}/", self.base);
        let ids = node_ids(&parse_multistatus(&self.propfind(
            &url,
            "1",
            RELATIONS_BODY,
        )?)?);
        tracing::debug!(tag, tag_id = %tag_id, nodes = ids.len(), "resolved tag relations");

        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = self.node(&id)? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }
}
