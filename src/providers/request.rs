use md5::{Digest, Md5};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::path::Path;
use url::Url;

use crate::fingerprint::MediaFingerprint;

/// Client revision reported to the server
pub const CLIENT_REVISION: u32 = 2437;

/// Repository domain shared by every host
pub const DOMAIN: &str = "shooter.cn";

/// Lookup endpoint path
pub const API_PATH: &str = "/api/subapi.php";

/// URL schemes chosen from at random
pub const SCHEMES: &[&str] = &["http", "https"];

/// Drive letter reported in `pathinfo`
const PATHINFO_DRIVE: &str = "D:";

/// Host names under `DOMAIN`
pub fn servers() -> Vec<String> {
    let mut servers: Vec<String> = ["www", "splayer", "svplayer"].iter().map(|s| s.to_string()).collect();
    servers.extend((1..=12).map(|i| format!("splayer{}", i)));
    servers
}

/// One fully built lookup request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleRequest {
    /// Target endpoint
    pub url: String,
    /// `User-Agent` header value
    pub user_agent: String,
    /// Multipart boundary token
    pub boundary: String,
    /// Form fields in body order
    pub fields: Vec<(&'static str, String)>,
    /// Encoded multipart body
    pub body: Vec<u8>,
}

impl SubtitleRequest {
    /// Build a request for `media` with a freshly drawn host, scheme and boundary
    pub fn build<R: Rng + ?Sized>(media: &Path, fingerprint: &MediaFingerprint, rng: &mut R) -> Self {
        let pathinfo = pathinfo(media);
        let filehash = fingerprint.key();
        let vhash = vhash(&pathinfo, &filehash);

        let scheme = SCHEMES.choose(rng).copied().unwrap_or("http");
        let servers = servers();
        let host = servers.choose(rng).map(String::as_str).unwrap_or("www");
        let url = format!("{}://{}.{}{}", scheme, host, DOMAIN, API_PATH);

        let boundary = format!("{}{:x}", "-".repeat(28), rng.random::<u64>() & 0xFFFF_FFFF_FFFF);
        let fields = vec![("filehash", filehash), ("pathinfo", pathinfo), ("vhash", vhash)];
        let body = encode_body(&boundary, &fields);

        Self {
            url,
            user_agent: format!("SPlayer Build {}", CLIENT_REVISION),
            boundary,
            fields,
            body,
        }
    }

    /// Endpoint as a parsed URL
    pub fn parsed_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.url)
    }

    /// `Content-Type` header value
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Value of a form field by name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Human-readable dump for debug and dry-run logs
    pub fn describe(&self) -> String {
        format!(
            "POST {}\nUser-Agent: {}\nContent-Type: {}\n\n{}",
            self.url,
            self.user_agent,
            self.content_type(),
            String::from_utf8_lossy(&self.body)
        )
    }
}

/// Pseudo Windows path `D:\<parent>\<file>` the server expects
pub fn pathinfo(media: &Path) -> String {
    let file = media.file_name().map(|s| s.to_string_lossy()).unwrap_or_default();
    let parent = media
        .parent()
        .and_then(Path::file_name)
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    [PATHINFO_DRIVE, &*parent, &*file].join("\\")
}

/// Verification token over the revision, `pathinfo` and `filehash`
pub fn vhash(pathinfo: &str, filehash: &str) -> String {
    let mut token: Vec<u8> = Vec::new();
    token.extend_from_slice(format!("SP,aerSP,aer {} &e(", CLIENT_REVISION).as_bytes());
    token.extend_from_slice(b"\xD7\x02 ");
    token.extend_from_slice(pathinfo.as_bytes());
    token.push(b' ');
    token.extend_from_slice(filehash.as_bytes());
    format!("{:x}", Md5::digest(&token))
}

fn encode_body(boundary: &str, fields: &[(&'static str, String)]) -> Vec<u8> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{}\nContent-Disposition: form-data; name=\"{}\"\n\n{}\n",
            boundary, name, value
        ));
    }
    body.push_str(&format!("--{}--", boundary));
    body.into_bytes()
}
