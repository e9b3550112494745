//! Where the remote word-lists live.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

pub const THUOCL_BASE_URL: &str = "https://raw.githubusercontent.com/thunlp/THUOCL/master/data";

/// THUOCL category lists as `(category, file name)`.
pub const THUOCL_LISTS: &[(&str, &str)] = &[
    ("IT", "THUOCL_it.txt"),
    ("财经", "THUOCL_caijing.txt"),
    ("成语", "THUOCL_chengyu.txt"),
    ("地名", "THUOCL_diming.txt"),
    ("历史名人", "THUOCL_lishimingren.txt"),
    ("诗词", "THUOCL_shici.txt"),
    ("医学", "THUOCL_yixue.txt"),
    ("饮食", "THUOCL_yinshi.txt"),
    ("法律", "THUOCL_falv.txt"),
    ("汽车", "THUOCL_qiche.txt"),
    ("动物", "THUOCL_dongwu.txt"),
];

pub const RIME_ICE_REPO: &str = "iDvel/rime-ice";
pub const GITHUB_API: &str = "https://api.github.com";
const RELEASE_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// One remote list in a catalog.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RemoteList {
    pub label: String,
    pub file_name: String,
    pub url: String,
}

/// The THUOCL catalog rooted at `base_url`.
pub fn thuocl_catalog(base_url: &str) -> Vec<RemoteList> {
    let base = base_url.trim_end_matches('/');
    THUOCL_LISTS
        .iter()
        .map(|(label, file_name)| RemoteList {
            label: (*label).to_string(),
            file_name: (*file_name).to_string(),
            url: format!("{base}/{file_name}"),
        })
        .collect()
}

/// Branch archive URLs for `repo`, most preferred first.
pub fn branch_archive_urls(repo: &str) -> Vec<String> {
    vec![
        format!("https://github.com/{repo}/archive/refs/heads/main.zip"),
        format!("https://github.com/{repo}/archive/refs/heads/master.zip"),
        format!("https://codeload.github.com/{repo}/zip/refs/heads/main"),
    ]
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    assets: Vec<Asset>,
    zipball_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    browser_download_url: String,
}

/// Pick the download for a release: a `full.zip` asset, else the source zipball.
fn release_download(release: Release) -> Option<String> {
    release
        .assets
        .into_iter()
        .map(|a| a.browser_download_url)
        .find(|url| url.contains("full.zip"))
        .or(release.zipball_url)
}

/// Ask the GitHub API for the latest release archive of `repo`.
///
/// Any failure (network, status, payload) yields `None`; the branch
/// archives are still there to fall back on.
pub async fn latest_release_url(client: &Client, api_base: &str, repo: &str) -> Option<String> {
    let url = format!("{}/repos/{repo}/releases/latest", api_base.trim_end_matches('/'));
    let response = match client
        .get(&url)
        .timeout(RELEASE_LOOKUP_TIMEOUT)
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            debug!("release lookup {url} returned {}", response.status());
            return None;
        }
        Err(err) => {
            debug!("release lookup {url} failed: {err}");
            return None;
        }
    };
    let body = response.bytes().await.ok()?;
    match serde_json::from_slice::<Release>(&body) {
        Ok(release) => release_download(release),
        Err(err) => {
            debug!("release lookup {url}: unexpected payload: {err}");
            None
        }
    }
}

/// Every candidate archive URL for `repo`, in the order they should be tried.
pub async fn archive_candidates(client: &Client, api_base: &str, repo: &str) -> Vec<String> {
    let mut urls = Vec::new();
    if let Some(release) = latest_release_url(client, api_base, repo).await {
        info!("latest release archive: {release}");
        urls.push(release);
    }
    urls.extend(branch_archive_urls(repo));
    urls
}
