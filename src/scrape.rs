//! Sequential crawl of a tool index: tool page links and their SVG icons.
//!
//! One request at a time, a fixed pause between requests, a timeout on every
//! request. Any failure on an individual page or icon is logged and skipped;
//! only an unreachable start page ends the run.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_START_URL: &str = "https://www.kali.org/tools/";
pub const DEFAULT_USER_AGENT: &str = "toolmap-icon-scraper/0.1";

/// Listing page that links every tool; never a tool itself.
const ALL_TOOLS_SLUG: &str = "all-tools";

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub start: Url,
    pub user_agent: String,
    pub page_timeout: Duration,
    pub download_timeout: Duration,
    pub delay: Duration,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeSummary {
    pub links_file: PathBuf,
    pub icons_dir: PathBuf,
    pub tool_links: usize,
    pub pages_failed: usize,
    pub pages_without_svg: usize,
    pub icons_downloaded: usize,
    pub icons_existing: usize,
    pub icons_failed: usize,
}

/// The site a crawl stays on: `origin` is `scheme://host[:port]`, `domain`
/// the host without a leading `www.`.
#[derive(Debug, Clone)]
pub struct Site {
    origin: String,
    domain: String,
}

impl Site {
    pub fn from_url(url: &Url) -> Result<Self> {
        let host = url
            .host_str()
            .ok_or_else(|| anyhow!("start URL has no host: {}", url))?;
        let origin = url.origin().ascii_serialization();
        let domain = host.strip_prefix("www.").unwrap_or(host).to_string();
        Ok(Self { origin, domain })
    }

    fn owns_host(&self, host: &str) -> bool {
        host == self.domain || host.ends_with(&format!(".{}", self.domain))
    }
}

#[derive(Debug)]
struct SiteClient {
    agent: ureq::Agent,
    user_agent: String,
}

impl SiteClient {
    fn new(user_agent: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .build();
        Self {
            agent,
            user_agent: user_agent.to_string(),
        }
    }

    fn request(&self, url: &Url, timeout: Duration) -> Result<ureq::Response> {
        match self
            .agent
            .get(url.as_str())
            .set("User-Agent", &self.user_agent)
            .timeout(timeout)
            .call()
        {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(code, _)) => {
                Err(anyhow!("request failed: {}: HTTP {}", url, code))
            }
            Err(e) => Err(anyhow!("request failed: {}: {}", url, e)),
        }
    }

    fn get_text(&self, url: &Url, timeout: Duration) -> Result<String> {
        self.request(url, timeout)?
            .into_string()
            .with_context(|| format!("failed to read body of {}", url))
    }

    /// Stream `url` into `out_path`. A partially written file is removed on failure.
    fn download(&self, url: &Url, out_path: &Path, timeout: Duration) -> Result<u64> {
        let result = self.request(url, timeout).and_then(|resp| {
            let mut file = fs::File::create(out_path)
                .with_context(|| format!("failed to create {}", out_path.display()))?;
            io::copy(&mut resp.into_reader(), &mut file)
                .with_context(|| format!("failed to write {}", out_path.display()))
        });
        if result.is_err() && out_path.exists() {
            let _ = fs::remove_file(out_path);
        }
        result
    }
}

/// Canonical `<origin>/tools/<slug>/` for links that point at a single tool page.
pub fn canonical_tool_url(raw_href: &str, page: &Url, site: &Site) -> Option<String> {
    let full = page.join(raw_href.trim()).ok()?;
    if !site.owns_host(full.host_str()?) {
        return None;
    }
    let rest = full.path().strip_prefix("/tools/")?;
    let slug = rest.strip_suffix('/').unwrap_or(rest);
    if slug.is_empty() || slug.contains('/') || slug == ALL_TOOLS_SLUG {
        return None;
    }
    Some(format!("{}/tools/{}/", site.origin, slug))
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("bad selector {css:?}: {e}"))
}

pub fn extract_tool_links(html: &str, page: &Url, site: &Site) -> Result<BTreeSet<String>> {
    let doc = Html::parse_document(html);
    let anchors = selector("a[href]")?;
    Ok(doc
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| canonical_tool_url(href, page, site))
        .collect())
}

/// The "all tools" listing linked from the index page, if any.
pub fn find_all_tools_link(html: &str, page: &Url) -> Result<Option<Url>> {
    let doc = Html::parse_document(html);
    let anchors = selector("a[href]")?;
    let needle = format!("/tools/{ALL_TOOLS_SLUG}/");
    Ok(doc
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|href| href.contains(&needle))
        .and_then(|href| page.join(href).ok()))
}

/// SVG images on a tool page. Images under `/tools/<slug>/images/` win; any
/// SVG on the page is the fallback.
pub fn find_svgs_for_tool(html: &str, tool_url: &Url) -> Result<BTreeSet<String>> {
    let doc = Html::parse_document(html);
    let images = selector("img[src]")?;
    let slug = tool_url
        .path_segments()
        .and_then(|segs| segs.filter(|s| !s.is_empty()).last())
        .unwrap_or_default()
        .to_string();
    let own_dir = format!("/tools/{slug}/images/");

    let svgs: Vec<Url> = doc
        .select(&images)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| src.to_ascii_lowercase().ends_with(".svg"))
        .filter_map(|src| tool_url.join(src).ok())
        .collect();

    let own: BTreeSet<String> = svgs
        .iter()
        .filter(|u| u.path().contains(&own_dir))
        .map(|u| u.to_string())
        .collect();
    if !own.is_empty() {
        return Ok(own);
    }
    Ok(svgs.into_iter().map(|u| u.to_string()).collect())
}

pub fn icon_file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segs| segs.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("logo.svg")
        .to_string()
}

pub fn run_scrape(
    config: &ScrapeConfig,
    links_out: &Path,
    icons_dir: &Path,
) -> Result<ScrapeSummary> {
    fs::create_dir_all(icons_dir)
        .with_context(|| format!("failed to create icons dir {}", icons_dir.display()))?;
    let site = Site::from_url(&config.start)?;
    let client = SiteClient::new(&config.user_agent);

    info!(url = %config.start, "fetching tool index");
    let start_html = client
        .get_text(&config.start, config.page_timeout)
        .with_context(|| format!("cannot reach the tool index {}", config.start))?;
    let mut links = extract_tool_links(&start_html, &config.start, &site)?;

    if let Some(all_tools) = find_all_tools_link(&start_html, &config.start)? {
        info!(url = %all_tools, "following full tool listing");
        match client.get_text(&all_tools, config.page_timeout) {
            Ok(html) => {
                let more = extract_tool_links(&html, &all_tools, &site)?;
                info!(count = more.len(), "tool links on full listing");
                links.extend(more);
            }
            Err(e) => warn!("cannot fetch full tool listing: {e:#}"),
        }
    }

    write_lines(links_out, links.iter())?;
    info!(count = links.len(), path = %links_out.display(), "saved tool links");

    let mut summary = ScrapeSummary {
        links_file: links_out.to_path_buf(),
        icons_dir: icons_dir.to_path_buf(),
        tool_links: links.len(),
        ..ScrapeSummary::default()
    };

    let total = links.len();
    for (i, link) in links.iter().enumerate() {
        info!("[{}/{}] {}", i + 1, total, link);
        let tool_url = match Url::parse(link) {
            Ok(u) => u,
            Err(e) => {
                warn!("skip {link}: {e}");
                summary.pages_failed += 1;
                continue;
            }
        };
        let html = match client.get_text(&tool_url, config.page_timeout) {
            Ok(html) => html,
            Err(e) => {
                warn!("skip page: {e:#}");
                summary.pages_failed += 1;
                thread::sleep(config.delay);
                continue;
            }
        };

        let svgs = find_svgs_for_tool(&html, &tool_url)?;
        if svgs.is_empty() {
            debug!("no SVG on {link}");
            summary.pages_without_svg += 1;
            thread::sleep(config.delay);
            continue;
        }

        for svg in &svgs {
            let Ok(svg_url) = Url::parse(svg) else {
                summary.icons_failed += 1;
                continue;
            };
            let file_name = icon_file_name(&svg_url);
            let out_path = icons_dir.join(&file_name);
            if out_path.exists() {
                debug!("{file_name} exists, skipping");
                summary.icons_existing += 1;
                continue;
            }
            match client.download(&svg_url, &out_path, config.download_timeout) {
                Ok(bytes) => {
                    info!("  downloaded {file_name} ({bytes} bytes)");
                    summary.icons_downloaded += 1;
                }
                Err(e) => {
                    warn!("  download failed: {e:#}");
                    summary.icons_failed += 1;
                }
            }
            thread::sleep(config.delay);
        }
        thread::sleep(config.delay);
    }

    Ok(summary)
}

fn write_lines<'a, I: Iterator<Item = &'a String>>(path: &Path, lines: I) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create dir {}", parent.display()))?;
    }
    let mut text = String::new();
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}
