//! Static dashboard page.
//!
//! The page is a shell: `script.js` and `style.css` (shipped next to it) do the
//! browsing and filtering client-side from three embedded data blocks.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::taxonomy::TaxonomyNode;

pub struct Dashboard<'a> {
    pub title: &'a str,
    pub tools: &'a [Value],
    pub tree: &'a TaxonomyNode,
    /// The registry file verbatim, offered for download by the page.
    pub raw_registry: &'a str,
}

pub fn render_dashboard(d: &Dashboard<'_>) -> Result<String, serde_json::Error> {
    let tools_json = embed_json(&serde_json::to_string(d.tools)?);
    let tree_json = embed_json(&serde_json::to_string(d.tree)?);
    let registry_text = embed_text(d.raw_registry);
    let title = html_escape(d.title);

    let mut html = String::new();
    html.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\"/>\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width,initial-scale=1\"/>\n");
    html.push_str(&format!("<title>{title}</title>\n"));
    html.push_str("<link rel=\"stylesheet\" href=\"style.css\">\n");
    html.push_str("<script src=\"script.js\" defer></script>\n");
    html.push_str("</head>\n<body>\n");

    html.push_str("<header><div class=\"header-container\">\n");
    html.push_str(&format!(
        "<div class=\"header-brand\"><div class=\"header-icon\"><img src=\"kali.svg\" alt=\"{title} logo\" style=\"width:100%;\"></div><h1>{title}</h1></div>\n"
    ));
    html.push_str("<div class=\"header-search\"><div class=\"search-input-wrapper\">");
    html.push_str("<input id=\"searchInput\" class=\"search-input\" placeholder=\"Search tools, capabilities, phases...\" autocomplete=\"off\"/>");
    html.push_str("</div></div>\n");
    html.push_str("<div class=\"header-actions\"><button id=\"resetBtn\" class=\"btn\">Reset</button></div>\n");
    html.push_str("</div></header>\n");

    html.push_str("<div class=\"main-container\"><div class=\"layout\">\n");
    html.push_str("<aside class=\"sidebar\">\n<div class=\"sidebar-header\">\n");
    html.push_str("<h2 class=\"sidebar-title\">Navigation</h2>\n<div class=\"sidebar-controls\">\n");
    html.push_str("<button id=\"expandAllBtn\" class=\"btn\" title=\"Expand all\">+</button>\n");
    html.push_str("<button id=\"collapseAllBtn\" class=\"btn\" title=\"Collapse all\">-</button>\n");
    html.push_str("<button id=\"downloadRegistryBtn\" class=\"btn btn-primary\" title=\"Download registry.yml\">Download YAML</button>\n");
    html.push_str("</div>\n</div>\n");
    html.push_str("<div class=\"tree-container\"><nav id=\"treeNav\" class=\"tree\" aria-label=\"Category tree\"></nav></div>\n");
    html.push_str("</aside>\n");
    html.push_str("<div id=\"breadcrumbs\" class=\"breadcrumbs\">All sections</div>\n");
    html.push_str("<div class=\"tools-scroll\"><section class=\"content-area\"><div class=\"tools-scroll-container\">\n");
    html.push_str("<div id=\"toolsGrid\" class=\"tools-grid\"></div>\n");
    html.push_str("<div id=\"emptyState\" class=\"empty-state\" style=\"display:none\"><h3>No results</h3><p>Clear filters or change the query</p></div>\n");
    html.push_str("</div></section></div>\n");
    html.push_str("</div></div>\n");

    html.push_str("<div id=\"notesModal\" class=\"modal-overlay\"><div class=\"modal\">\n");
    html.push_str("<div class=\"modal-header\"><h2 class=\"modal-title\" id=\"modalTitle\">Notes</h2>");
    html.push_str("<button class=\"modal-close\" id=\"closeModalBtn\" aria-label=\"Close\">&times;</button></div>\n");
    html.push_str("<div class=\"modal-body\">\n<div class=\"modal-tabs\">");
    html.push_str("<button class=\"modal-tab active\" data-tab=\"edit\">Editor</button>");
    html.push_str("<button class=\"modal-tab\" data-tab=\"preview\">Preview</button></div>\n");
    html.push_str("<div class=\"modal-content\">\n");
    html.push_str("<div class=\"tab-panel active\" id=\"editPanel\"><textarea id=\"notesEditor\" class=\"notes-editor\" placeholder=\"Write notes in Markdown or HTML...\"></textarea></div>\n");
    html.push_str("<div class=\"tab-panel\" id=\"previewPanel\"><div id=\"notesPreview\" class=\"notes-preview markdown-content\"></div></div>\n");
    html.push_str("</div>\n</div>\n");
    html.push_str("<div class=\"modal-footer\"><button id=\"saveNotesBtn\" class=\"btn btn-primary\">Save notes</button></div>\n");
    html.push_str("</div></div>\n");

    html.push_str("<button id=\"backToTopBtn\" class=\"back-to-top\" aria-label=\"Back to top\">&uarr;</button>\n");

    html.push_str(&format!(
        "<script id=\"toolsData\" type=\"application/json\">{tools_json}</script>\n"
    ));
    html.push_str(&format!(
        "<script id=\"treeData\" type=\"application/json\">{tree_json}</script>\n"
    ));
    html.push_str(&format!(
        "<script id=\"registryYaml\" type=\"text/plain\">{registry_text}</script>\n"
    ));
    html.push_str("</body>\n</html>\n");
    Ok(html)
}

/// `<` only occurs inside JSON strings, where `\u003c` parses to the same
/// value. With no `<` left, neither `</script` nor `<!--` can reach the
/// HTML tokenizer.
fn embed_json(json: &str) -> String {
    json.replace('<', "\\u003c")
}

/// Raw text can't be escaped losslessly inside `<script>`; a closing
/// `</script` and a comment opener `<!--` are broken up.
fn embed_text(text: &str) -> String {
    static CLOSE: OnceLock<Regex> = OnceLock::new();
    let close = CLOSE.get_or_init(|| Regex::new(r"(?i)</(script)").expect("static regex"));
    close
        .replace_all(text, "<\\/$1")
        .replace("<!--", "<\\!--")
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\"', "&quot;")
        .replace('\'', "&#39;")
}
