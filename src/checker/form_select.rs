//! Form-select checker
//!
//! Reservation pages of this kind list bookable dates as `<option>` entries of
//! a `<select>` element. Options that are disabled or have an empty value
//! (placeholders such as "Please choose") do not count as slots.

use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;

use super::{AvailabilityChecker, CheckerError};
use crate::config::Target;
use crate::monitor::{CheckOutcome, Slot};

/// Selector used when a target does not configure one
pub const DEFAULT_SELECTOR: &str = "select.form-select";

/// Checker fetching the page and reading its select options
pub struct FormSelectChecker {
    client: reqwest::Client,
    scanner: SelectScanner,
}

impl FormSelectChecker {
    pub fn new(client: reqwest::Client, selector: &str) -> Result<Self, CheckerError> {
        Ok(Self {
            client,
            scanner: SelectScanner::new(selector)?,
        })
    }

    async fn fetch_slots(&self, url: &str) -> Result<Vec<Slot>, CheckerError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CheckerError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CheckerError::Status(response.status().as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CheckerError::Request(e.to_string()))?;

        self.scanner.scan(&body)
    }
}

#[async_trait]
impl AvailabilityChecker for FormSelectChecker {
    async fn check(&self, target: &Target) -> CheckOutcome {
        tracing::debug!(target_id = %target.id, url = %target.url, "Loading page");

        match self.fetch_slots(&target.url).await {
            Ok(slots) => {
                tracing::info!(
                    target_id = %target.id,
                    "Found {} available date options",
                    slots.len()
                );
                CheckOutcome::success(slots)
            }
            Err(e) => {
                tracing::warn!(target_id = %target.id, error = %e, "Error checking page");
                CheckOutcome::failure(e.to_string())
            }
        }
    }
}

/// Finds a `<select>` element by simple selector and extracts its usable options
pub struct SelectScanner {
    selector: String,
    id: Option<String>,
    classes: Vec<String>,
    select_re: Regex,
    option_re: Regex,
    attr_re: Regex,
    tag_re: Regex,
}

impl SelectScanner {
    /// Supported selectors: `select`, `.class`, `#id`, `select.a.b`, `select#id`
    pub fn new(selector: &str) -> Result<Self, CheckerError> {
        let (id, classes) = parse_selector(selector)?;

        Ok(Self {
            selector: selector.to_string(),
            id,
            classes,
            select_re: compile(r"(?is)<select\b([^>]*)>(.*?)</select\s*>")?,
            option_re: compile(r"(?is)<option\b([^>]*)>")?,
            attr_re: compile(
                r#"(?is)([a-z_:][-a-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#,
            )?,
            tag_re: compile(r"(?s)<[^>]*>")?,
        })
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Slots of the first matching select element
    pub fn scan(&self, html: &str) -> Result<Vec<Slot>, CheckerError> {
        for caps in self.select_re.captures_iter(html) {
            let attrs = self.attributes(caps.get(1).map_or("", |m| m.as_str()));
            if self.matches(&attrs) {
                return Ok(self.options(caps.get(2).map_or("", |m| m.as_str())));
            }
        }
        Err(CheckerError::SelectNotFound)
    }

    fn matches(&self, attrs: &HashMap<String, String>) -> bool {
        if let Some(id) = &self.id {
            if attrs.get("id") != Some(id) {
                return false;
            }
        }
        let class_attr = attrs.get("class").map(String::as_str).unwrap_or("");
        self.classes
            .iter()
            .all(|class| class_attr.split_whitespace().any(|c| c == class))
    }

    fn options(&self, body: &str) -> Vec<Slot> {
        let opens: Vec<_> = self.option_re.captures_iter(body).collect();
        let mut slots = Vec::new();

        for (i, caps) in opens.iter().enumerate() {
            let Some(open) = caps.get(0) else { continue };
            // Closing tags are optional in HTML; an option ends where the next begins
            let end = opens
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(body.len(), |m| m.start());
            let mut text = &body[open.end()..end];
            if let Some(close) = text.to_ascii_lowercase().find("</option") {
                text = &text[..close];
            }

            let attrs = self.attributes(caps.get(1).map_or("", |m| m.as_str()));
            if attrs.contains_key("disabled") {
                continue;
            }
            let value = match attrs.get("value").map(|v| v.trim()) {
                Some(v) if !v.is_empty() => v.to_string(),
                _ => continue,
            };

            let stripped = self.tag_re.replace_all(text, " ");
            let label = self
                .decode_entities(&stripped)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");

            slots.push(Slot { value, label });
        }

        slots
    }

    fn attributes(&self, raw: &str) -> HashMap<String, String> {
        self.attr_re
            .captures_iter(raw)
            .filter_map(|caps| {
                let name = caps.get(1)?.as_str().to_ascii_lowercase();
                let value = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .or_else(|| caps.get(4))
                    .map(|m| self.decode_entities(m.as_str()))
                    .unwrap_or_default();
                Some((name, value))
            })
            .collect()
    }

    fn decode_entities(&self, text: &str) -> String {
        html_escape::decode_html_entities(text).into_owned()
    }
}

fn compile(pattern: &str) -> Result<Regex, CheckerError> {
    Regex::new(pattern).map_err(|e| CheckerError::Client(format!("bad pattern: {}", e)))
}

fn parse_selector(selector: &str) -> Result<(Option<String>, Vec<String>), CheckerError> {
    let invalid = |reason: &str| CheckerError::InvalidSelector {
        selector: selector.to_string(),
        reason: reason.to_string(),
    };

    let selector = selector.trim();
    if selector.is_empty() {
        return Err(invalid("empty selector"));
    }

    let tag_len = selector
        .find(|c: char| c == '.' || c == '#')
        .unwrap_or(selector.len());
    let (tag, rest) = selector.split_at(tag_len);
    if !tag.is_empty() && !tag.eq_ignore_ascii_case("select") {
        return Err(invalid("only select elements can be matched"));
    }

    let mut id = None;
    let mut classes = Vec::new();
    let mut remaining = rest;
    while let Some(marker) = remaining.chars().next() {
        let body = &remaining[1..];
        let len = body.find(|c: char| c == '.' || c == '#').unwrap_or(body.len());
        let name = &body[..len];
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid("unsupported selector syntax"));
        }
        match marker {
            '#' if id.is_none() => id = Some(name.to_string()),
            '#' => return Err(invalid("more than one id")),
            _ => classes.push(name.to_string()),
        }
        remaining = &body[len..];
    }

    Ok((id, classes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"
        <html><body>
        <select name="lang" class="lang-picker"><option value="de">Deutsch</option></select>
        <form>
          <select id="date" class="form-select  large" name="date">
            <option value="" selected>Please choose&hellip;</option>
            <option value="2024-09-21" disabled>Sat 21.09. (booked)</option>
            <option value="2024-09-22">Sun 22.09. &amp; evening</option>
            <option value='2024-09-23'><b>Mon</b> 23.09.
            <option value="2024-09-24" disabled="disabled">Tue 24.09.</option>
          </select>
        </form>
        </body></html>
    "#;

    #[test]
    fn test_scan_default_selector() {
        let scanner = SelectScanner::new(DEFAULT_SELECTOR).unwrap();
        let slots = scanner.scan(PAGE).unwrap();

        assert_eq!(
            slots,
            vec![
                Slot::new("2024-09-22", "Sun 22.09. & evening"),
                Slot::new("2024-09-23", "Mon 23.09."),
            ]
        );
    }

    #[test]
    fn test_scan_by_id_and_class() {
        let by_id = SelectScanner::new("#date").unwrap();
        assert_eq!(by_id.scan(PAGE).unwrap().len(), 2);

        let by_class = SelectScanner::new(".lang-picker").unwrap();
        assert_eq!(by_class.scan(PAGE).unwrap(), vec![Slot::new("de", "Deutsch")]);

        let missing = SelectScanner::new("select.nothing").unwrap();
        assert!(matches!(missing.scan(PAGE), Err(CheckerError::SelectNotFound)));
    }

    #[test]
    fn test_select_without_options() {
        let scanner = SelectScanner::new("select").unwrap();
        let slots = scanner
            .scan(r#"<select class="form-select"><option value="">None left</option></select>"#)
            .unwrap();
        assert!(slots.is_empty());
    }

    #[test]
    fn test_invalid_selectors() {
        for selector in ["", "div.form-select", "select > option", "#a#b", "select."] {
            assert!(
                matches!(
                    SelectScanner::new(selector),
                    Err(CheckerError::InvalidSelector { .. })
                ),
                "selector {:?} should be rejected",
                selector
            );
        }
    }

    #[test]
    fn test_numeric_entities() {
        let scanner = SelectScanner::new("select").unwrap();
        let slots = scanner
            .scan(r#"<select><option value="1">Caf&#233; &#x2013; 12:00</option></select>"#)
            .unwrap();
        assert_eq!(slots[0].label, "Café – 12:00");
    }

    #[test]
    fn test_named_entities() {
        let scanner = SelectScanner::new("select").unwrap();
        let slots = scanner
            .scan(
                r#"<select><option value="1">Sa 21.09. &ndash; Mittag im Z&auml;lt</option>
                   <option value="2">Gro&szlig;e&nbsp;Halle &uuml;ber &amp; mehr</option></select>"#,
            )
            .unwrap();
        assert_eq!(slots[0].label, "Sa 21.09. – Mittag im Zält");
        assert_eq!(slots[1].label, "Große Halle über & mehr");

        let event = crate::monitor::NotificationEvent::DatesAvailable {
            target: "Zelt".to_string(),
            url: "https://example.com".to_string(),
            slots,
        };
        let text = crate::notify::message::render_html(&event);
        assert!(text.contains("• Sa 21.09. – Mittag im Zält"));
        assert!(!text.contains("&amp;auml;"));
    }

    #[tokio::test]
    async fn test_check_against_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/book"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = crate::checker::http_client(Duration::from_secs(5)).unwrap();
        let checker = FormSelectChecker::new(client, DEFAULT_SELECTOR).unwrap();

        let target = Target::new("hall", "Main Hall", format!("{}/book", server.uri()));
        match checker.check(&target).await {
            CheckOutcome::Success {
                dates_available,
                slots,
            } => {
                assert!(dates_available);
                assert_eq!(slots.len(), 2);
            }
            other => panic!("expected success, got {:?}", other),
        }

        let target = Target::new("hall", "Main Hall", format!("{}/down", server.uri()));
        assert_eq!(checker.check(&target).await, CheckOutcome::failure("HTTP 503"));
    }
}
