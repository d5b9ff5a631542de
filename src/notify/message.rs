//! Human-readable notification texts

use crate::monitor::NotificationEvent;

/// Longest error message quoted in a notification, in characters
pub const MAX_ERROR_CHARS: usize = 500;

/// Render an event as Telegram HTML
pub fn render_html(event: &NotificationEvent) -> String {
    match event {
        NotificationEvent::Startup {
            target_names,
            interval,
        } => {
            let list = bullet_list(target_names.iter().map(String::as_str));
            format!(
                "🚀 <b>Slot Monitor Started</b>\n\n\
                 Monitoring {} target(s):\n{}\n\n\
                 Check interval: {} seconds",
                target_names.len(),
                list,
                interval.as_secs()
            )
        }
        NotificationEvent::DatesAvailable { target, url, slots } => {
            let list = bullet_list(slots.iter().map(|s| s.label.as_str()));
            format!(
                "🎉 <b>{} - DATES AVAILABLE!</b> 🎉\n\n\
                 Found {} available date(s):\n{}\n\n\
                 🔗 Book now: {}",
                escape_html(&target.to_uppercase()),
                slots.len(),
                list,
                escape_html(url)
            )
        }
        NotificationEvent::DatesUnavailable { target } => format!(
            "❌ <b>{} - Dates No Longer Available</b>\n\n\
             The previously available dates have been booked.\n\
             Will continue monitoring...",
            escape_html(target)
        ),
        NotificationEvent::ErrorEntered {
            target,
            message,
            error_count,
        } => format!(
            "⚠️ <b>{} - Monitor Error</b>\n\n\
             Failed to check reservation page {} time(s):\n\
             <code>{}</code>\n\n\
             Monitor will continue trying...",
            escape_html(target),
            error_count,
            escape_html(&truncate_chars(message, MAX_ERROR_CHARS))
        ),
        NotificationEvent::Recovered { target } => format!(
            "✅ <b>{} - Monitor Recovered</b>\n\n\
             Successfully reconnected to reservation page.\n\
             Monitoring continues normally.",
            escape_html(target)
        ),
    }
}

/// One-line rendering for logs
pub fn render_plain(event: &NotificationEvent) -> String {
    match event {
        NotificationEvent::Startup {
            target_names,
            interval,
        } => format!(
            "monitoring {} target(s) every {}s: {}",
            target_names.len(),
            interval.as_secs(),
            target_names.join(", ")
        ),
        NotificationEvent::DatesAvailable { target, url, slots } => format!(
            "{}: {} date(s) available at {}",
            target,
            slots.len(),
            url
        ),
        NotificationEvent::DatesUnavailable { target } => {
            format!("{}: dates no longer available", target)
        }
        NotificationEvent::ErrorEntered {
            target,
            message,
            error_count,
        } => format!("{}: check failed {} time(s): {}", target, error_count, message),
        NotificationEvent::Recovered { target } => format!("{}: monitor recovered", target),
    }
}

fn bullet_list<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items
        .map(|item| format!("• {}", escape_html(item)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape text for Telegram's HTML parse mode
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::Slot;
    use std::time::Duration;

    #[test]
    fn test_startup_message() {
        let event = NotificationEvent::Startup {
            target_names: vec!["Main Hall".to_string(), "Garden".to_string()],
            interval: Duration::from_secs(180),
        };
        let text = render_html(&event);
        assert!(text.contains("Monitoring 2 target(s):\n• Main Hall\n• Garden"));
        assert!(text.ends_with("Check interval: 180 seconds"));
    }

    #[test]
    fn test_dates_available_message() {
        let event = NotificationEvent::DatesAvailable {
            target: "Main Hall".to_string(),
            url: "https://example.com/book?a=1&b=2".to_string(),
            slots: vec![Slot::new("12", "Dec 12"), Slot::new("13", "Dec 13")],
        };
        let text = render_html(&event);
        assert!(text.contains("<b>MAIN HALL - DATES AVAILABLE!</b>"));
        assert!(text.contains("Found 2 available date(s):\n• Dec 12\n• Dec 13"));
        assert!(text.contains("https://example.com/book?a=1&amp;b=2"));
    }

    #[test]
    fn test_error_message_is_escaped_and_truncated() {
        let long = format!("<html>{}", "x".repeat(1000));
        let event = NotificationEvent::ErrorEntered {
            target: "Main Hall".to_string(),
            message: long,
            error_count: 3,
        };
        let text = render_html(&event);
        assert!(text.contains("Failed to check reservation page 3 time(s)"));
        assert!(text.contains("<code>&lt;html&gt;xxx"));
        assert!(!text.contains("<html>"));

        let code = text
            .split("<code>")
            .nth(1)
            .and_then(|rest| rest.split("</code>").next())
            .unwrap();
        assert_eq!(code.len(), "&lt;html&gt;".len() + MAX_ERROR_CHARS - "<html>".len());
    }

    #[test]
    fn test_plain_rendering() {
        let event = NotificationEvent::DatesUnavailable {
            target: "Garden".to_string(),
        };
        assert_eq!(render_plain(&event), "Garden: dates no longer available");
    }
}
