use serde::{Deserialize, Serialize};

pub const MAX_ONE_LINER_CHARS: usize = 180;
pub const MAX_TITLE_CHARS: usize = 80;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneLinerRequest {
    #[serde(rename = "class", alias = "class_")]
    pub class_name: String,
    pub confidence: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneLiner {
    pub text: String,
}

pub fn risk_phrase(class_name: &str) -> &'static str {
    match class_name {
        "NO_ACTION" => "no clear edge, stand aside",
        "IRON_CONDOR" => "range-bound, defined risk both sides",
        "DEBIT_CALL" => "bullish tilt, risk capped at premium",
        "DEBIT_PUT" => "bearish tilt, risk capped at premium",
        "COVERED_CALL" => "income on shares held, upside capped",
        _ => "review setup",
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// `"{class}: {risk}. Conf {pct}%. Source: {publisher} — {title} {url}"`,
/// title cut to 80 characters and the whole line to 180.
pub fn one_liner(req: &OneLinerRequest) -> OneLiner {
    let confidence = if req.confidence.is_finite() {
        req.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let pct = (confidence * 100.0).round() as u32;

    let text = format!(
        "{}: {}. Conf {}%. Source: {} — {} {}",
        req.class_name.trim(),
        risk_phrase(req.class_name.trim()),
        pct,
        req.publisher.trim(),
        truncate_chars(req.title.trim(), MAX_TITLE_CHARS),
        req.url.trim(),
    );

    OneLiner {
        text: truncate_chars(text.trim_end(), MAX_ONE_LINER_CHARS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(class_name: &str, confidence: f64, title: &str) -> OneLinerRequest {
        OneLinerRequest {
            class_name: class_name.to_string(),
            confidence,
            title: title.to_string(),
            publisher: "Reuters".to_string(),
            url: "https://r.example/1".to_string(),
        }
    }

    #[test]
    fn renders_template() {
        let line = one_liner(&request("DEBIT_CALL", 0.734, "Tesla beats on deliveries"));
        assert_eq!(
            line.text,
            "DEBIT_CALL: bullish tilt, risk capped at premium. Conf 73%. Source: Reuters — Tesla beats on deliveries https://r.example/1"
        );
    }

    #[test]
    fn unknown_class_gets_generic_phrase() {
        let line = one_liner(&request("STRANGLE", 0.5, "t"));
        assert!(line.text.starts_with("STRANGLE: review setup. Conf 50%."));
    }

    #[test]
    fn long_titles_and_lines_are_cut() {
        let title = "x".repeat(300);
        let mut req = request("IRON_CONDOR", 1.7, &title);
        req.url = format!("https://r.example/{}", "y".repeat(200));

        let line = one_liner(&req);
        assert_eq!(line.text.chars().count(), MAX_ONE_LINER_CHARS);
        assert!(line.text.contains("Conf 100%"));
        assert!(!line.text.contains(&"x".repeat(MAX_TITLE_CHARS + 1)));
    }

    #[test]
    fn accepts_legacy_class_field() {
        let req: OneLinerRequest =
            serde_json::from_str(r#"{"class_":"NO_ACTION","confidence":0.2}"#).unwrap();
        assert_eq!(req.class_name, "NO_ACTION");
        assert!(one_liner(&req).text.chars().count() <= MAX_ONE_LINER_CHARS);
    }
}
