use data_ingestion::Headline;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

pub const DEFAULT_LIMIT: usize = 5;

const WHOLE_WORD_BASE: i64 = 15;
const SUBSTRING_BONUS: i64 = 4;
const PUNCTUATION_BONUS: i64 = 1;
const HEADLINE_PUNCTUATION: [char; 3] = [':', '-', '—'];

/// Company-name aliases per symbol, most specific first.
const ALIAS_TABLE: &[(&str, &[&str])] = &[
    ("NVDA", &["NVIDIA", "Nvidia"]),
    ("AMD", &["Advanced Micro Devices", "AMD"]),
    ("AAPL", &["Apple"]),
    ("MSFT", &["Microsoft"]),
    ("TSLA", &["Tesla"]),
    ("BAC", &["Bank of America"]),
    ("QQQ", &["Invesco QQQ", "Nasdaq-100", "Nasdaq 100"]),
    ("MSTR", &["MicroStrategy"]),
    ("TSMC", &["TSMC", "Taiwan Semiconductor", "Taiwan Semi"]),
    ("META", &["Meta", "Facebook"]),
    ("GOOGL", &["Alphabet", "Google"]),
    ("NFLX", &["Netflix"]),
    ("AMZN", &["Amazon"]),
];

/// Symbol first, then its known aliases, without repeats. Unknown symbols get only themselves.
pub fn aliases_for(ticker: &str) -> Vec<String> {
    let symbol = ticker.trim().to_uppercase();
    let known = ALIAS_TABLE
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[]);

    let mut out = vec![symbol];
    for alias in known {
        if !out.iter().any(|a| a == alias) {
            out.push(alias.to_string());
        }
    }
    out
}

struct Alias {
    lowered: String,
    whole_word: Option<Regex>,
}

/// Relevance scorer for one ticker's alias list.
pub struct AliasMatcher {
    aliases: Vec<Alias>,
}

impl AliasMatcher {
    pub fn for_ticker(ticker: &str) -> Self {
        let aliases = aliases_for(ticker)
            .into_iter()
            .map(|a| Alias {
                whole_word: RegexBuilder::new(&format!(r"\b{}\b", regex::escape(&a)))
                    .case_insensitive(true)
                    .build()
                    .ok(),
                lowered: a.to_lowercase(),
            })
            .collect();
        Self { aliases }
    }

    /// `None` when no alias occurs in the title at all.
    ///
    /// The alias at 1-based priority `i` of `K` scores `15 * (K - i + 1)` on a
    /// whole-word match and 4 on a substring-only match; headline punctuation adds 1.
    pub fn score(&self, title: &str) -> Option<i64> {
        let k = self.aliases.len() as i64;
        let lowered = title.to_lowercase();
        let mut score = 0;
        let mut matched = false;

        for (i, alias) in self.aliases.iter().enumerate() {
            let priority = i as i64 + 1;
            if alias.whole_word.as_ref().is_some_and(|re| re.is_match(title)) {
                score += WHOLE_WORD_BASE * (k - priority + 1);
                matched = true;
            } else if lowered.contains(&alias.lowered) {
                score += SUBSTRING_BONUS;
                matched = true;
            }
        }

        if !matched {
            return None;
        }
        if title.contains(&HEADLINE_PUNCTUATION[..]) {
            score += PUNCTUATION_BONUS;
        }
        Some(score)
    }
}

fn normalize(h: &Headline) -> Option<Headline> {
    let title = h.title.trim();
    let url = h.url.trim();
    if title.is_empty() || url.is_empty() {
        return None;
    }
    let publisher = h.publisher.trim();
    Some(Headline {
        title: title.to_string(),
        publisher: if publisher.is_empty() { "News" } else { publisher }.to_string(),
        timestamp: h.timestamp,
        url: url.to_string(),
    })
}

/// Merges headline candidates from several sources (in priority order) into
/// the `limit` most relevant ones for `ticker`.
///
/// Duplicates by `(title, url)` keep their first occurrence. Titles matching no
/// alias are dropped. Ties on score go to the newer timestamp; undated headlines
/// rank below dated ones.
pub fn merge_rank(ticker: &str, sources: &[Vec<Headline>], limit: usize) -> Vec<Headline> {
    if ticker.trim().is_empty() {
        return Vec::new();
    }
    let matcher = AliasMatcher::for_ticker(ticker);

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut scored: Vec<(i64, Headline)> = Vec::new();
    for candidate in sources.iter().flatten() {
        let Some(h) = normalize(candidate) else {
            continue;
        };
        if !seen.insert((h.title.clone(), h.url.clone())) {
            continue;
        }
        if let Some(score) = matcher.score(&h.title) {
            scored.push((score, h));
        }
    }

    scored.sort_by(|(sa, a), (sb, b)| (sb, b.timestamp).cmp(&(sa, a.timestamp)));
    scored
        .into_iter()
        .map(|(_, h)| h)
        .take(limit.max(1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(minute: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 14, minute, 0).unwrap())
    }

    fn h(title: &str, url: &str, publisher: &str, ts: Option<DateTime<Utc>>) -> Headline {
        Headline {
            title: title.to_string(),
            publisher: publisher.to_string(),
            timestamp: ts,
            url: url.to_string(),
        }
    }

    #[test]
    fn alias_list_is_symbol_first_and_deduplicated() {
        assert_eq!(aliases_for("amd"), vec!["AMD", "Advanced Micro Devices"]);
        assert_eq!(aliases_for("TSLA"), vec!["TSLA", "Tesla"]);
        assert_eq!(aliases_for("ZZZZ"), vec!["ZZZZ"]);
    }

    #[test]
    fn scoring_weights() {
        let m = AliasMatcher::for_ticker("TSLA");
        // K = 2: symbol whole-word 30, "Tesla" whole-word 15
        assert_eq!(m.score("TSLA shares climb"), Some(30));
        assert_eq!(m.score("Tesla and TSLA options"), Some(45));
        assert_eq!(m.score("Tesla: recall widens"), Some(16));
        assert_eq!(m.score("Teslas everywhere"), Some(4));
        assert_eq!(m.score("Ford earnings - preview"), None);
    }

    #[test]
    fn whole_word_symbol_outranks_partial_alias() {
        let merged = merge_rank(
            "TSLA",
            &[vec![
                h("Teslas flood used market", "https://a/1", "A", at(50)),
                h("Why TSLA moved today", "https://a/2", "A", at(10)),
            ]],
            5,
        );
        assert_eq!(merged[0].url, "https://a/2");
        assert_eq!(merged[1].url, "https://a/1");
    }

    #[test]
    fn duplicates_across_sources_collapse_to_first() {
        let merged = merge_rank(
            "NVDA",
            &[
                vec![h("Nvidia unveils chip", "https://n/1", "Finnhub", at(5))],
                vec![
                    h("Nvidia unveils chip", "https://n/1", "Yahoo", at(7)),
                    h("Nvidia unveils chip", "https://n/other", "Yahoo", at(7)),
                ],
            ],
            5,
        );
        assert_eq!(merged.len(), 2);
        let first = merged.iter().find(|x| x.url == "https://n/1").unwrap();
        assert_eq!(first.publisher, "Finnhub");
        assert_eq!(first.timestamp, at(5));
    }

    #[test]
    fn irrelevant_and_incomplete_titles_are_dropped() {
        let merged = merge_rank(
            "AAPL",
            &[vec![
                h("Bond yields rise", "https://b/1", "Reuters", at(1)),
                h("", "https://b/2", "Reuters", at(1)),
                h("Apple ships update", "", "Reuters", at(1)),
                h("  Apple opens store  ", " https://b/3 ", "", at(1)),
            ]],
            5,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "Apple opens store");
        assert_eq!(merged[0].url, "https://b/3");
        assert_eq!(merged[0].publisher, "News");
    }

    #[test]
    fn ties_break_on_newest_instant_then_undated_last() {
        let merged = merge_rank(
            "MSFT",
            &[vec![
                h("Microsoft cloud deal", "https://m/undated", "A", None),
                h("Microsoft cloud outage", "https://m/old", "A", at(1)),
                h("Microsoft cloud growth", "https://m/new", "A", at(30)),
            ]],
            5,
        );
        let urls: Vec<&str> = merged.iter().map(|x| x.url.as_str()).collect();
        assert_eq!(urls, vec!["https://m/new", "https://m/old", "https://m/undated"]);
    }

    #[test]
    fn respects_limit_and_blank_ticker() {
        let many: Vec<Headline> = (0..8)
            .map(|i| h(&format!("Amazon story {i}"), &format!("https://z/{i}"), "A", at(i)))
            .collect();
        assert_eq!(merge_rank("AMZN", &[many.clone()], 5).len(), 5);
        assert_eq!(merge_rank("AMZN", &[many.clone()], 0).len(), 1);
        assert!(merge_rank("  ", &[many], 5).is_empty());
    }
}
