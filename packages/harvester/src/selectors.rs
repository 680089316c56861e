//! Site selectors, quarantined in one module because they are the part of
//! the pipeline most likely to rot. Each lookup takes a fallback chain and
//! tries entries in order, so a layout variant only needs a new entry here.

use scraper::{Html, Selector};

pub const JOB_CARDS: &[&str] = &[
    "li.ember-view.occludable-update.scaffold-layout__list-item",
    "li.ember-view.occludable-update.p0.relative.scaffold-layout__list-item",
    "li.ember-view.job-card-container",
    "div.job-card-container",
    "div.base-card",
];

pub const CARD_LINK: &[&str] = &["a.job-card-container__link", "a.base-card__full-link"];

pub const DETAIL_TITLE: &[&str] = &[
    "h1.t-24.t-bold.inline",
    "h1.top-card-layout__title",
    "h1.job-details-jobs-unified-top-card__job-title",
];

pub const DETAIL_COMPANY: &[&str] = &[
    "div.job-details-jobs-unified-top-card__company-name a",
    "div.job-details-jobs-unified-top-card__company-name",
    "a.topcard__org-name-link",
];

/// Location, posted date, and applicant count share this container as
/// loose spans.
pub const DETAIL_TERTIARY: &[&str] = &[
    "div.job-details-jobs-unified-top-card__primary-description-container span",
    "span.jobs-unified-top-card__subtitle-secondary-grouping span",
    "span.topcard__flavor--bullet",
];

/// Pills carrying employment type, workplace mode, and seniority.
pub const DETAIL_PILLS: &[&str] = &[
    "div.job-details-preferences-and-skills__pill span.ui-label",
    "li.job-criteria__item span.job-criteria__text",
];

pub const DETAIL_SALARY: &[&str] = &[
    "div.job-details-jobs-unified-top-card__job-insight span[dir='ltr']",
    "span.main-job-card__salary-info",
];

pub const DETAIL_APPLY_BUTTON: &[&str] = &["button.jobs-apply-button", "a.top-card-layout__cta"];

pub const DETAIL_LOGO: &[&str] = &[
    "img.ivm-view-attr__img--centered",
    "img.artdeco-entity-image",
];

pub const DETAIL_DESCRIPTION: &[&str] = &[
    "div.jobs-description__content div.jobs-box__html-content",
    "div.jobs-description-content__text",
    "div.description__text",
];

pub const DETAIL_COMPANY_DESCRIPTION: &[&str] = &[
    "div.jobs-company__box p.jobs-company__company-description",
    "section.jobs-company div.inline-show-more-text",
];

pub const LOGIN_CHALLENGE: &[&str] = &[
    "iframe[title*='captcha']",
    "div[class*='captcha']",
    "div[class*='challenge']",
    "input[name='pin']",
    "input[id*='verification']",
    "input[autocomplete='one-time-code']",
];

pub const LOGIN_SUCCESS: &[&str] = &[
    "div[data-test-id='nav-top-bar']",
    "div[data-test-id='nav-search-bar']",
    "input[aria-label*='Search by title']",
    "div.jobs-search-box",
];

pub const NO_RESULTS_BANNER: &[&str] = &[
    "div.jobs-search-no-results-banner",
    "section.no-results",
];

/// First non-empty text content matched by any selector in the chain.
pub fn first_text(html: &Html, chain: &[&str]) -> Option<String> {
    for raw in chain {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        for element in html.select(&selector) {
            let text = element.text().collect::<String>();
            let text = normalize_ws(&text);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Every non-empty text match across the whole chain, in document order
/// per selector.
pub fn all_texts(html: &Html, chain: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    for raw in chain {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        for element in html.select(&selector) {
            let text = normalize_ws(&element.text().collect::<String>());
            if !text.is_empty() {
                out.push(text);
            }
        }
        if !out.is_empty() {
            break;
        }
    }
    out
}

/// First value of `attr` on any element matched by the chain.
pub fn first_attr(html: &Html, chain: &[&str], attr: &str) -> Option<String> {
    for raw in chain {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        for element in html.select(&selector) {
            if let Some(value) = element.value().attr(attr) {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

pub fn any_present(html: &Html, chain: &[&str]) -> bool {
    chain.iter().any(|raw| {
        Selector::parse(raw)
            .map(|s| html.select(&s).next().is_some())
            .unwrap_or(false)
    })
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_chain_entry_used_when_first_misses() {
        let html = Html::parse_document(
            r#"<html><body><h1 class="top-card-layout__title">  Staff
            Engineer </h1></body></html>"#,
        );
        assert_eq!(
            first_text(&html, DETAIL_TITLE).as_deref(),
            Some("Staff Engineer")
        );
    }

    #[test]
    fn missing_everywhere_yields_none() {
        let html = Html::parse_document("<html><body><p>nothing here</p></body></html>");
        assert_eq!(first_text(&html, DETAIL_TITLE), None);
        assert!(!any_present(&html, LOGIN_CHALLENGE));
    }

    #[test]
    fn attr_lookup_skips_empty_values() {
        let html = Html::parse_document(
            r#"<div><img class="ivm-view-attr__img--centered" src="">
               <img class="artdeco-entity-image" src="https://cdn.example/logo.png"></div>"#,
        );
        assert_eq!(
            first_attr(&html, DETAIL_LOGO, "src").as_deref(),
            Some("https://cdn.example/logo.png")
        );
    }

    #[test]
    fn all_texts_stops_at_first_matching_chain_entry() {
        let html = Html::parse_document(
            r#"<div class="job-details-preferences-and-skills__pill">
                 <span class="ui-label">Full-time</span>
               </div>
               <div class="job-details-preferences-and-skills__pill">
                 <span class="ui-label">Remote</span>
               </div>"#,
        );
        assert_eq!(all_texts(&html, DETAIL_PILLS), vec!["Full-time", "Remote"]);
    }
}
