use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::warn;
use url::Url;

use crate::price;

/// One catalog item, extracted from a single card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub title: String,
    pub price_raw: String,
    pub price_value: Option<f64>,
    pub stock: String,
    pub url: String,
}

/// What to do with a card that is missing an expected sub-element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingCard {
    /// Log a warning, drop the card, keep going (default).
    Skip,
    /// Abort extraction of the whole page.
    Fail,
}

/// CSS entry points into the catalog markup. Injected into the extractor so
/// structural drift on the source site stays a configuration change.
pub struct Selectors {
    pub card: Selector,
    pub title_link: Selector,
    pub price: Selector,
    pub stock: Selector,
    pub next_link: Selector,
}

impl Selectors {
    /// Selectors for the Books to Scrape catalog markup (the CLI default).
    pub fn books_to_scrape() -> Self {
        Self::from_css(
            "article.product_pod",
            "h3 a",
            ".price_color",
            ".instock.availability",
            "li.next a",
        )
        .expect("built-in selectors parse")
    }

    pub fn from_css(
        card: &str,
        title_link: &str,
        price: &str,
        stock: &str,
        next_link: &str,
    ) -> Result<Self> {
        Ok(Self {
            card: parse_selector(card)?,
            title_link: parse_selector(title_link)?,
            price: parse_selector(price)?,
            stock: parse_selector(stock)?,
            next_link: parse_selector(next_link)?,
        })
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {:?}: {}", css, e))
}

/// Extract every card on a page, in document order, plus the next-page URL.
///
/// Records are filtered by `max_price` when one is given: a record whose
/// price failed to normalize can never satisfy the comparison and is
/// excluded. An absent next-link means the pagination chain has ended.
pub fn extract_page(
    markup: &str,
    page_url: &str,
    selectors: &Selectors,
    max_price: Option<f64>,
    on_missing: MissingCard,
) -> Result<(Vec<Record>, Option<String>)> {
    let doc = Html::parse_document(markup);
    let base = Url::parse(page_url)
        .map_err(|e| anyhow!("page URL {:?} is not absolute: {}", page_url, e))?;

    let mut records = Vec::new();
    for card in doc.select(&selectors.card) {
        match extract_card(&card, &base, selectors) {
            Ok(record) => {
                let keep = match (max_price, record.price_value) {
                    (None, _) => true,
                    (Some(max), Some(value)) => value <= max,
                    (Some(_), None) => false,
                };
                if keep {
                    records.push(record);
                }
            }
            Err(e) => match on_missing {
                MissingCard::Skip => warn!("skipping card on {}: {}", page_url, e),
                MissingCard::Fail => return Err(e),
            },
        }
    }

    let next_url = doc
        .select(&selectors.next_link)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| base.join(href).ok())
        .map(String::from);

    Ok((records, next_url))
}

fn extract_card(card: &ElementRef, base: &Url, selectors: &Selectors) -> Result<Record> {
    let anchor = card
        .select(&selectors.title_link)
        .next()
        .ok_or_else(|| anyhow!("card has no title anchor"))?;
    // A missing title attribute is a data-quality wart, not a structural break.
    let title = anchor.value().attr("title").unwrap_or_default().trim().to_string();

    let price_el = card
        .select(&selectors.price)
        .next()
        .ok_or_else(|| anyhow!("card has no price element"))?;
    let price_raw = price::repair_mojibake(&element_text(&price_el));

    let stock_el = card
        .select(&selectors.stock)
        .next()
        .ok_or_else(|| anyhow!("card has no availability element"))?;
    let stock = element_text(&stock_el);

    let href = anchor.value().attr("href").unwrap_or_default();
    let url = String::from(
        base.join(href)
            .map_err(|e| anyhow!("card link {:?} does not resolve: {}", href, e))?,
    );

    let price_value = price::normalize_price(&price_raw);

    Ok(Record {
        title,
        price_raw,
        price_value,
        stock,
        url,
    })
}

/// Text content of an element with runs of whitespace collapsed.
fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://example.com/catalogue/page-1.html";

    fn card(title: &str, price: &str, stock: &str, href: &str) -> String {
        format!(
            r#"<article class="product_pod">
                 <h3><a href="{href}" title="{title}">{title}</a></h3>
                 <div class="product_price">
                   <p class="price_color">{price}</p>
                   <p class="instock availability"><i class="icon-ok"></i> {stock} </p>
                 </div>
               </article>"#
        )
    }

    fn page(cards: &[String], next_href: Option<&str>) -> String {
        let pager = next_href
            .map(|h| format!(r#"<ul class="pager"><li class="next"><a href="{h}">next</a></li></ul>"#))
            .unwrap_or_default();
        format!("<html><body><section>{}{}</section></body></html>", cards.concat(), pager)
    }

    fn extract(markup: &str, max_price: Option<f64>) -> (Vec<Record>, Option<String>) {
        extract_page(markup, PAGE_URL, &Selectors::books_to_scrape(), max_price, MissingCard::Skip)
            .unwrap()
    }

    #[test]
    fn cards_come_out_in_document_order() {
        let markup = page(
            &[
                card("First", "£10.00", "In stock", "item_1/index.html"),
                card("Second", "£20.00", "In stock", "item_2/index.html"),
                card("Third", "£30.00", "In stock", "item_3/index.html"),
            ],
            None,
        );
        let (records, _) = extract(&markup, None);
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["First", "Second", "Third"]);
    }

    #[test]
    fn relative_href_resolves_against_page_url() {
        let markup = page(&[card("A", "£5.00", "In stock", "item_1/index.html")], None);
        let (records, _) = extract(&markup, None);
        assert_eq!(records[0].url, "https://example.com/catalogue/item_1/index.html");
    }

    #[test]
    fn scheme_relative_and_absolute_hrefs_resolve() {
        let markup = page(
            &[
                card("A", "£5.00", "In stock", "//cdn.example.net/item/1"),
                card("B", "£5.00", "In stock", "https://other.example.org/item/2"),
            ],
            None,
        );
        let (records, _) = extract(&markup, None);
        assert_eq!(records[0].url, "https://cdn.example.net/item/1");
        assert_eq!(records[1].url, "https://other.example.org/item/2");
    }

    #[test]
    fn filter_keeps_records_at_or_below_max() {
        let markup = page(
            &[
                card("Cheap", "£10.00", "In stock", "a"),
                card("Edge", "£20.00", "In stock", "b"),
                card("Pricey", "£25.50", "In stock", "c"),
            ],
            None,
        );
        let (records, _) = extract(&markup, Some(20.0));
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["Cheap", "Edge"]);
    }

    #[test]
    fn unparseable_price_excluded_only_under_filter() {
        let markup = page(&[card("Odd", "N/A", "In stock", "a")], None);

        let (unfiltered, _) = extract(&markup, None);
        assert_eq!(unfiltered.len(), 1);
        assert_eq!(unfiltered[0].price_value, None);

        let (filtered, _) = extract(&markup, Some(100.0));
        assert!(filtered.is_empty());
    }

    #[test]
    fn extraction_is_idempotent() {
        let markup = page(
            &[card("A", "£10.00", "In stock", "a"), card("B", "£99.00", "In stock", "b")],
            Some("page-2.html"),
        );
        assert_eq!(extract(&markup, Some(50.0)), extract(&markup, Some(50.0)));
    }

    #[test]
    fn next_link_resolves_against_page_url() {
        let markup = page(&[], Some("page-2.html"));
        let (_, next) = extract(&markup, None);
        assert_eq!(next.as_deref(), Some("https://example.com/catalogue/page-2.html"));
    }

    #[test]
    fn absent_next_link_ends_pagination() {
        let markup = page(&[card("A", "£5.00", "In stock", "a")], None);
        let (_, next) = extract(&markup, None);
        assert_eq!(next, None);
    }

    #[test]
    fn missing_title_attribute_yields_empty_title() {
        let markup = page(
            &[r#"<article class="product_pod">
                   <h3><a href="item/index.html">linked text</a></h3>
                   <p class="price_color">£9.99</p>
                   <p class="instock availability">In stock</p>
                 </article>"#
                .to_string()],
            None,
        );
        let (records, _) = extract(&markup, None);
        assert_eq!(records[0].title, "");
        assert_eq!(records[0].price_value, Some(9.99));
    }

    #[test]
    fn card_without_price_is_skipped_by_default() {
        let markup = page(
            &[
                r#"<article class="product_pod">
                     <h3><a href="broken" title="Broken">Broken</a></h3>
                     <p class="instock availability">In stock</p>
                   </article>"#
                    .to_string(),
                card("Intact", "£12.00", "In stock", "ok"),
            ],
            None,
        );
        let (records, _) = extract(&markup, None);
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["Intact"]);
    }

    #[test]
    fn card_without_stock_fails_in_strict_mode() {
        let markup = page(
            &[r#"<article class="product_pod">
                   <h3><a href="broken" title="Broken">Broken</a></h3>
                   <p class="price_color">£9.99</p>
                 </article>"#
                .to_string()],
            None,
        );
        let err = extract_page(
            &markup,
            PAGE_URL,
            &Selectors::books_to_scrape(),
            None,
            MissingCard::Fail,
        )
        .unwrap_err();
        assert!(err.to_string().contains("availability"));
    }

    #[test]
    fn mojibake_pound_repaired_in_price_raw() {
        let markup = page(&[card("A", "Â£51.77", "In stock", "a")], None);
        let (records, _) = extract(&markup, None);
        assert_eq!(records[0].price_raw, "£51.77");
        assert_eq!(records[0].price_value, Some(51.77));
    }

    #[test]
    fn stock_text_is_collapsed() {
        let markup = page(&[card("A", "£5.00", "In stock (22 available)", "a")], None);
        let (records, _) = extract(&markup, None);
        assert_eq!(records[0].stock, "In stock (22 available)");
    }
}
