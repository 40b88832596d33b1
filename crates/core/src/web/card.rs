use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use super::tiers::{extract_tiers, TierTable};
use crate::templates::parse_placeholder;

static CARD: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".card, article.item-card").expect("valid selector"));
static TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".card-title, h1, h2, h3").expect("valid selector"));
static TYPE_LINE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".card-type").expect("valid selector"));
static DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".card-description").expect("valid selector"));
static STATS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".card-stats li").expect("valid selector"));
static TAGS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".card-tags .tag").expect("valid selector"));
static BONUSES: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".set-bonuses li").expect("valid selector"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CardError {
    #[error("card has no title")]
    MissingTitle,
    #[error("card title {0:?} is an unresolved placeholder")]
    PlaceholderTitle(String),
}

/// Everything read off one card before category-specific shaping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Card {
    pub title: String,
    pub type_line: Option<String>,
    pub description: Option<String>,
    pub stats: Vec<(String, String)>,
    pub tags: Vec<String>,
    pub bonuses: Vec<String>,
    pub tiers: Option<TierTable>,
}

/// Card elements in document order. A document without card markup counts
/// as a single card rooted at the document element.
pub fn extract_cards(document: &Html) -> Vec<ElementRef<'_>> {
    let cards: Vec<_> = document
        .select(&CARD)
        .filter(|el| !has_card_ancestor(*el))
        .collect();
    if cards.is_empty() {
        vec![document.root_element()]
    } else {
        cards
    }
}

fn has_card_ancestor(el: ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| CARD.matches(&ancestor))
}

pub fn read_card(el: ElementRef<'_>) -> Result<Card, CardError> {
    let title = first_text(el, &TITLE).ok_or(CardError::MissingTitle)?;
    if parse_placeholder(&title).is_some() {
        return Err(CardError::PlaceholderTitle(title));
    }
    let stats = el
        .select(&STATS)
        .filter_map(|li| {
            let line = text_of(li);
            let (key, value) = line.split_once(':')?;
            let (key, value) = (key.trim(), value.trim());
            (!key.is_empty() && !value.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect();
    Ok(Card {
        title,
        type_line: first_text(el, &TYPE_LINE),
        description: first_text(el, &DESCRIPTION),
        stats,
        tags: all_text(el, &TAGS),
        bonuses: all_text(el, &BONUSES),
        tiers: extract_tiers(el).map(|(table, _)| table),
    })
}

/// Whitespace-collapsed text content.
pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(el: ElementRef<'_>, selector: &Selector) -> Option<String> {
    el.select(selector).map(text_of).find(|text| !text.is_empty())
}

fn all_text(el: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    el.select(selector)
        .map(text_of)
        .filter(|text| !text.is_empty())
        .collect()
}
