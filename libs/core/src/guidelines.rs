//! Static emergency guideline catalog.
//!
//! Cards are addressed by key (the same string used as their postback payload)
//! and grouped per [`EmergencyCategory`] in a fixed display order.

use std::fmt;
use std::str::FromStr;

/// Postback button attached to a guideline card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardButton {
    pub title: &'static str,
    pub payload: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuidelineCard {
    pub key: &'static str,
    pub title: &'static str,
    pub image_url: &'static str,
    pub item_url: Option<&'static str>,
    pub subtitle: Option<&'static str>,
    pub button: Option<CardButton>,
}

const fn postback_card(
    key: &'static str,
    title: &'static str,
    image_url: &'static str,
    button_title: &'static str,
) -> GuidelineCard {
    GuidelineCard {
        key,
        title,
        image_url,
        item_url: None,
        subtitle: None,
        button: Some(CardButton {
            title: button_title,
            payload: key,
        }),
    }
}

static CARDS: [GuidelineCard; 6] = [
    postback_card(
        "extinguisher_usage",
        "Extinguisher usage",
        "http://www.fireonline.com.au/resources/products/howtooperateanextinguisher.jpg",
        "See instructions",
    ),
    postback_card(
        "first_fire_action",
        "First fire action",
        "http://image.shutterstock.com/z/stock-vector-fire-action-emergency-procedure-do-not-panic-call-fire-brigade-leave-by-nearest-emergency-exit-246972229.jpg",
        "What to do?",
    ),
    postback_card(
        "heimlich_maneuver",
        "Heimlich Maneuver instructions",
        "http://preparednessadvice.com/wp-content/uploads/2016/05/2002_Heimlich.jpg",
        "I need this right now",
    ),
    postback_card(
        "cpr",
        "Adult CPR instruction",
        "https://s-media-cache-ak0.pinimg.com/564x/c1/e7/91/c1e791049ab72ec664a0f8c02362d4c7.jpg",
        "How to do cpr",
    ),
    postback_card(
        "car_accident_first_steps",
        "First steps after car accident",
        "http://thumbnails-visually.netdna-ssl.com/what-to-do-after-a-car-accident_53c65b0b887ca_w1500.png",
        "What should I do?",
    ),
    GuidelineCard {
        key: "crime_stoppers",
        title: "You can report crime quickly!",
        image_url: "http://www.bccrimestoppers.com/images/partner-logos/ccs.jpg",
        item_url: Some("http://www.canadiancrimestoppers.org/home"),
        subtitle: Some("Tap the image to make a report"),
        button: None,
    },
];

/// Looks a card up by key / postback payload.
pub fn card(key: &str) -> Option<&'static GuidelineCard> {
    CARDS.iter().find(|card| card.key == key)
}

pub fn all_cards() -> &'static [GuidelineCard] {
    &CARDS
}

/// Emergency categories produced by the NLU `emergencyType` entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmergencyCategory {
    Fire,
    Medical,
    CarAccident,
    Crime,
}

impl EmergencyCategory {
    pub const ALL: [EmergencyCategory; 4] = [
        EmergencyCategory::Fire,
        EmergencyCategory::Medical,
        EmergencyCategory::CarAccident,
        EmergencyCategory::Crime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyCategory::Fire => "fire",
            EmergencyCategory::Medical => "medical",
            EmergencyCategory::CarAccident => "carAccident",
            EmergencyCategory::Crime => "crime",
        }
    }

    fn card_keys(&self) -> &'static [&'static str] {
        match self {
            EmergencyCategory::Fire => &["extinguisher_usage", "first_fire_action"],
            EmergencyCategory::Medical => &["cpr", "heimlich_maneuver"],
            EmergencyCategory::CarAccident => &["car_accident_first_steps"],
            EmergencyCategory::Crime => &["crime_stoppers"],
        }
    }

    /// Cards for this category in display order.
    pub fn guidelines(&self) -> Vec<&'static GuidelineCard> {
        self.card_keys().iter().filter_map(|key| card(key)).collect()
    }
}

impl fmt::Display for EmergencyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown emergency category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for EmergencyCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmergencyCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
