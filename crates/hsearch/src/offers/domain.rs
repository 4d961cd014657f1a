use chrono::{DateTime, Utc};

/// Listing sites the scrapers pull offers from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Site {
    #[default]
    Diesel,
    Lalafo,
    House,
}

impl Site {
    pub const ALL: [Self; 3] = [Self::Diesel, Self::Lalafo, Self::House];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Diesel => "diesel",
            Self::Lalafo => "lalafo",
            Self::House => "house",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|site| site.as_str() == raw)
    }
}

/// A scraped apartment listing.
///
/// Rows loaded through a projection only carry the requested columns; every
/// other attribute keeps its `Default` value and must not be read back out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Offer {
    pub id: i64,
    pub external_id: i64,
    pub url: String,
    pub topic: String,
    pub phone: String,
    pub rooms: i64,
    pub body: String,
    /// Number of stored images. Maintained by every store write that touches images.
    pub images_count: i64,
    pub price: i64,
    /// 0 = unknown, 1 = USD, 2 = KGS.
    pub currency: i64,
    pub area: i64,
    pub city: String,
    pub room_type: String,
    pub site: Site,
    pub floor: i64,
    pub max_floor: i64,
    pub district: String,
    pub lat: f64,
    pub lon: f64,
    pub created: DateTime<Utc>,
}

/// A picture attached to an offer. `path` is unique across the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    pub id: i64,
    pub apartment_id: i64,
    pub path: String,
    pub created: DateTime<Utc>,
}

/// Payload for writing an offer together with its image paths.
#[derive(Debug, Clone, Default)]
pub struct NewOffer {
    pub external_id: i64,
    pub site: Site,
    pub url: String,
    pub topic: String,
    pub phone: String,
    pub rooms: i64,
    pub body: String,
    pub price: i64,
    pub currency: i64,
    pub area: i64,
    pub city: String,
    pub room_type: String,
    pub floor: i64,
    pub max_floor: i64,
    pub district: String,
    pub lat: f64,
    pub lon: f64,
    /// Defaults to the time of the write.
    pub created: Option<DateTime<Utc>>,
    pub images: Vec<String>,
}

/// Converts a stored Unix timestamp into the datetime exposed by the API.
pub(crate) fn from_epoch(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
}
