//! Field allow-lists for offers and their images.
//!
//! Callers address attributes by name (`fields=id,topic,images__path`,
//! `order=-price`). Only names declared here are ever projected, sorted on or
//! emitted; each enum maps its variants to a column and to a JSON accessor.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::domain::{Image, Offer};

/// Joins a relation name and a field of the related entity (`images__path`).
pub const RELATION_SEPARATOR: &str = "__";

/// Offer attributes callers may request, sort on or filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OfferField {
    Id,
    Url,
    Topic,
    Phone,
    Rooms,
    Body,
    ImagesCount,
    Price,
    Currency,
    Area,
    City,
    RoomType,
    Site,
    Floor,
    District,
    Created,
}

impl OfferField {
    pub const ALL: [Self; 16] = [
        Self::Id,
        Self::Url,
        Self::Topic,
        Self::Phone,
        Self::Rooms,
        Self::Body,
        Self::ImagesCount,
        Self::Price,
        Self::Currency,
        Self::Area,
        Self::City,
        Self::RoomType,
        Self::Site,
        Self::Floor,
        Self::District,
        Self::Created,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Url => "url",
            Self::Topic => "topic",
            Self::Phone => "phone",
            Self::Rooms => "rooms",
            Self::Body => "body",
            Self::ImagesCount => "images_count",
            Self::Price => "price",
            Self::Currency => "currency",
            Self::Area => "area",
            Self::City => "city",
            Self::RoomType => "room_type",
            Self::Site => "site",
            Self::Floor => "floor",
            Self::District => "district",
            Self::Created => "created",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    /// Column backing the field in `hsearch_apartment`.
    pub const fn column(self) -> &'static str {
        self.name()
    }

    /// Comma separated allow-list, used in error messages.
    pub fn allowed_names() -> String {
        Self::ALL.map(Self::name).join(", ")
    }

    pub fn value_of(self, offer: &Offer) -> Value {
        match self {
            Self::Id => Value::from(offer.id),
            Self::Url => Value::from(offer.url.as_str()),
            Self::Topic => Value::from(offer.topic.as_str()),
            Self::Phone => Value::from(offer.phone.as_str()),
            Self::Rooms => Value::from(offer.rooms),
            Self::Body => Value::from(offer.body.as_str()),
            Self::ImagesCount => Value::from(offer.images_count),
            Self::Price => Value::from(offer.price),
            Self::Currency => Value::from(offer.currency),
            Self::Area => Value::from(offer.area),
            Self::City => Value::from(offer.city.as_str()),
            Self::RoomType => Value::from(offer.room_type.as_str()),
            Self::Site => Value::from(offer.site.as_str()),
            Self::Floor => Value::from(offer.floor),
            Self::District => Value::from(offer.district.as_str()),
            Self::Created => datetime_value(&offer.created),
        }
    }
}

/// Image attributes reachable through the `images` relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageField {
    ApartmentId,
    Path,
    Created,
}

impl ImageField {
    pub const ALL: [Self; 3] = [Self::ApartmentId, Self::Path, Self::Created];

    pub const fn name(self) -> &'static str {
        match self {
            Self::ApartmentId => "apartment_id",
            Self::Path => "path",
            Self::Created => "created",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    pub const fn column(self) -> &'static str {
        self.name()
    }

    pub fn value_of(self, image: &Image) -> Value {
        match self {
            Self::ApartmentId => Value::from(image.apartment_id),
            Self::Path => Value::from(image.path.as_str()),
            Self::Created => datetime_value(&image.created),
        }
    }
}

/// One-to-many relations of an offer that can be prefetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relation {
    Images,
}

impl Relation {
    pub const ALL: [Self; 1] = [Self::Images];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Images => "images",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|relation| relation.name() == name)
    }
}

fn parse_relation_field(name: &str) -> Option<(Relation, ImageField)> {
    let (relation, field) = name.split_once(RELATION_SEPARATOR)?;
    Some((Relation::parse(relation)?, ImageField::parse(field)?))
}

fn datetime_value(value: &DateTime<Utc>) -> Value {
    Value::from(value.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// The resolved answer to a `fields` parameter.
///
/// Unknown names are dropped. Image fields apply to every requested relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelection {
    offer_fields: BTreeSet<OfferField>,
    relations: BTreeSet<Relation>,
    image_fields: BTreeSet<ImageField>,
}

impl FieldSelection {
    /// All offer fields plus all relation fields.
    pub fn everything() -> Self {
        Self {
            offer_fields: OfferField::ALL.into_iter().collect(),
            relations: Relation::ALL.into_iter().collect(),
            image_fields: ImageField::ALL.into_iter().collect(),
        }
    }

    /// Resolves a raw comma separated list. A missing or blank list means everything.
    pub fn resolve(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Self::everything();
        };

        let mut selection = Self {
            offer_fields: BTreeSet::new(),
            relations: BTreeSet::new(),
            image_fields: BTreeSet::new(),
        };

        for name in raw.split(',').map(str::trim) {
            if let Some(field) = OfferField::parse(name) {
                selection.offer_fields.insert(field);
            } else if let Some((relation, field)) = parse_relation_field(name) {
                selection.relations.insert(relation);
                selection.image_fields.insert(field);
            }
        }

        selection
    }

    pub fn offer_fields(&self) -> Vec<OfferField> {
        self.offer_fields.iter().copied().collect()
    }

    pub fn image_fields(&self) -> Vec<ImageField> {
        self.image_fields.iter().copied().collect()
    }

    pub fn wants_relation(&self, relation: Relation) -> bool {
        self.relations.contains(&relation)
    }

    /// Builds the JSON object for one offer. `images` must already be grouped
    /// by `apartment_id`; offers missing from the map get an empty list.
    pub fn shape(&self, offer: &Offer, images: &HashMap<i64, Vec<Image>>) -> Map<String, Value> {
        let mut object = Map::new();
        for field in &self.offer_fields {
            object.insert(field.name().to_string(), field.value_of(offer));
        }

        for relation in &self.relations {
            let related = match relation {
                Relation::Images => images.get(&offer.id).map(Vec::as_slice).unwrap_or_default(),
            };
            let items = related
                .iter()
                .map(|image| {
                    let mut item = Map::new();
                    for field in &self.image_fields {
                        item.insert(field.name().to_string(), field.value_of(image));
                    }
                    Value::Object(item)
                })
                .collect();
            object.insert(relation.name().to_string(), Value::Array(items));
        }

        object
    }
}
