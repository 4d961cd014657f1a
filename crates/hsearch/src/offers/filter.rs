use super::domain::Site;
use super::fields::OfferField;

/// Raw filter parameters as they arrive on the query string.
#[derive(Debug, Clone, Default)]
pub struct OfferFilterParams {
    pub topic: Option<String>,
    pub body: Option<String>,
    pub rooms: Option<String>,
    pub area: Option<String>,
    pub floor: Option<String>,
    pub price: Option<String>,
    pub with_images: Option<String>,
    pub site: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub room_type: Option<String>,
    pub currency: Option<String>,
}

impl OfferFilterParams {
    /// Stores `value` under the filter named `key`; other keys are ignored.
    pub fn set(&mut self, key: &str, value: String) {
        let slot = match key {
            "topic" => &mut self.topic,
            "body" => &mut self.body,
            "rooms" => &mut self.rooms,
            "area" => &mut self.area,
            "floor" => &mut self.floor,
            "price" => &mut self.price,
            "with_images" => &mut self.with_images,
            "site" => &mut self.site,
            "city" => &mut self.city,
            "district" => &mut self.district,
            "room_type" => &mut self.room_type,
            "currency" => &mut self.currency,
            _ => return,
        };
        *slot = Some(value);
    }
}

/// A single predicate over `hsearch_apartment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Case-insensitive substring match.
    Contains { field: OfferField, needle: String },
    EqualsInt { field: OfferField, value: i64 },
    EqualsText { field: OfferField, value: String },
    /// Inclusive on both ends.
    Between { field: OfferField, low: i64, high: i64 },
    HasImages(bool),
    /// Malformed filter values select no rows instead of failing the request.
    Nothing,
}

/// Conjunction of conditions. An empty filter matches every offer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferFilter {
    conditions: Vec<Condition>,
}

impl OfferFilter {
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn from_params(params: &OfferFilterParams) -> Self {
        let mut conditions = Vec::new();

        for (field, raw) in [
            (OfferField::Topic, &params.topic),
            (OfferField::Body, &params.body),
        ] {
            if let Some(needle) = non_blank(raw) {
                conditions.push(Condition::Contains {
                    field,
                    needle: needle.to_string(),
                });
            }
        }

        for (field, raw) in [
            (OfferField::Rooms, &params.rooms),
            (OfferField::Area, &params.area),
            (OfferField::Floor, &params.floor),
            (OfferField::Price, &params.price),
        ] {
            if let Some(raw) = non_blank(raw) {
                conditions.push(int_lookup(field, raw));
            }
        }

        if let Some(raw) = non_blank(&params.with_images) {
            if let Some(flag) = parse_flag(raw) {
                conditions.push(Condition::HasImages(flag));
            }
        }

        if let Some(raw) = non_blank(&params.site) {
            conditions.push(match Site::parse(raw) {
                Some(site) => Condition::EqualsText {
                    field: OfferField::Site,
                    value: site.as_str().to_string(),
                },
                None => Condition::Nothing,
            });
        }

        for (field, raw) in [
            (OfferField::City, &params.city),
            (OfferField::District, &params.district),
            (OfferField::RoomType, &params.room_type),
        ] {
            if let Some(value) = non_blank(raw) {
                conditions.push(Condition::EqualsText {
                    field,
                    value: value.to_string(),
                });
            }
        }

        if let Some(raw) = non_blank(&params.currency) {
            conditions.push(match raw.parse::<i64>() {
                Ok(value) => Condition::EqualsInt {
                    field: OfferField::Currency,
                    value,
                },
                Err(_) => Condition::Nothing,
            });
        }

        Self { conditions }
    }
}

fn non_blank(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

/// `low,high` is an inclusive range, a bare run of digits is an exact match.
fn int_lookup(field: OfferField, raw: &str) -> Condition {
    let parts: Vec<&str> = raw.split(',').collect();
    match parts.as_slice() {
        [low, high] => match (low.trim().parse::<i64>(), high.trim().parse::<i64>()) {
            (Ok(low), Ok(high)) => Condition::Between { field, low, high },
            _ => Condition::Nothing,
        },
        [value] if value.bytes().all(|byte| byte.is_ascii_digit()) => value
            .parse::<i64>()
            .map(|value| Condition::EqualsInt { field, value })
            .unwrap_or(Condition::Nothing),
        _ => Condition::Nothing,
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
