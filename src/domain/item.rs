//! Catalog Item Entity
//!
//! A single catalog entry plus the validated create input and the typed
//! decode from a store record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::{CatalogError, CatalogResult, DecodeSkip};

/// Field names used in store records
pub mod fields {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const PRICE: &str = "price";
    pub const IMAGE_URL: &str = "imageURL";
    pub const IS_FAVORITE: &str = "isFavorite";
}

/// A catalog item as seen by the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Store key. Empty until the store assigns one.
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    #[serde(rename = "imageURL")]
    pub image_url: String,
    #[serde(rename = "isFavorite")]
    pub is_favorite: bool,
}

impl CatalogItem {
    /// Decode a store record and attach its key as `id`.
    ///
    /// Every one of `name`, `description`, `price`, `imageURL` and
    /// `isFavorite` must be present with the right JSON type. Any `id` field
    /// inside the record is ignored; the store key wins.
    pub fn from_record(key: &str, record: &Value) -> Result<Self, DecodeSkip> {
        let obj = record.as_object().ok_or(DecodeSkip::NotAnObject)?;

        let price = obj
            .get(fields::PRICE)
            .and_then(Value::as_f64)
            .ok_or(DecodeSkip::MissingField(fields::PRICE))?;
        if !price.is_finite() || price < 0.0 {
            return Err(DecodeSkip::InvalidField(fields::PRICE));
        }

        Ok(Self {
            id: key.to_string(),
            name: str_field(obj, fields::NAME)?,
            description: str_field(obj, fields::DESCRIPTION)?,
            price,
            image_url: str_field(obj, fields::IMAGE_URL)?,
            is_favorite: obj
                .get(fields::IS_FAVORITE)
                .and_then(Value::as_bool)
                .ok_or(DecodeSkip::MissingField(fields::IS_FAVORITE))?,
        })
    }

    pub fn toggle_favorite(&mut self) {
        self.is_favorite = !self.is_favorite;
    }

    /// Price as shown in the grid cell and on the detail screen
    pub fn display_price(&self) -> String {
        format!("${:.2}", self.price)
    }
}

fn str_field(obj: &Map<String, Value>, name: &'static str) -> Result<String, DecodeSkip> {
    obj.get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(DecodeSkip::MissingField(name))
}

/// Validated input for a new catalog item
#[derive(Debug, Clone, PartialEq)]
pub struct NewCatalogItem {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image_url: String,
}

impl NewCatalogItem {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        price: f64,
        image_url: impl Into<String>,
    ) -> CatalogResult<Self> {
        let item = Self {
            name: name.into(),
            description: description.into(),
            price,
            image_url: image_url.into(),
        };
        item.validate()?;
        Ok(item)
    }

    /// Build from the raw text of the "add item" form.
    pub fn from_form(
        name: &str,
        description: &str,
        price: &str,
        image_url: &str,
    ) -> CatalogResult<Self> {
        let price = parse_price(price)?;
        Self::new(name.trim(), description.trim(), price, image_url.trim())
    }

    fn validate(&self) -> CatalogResult<()> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::invalid("name is empty"));
        }
        if self.description.trim().is_empty() {
            return Err(CatalogError::invalid("description is empty"));
        }
        if self.image_url.trim().is_empty() {
            return Err(CatalogError::invalid("image URL is empty"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(CatalogError::invalid(format!(
                "price must be a non-negative number, got {}",
                self.price
            )));
        }
        Ok(())
    }

    /// Store record for this item. New items are never favorites.
    pub fn to_record(&self, record_id: Uuid) -> Value {
        let mut record = Map::new();
        record.insert(fields::ID.into(), Value::from(record_id.to_string()));
        record.insert(fields::NAME.into(), Value::from(self.name.clone()));
        record.insert(fields::DESCRIPTION.into(), Value::from(self.description.clone()));
        record.insert(fields::PRICE.into(), Value::from(self.price));
        record.insert(fields::IMAGE_URL.into(), Value::from(self.image_url.clone()));
        record.insert(fields::IS_FAVORITE.into(), Value::from(false));
        Value::Object(record)
    }
}

/// Parse a price typed into a form field
pub fn parse_price(text: &str) -> CatalogResult<f64> {
    let price: f64 = text
        .trim()
        .parse()
        .map_err(|_| CatalogError::invalid(format!("price `{}` is not a number", text)))?;
    if !price.is_finite() || price < 0.0 {
        return Err(CatalogError::invalid(format!(
            "price must be a non-negative number, got {}",
            text
        )));
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ring_record() -> Value {
        json!({
            "id": "client-side-uuid",
            "name": "Ring",
            "description": "Gold band",
            "price": 199.99,
            "imageURL": "http://x/img.png",
            "isFavorite": false
        })
    }

    #[test]
    fn test_decode_uses_store_key() {
        let item = CatalogItem::from_record("abc123", &ring_record()).unwrap();
        assert_eq!(item.id, "abc123");
        assert_eq!(item.name, "Ring");
        assert_eq!(item.price, 199.99);
        assert!(!item.is_favorite);
    }

    #[test]
    fn test_decode_accepts_integer_price() {
        let mut record = ring_record();
        record["price"] = json!(200);
        let item = CatalogItem::from_record("k", &record).unwrap();
        assert_eq!(item.price, 200.0);
    }

    #[test]
    fn test_decode_skips_each_missing_field() {
        for field in ["name", "description", "price", "imageURL", "isFavorite"] {
            let mut record = ring_record();
            record.as_object_mut().unwrap().remove(field);
            assert!(
                matches!(
                    CatalogItem::from_record("k", &record),
                    Err(DecodeSkip::MissingField(f)) if f == field
                ),
                "field {field}"
            );
        }
    }

    #[test]
    fn test_decode_skips_mistyped_and_non_object() {
        let mut record = ring_record();
        record["isFavorite"] = json!("yes");
        assert!(CatalogItem::from_record("k", &record).is_err());

        let mut record = ring_record();
        record["price"] = json!(-1.0);
        assert_eq!(
            CatalogItem::from_record("k", &record),
            Err(DecodeSkip::InvalidField("price"))
        );

        assert_eq!(
            CatalogItem::from_record("k", &json!("just a string")),
            Err(DecodeSkip::NotAnObject)
        );
    }

    #[test]
    fn test_new_item_validation() {
        assert!(NewCatalogItem::new("Ring", "Gold band", 199.99, "http://x/img.png").is_ok());
        assert!(NewCatalogItem::new("Ring", "Gold band", 0.0, "http://x/img.png").is_ok());

        for bad in [
            NewCatalogItem::new("", "Gold band", 1.0, "http://x"),
            NewCatalogItem::new("Ring", "  ", 1.0, "http://x"),
            NewCatalogItem::new("Ring", "Gold band", 1.0, ""),
            NewCatalogItem::new("Ring", "Gold band", -0.5, "http://x"),
            NewCatalogItem::new("Ring", "Gold band", f64::NAN, "http://x"),
        ] {
            assert!(matches!(bad, Err(CatalogError::InvalidInput(_))));
        }
    }

    #[test]
    fn test_from_form_parses_price() {
        let item = NewCatalogItem::from_form(" Ring ", "Gold band", "49.5", "http://x").unwrap();
        assert_eq!(item.name, "Ring");
        assert_eq!(item.price, 49.5);

        assert!(matches!(
            NewCatalogItem::from_form("Ring", "Gold band", "cheap", "http://x"),
            Err(CatalogError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_record_round_trips_through_decode() {
        let new_item = NewCatalogItem::new("Ring", "Gold band", 199.99, "http://x/img.png").unwrap();
        let record = new_item.to_record(Uuid::new_v4());
        assert!(record["id"].is_string());

        let item = CatalogItem::from_record("key1", &record).unwrap();
        assert_eq!(item.name, new_item.name);
        assert!(!item.is_favorite);
    }

    #[test]
    fn test_toggle_and_display_price() {
        let mut item = CatalogItem::from_record("k", &ring_record()).unwrap();
        item.toggle_favorite();
        assert!(item.is_favorite);
        item.toggle_favorite();
        assert!(!item.is_favorite);
        assert_eq!(item.display_price(), "$199.99");
    }
}
