use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// GraphQL sends `null` for empty lists; treat it like a missing field.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Ids arrive as `"77"` or `77` depending on the endpoint.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Whole pesos; a fractional part is dropped.
fn whole_pesos(value: f64) -> u64 {
    value.trunc() as u64
}

/// Response of the `suggestionProducts` persisted query.
#[derive(Debug, Default, Deserialize)]
pub struct SuggestionResponse {
    #[serde(default)]
    pub data: Option<SuggestionData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionData {
    #[serde(rename = "suggestionProducts", default)]
    pub suggestion_products: Option<SuggestionProducts>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionProducts {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub products: Vec<VtexProduct>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<VtexProduct>,
}

impl SuggestionResponse {
    /// Products, whichever list the search app filled in.
    pub fn into_products(self) -> Vec<VtexProduct> {
        let Some(found) = self.data.and_then(|d| d.suggestion_products) else {
            return Vec::new();
        };
        if found.products.is_empty() {
            found.items
        } else {
            found.products
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VtexProduct {
    #[serde(default, deserialize_with = "string_or_number")]
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub name: Option<String>,
    pub link_text: Option<String>,
    pub slug: Option<String>,
    pub url: Option<String>,
    pub price: Option<f64>,
    pub selling_price: Option<f64>,
    pub best_price: Option<f64>,
    pub available: Option<bool>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<VtexItem>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<VtexImage>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sellers: Vec<VtexSeller>,
}

impl VtexProduct {
    pub fn title(&self) -> Option<&str> {
        self.product_name
            .as_deref()
            .or(self.name.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Storefront slug used to build the `/<slug>/p` product URL.
    pub fn slug(&self) -> Option<&str> {
        self.link_text
            .as_deref()
            .or(self.slug.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// SKU of the first item, falling back to the product id.
    pub fn sku(&self) -> Option<String> {
        self.items
            .first()
            .and_then(|i| i.item_id.clone())
            .or_else(|| self.product_id.clone())
            .filter(|s| !s.is_empty())
    }

    pub fn image_url(&self) -> Option<&str> {
        self.items
            .first()
            .and_then(|i| i.images.first())
            .or_else(|| self.images.first())
            .and_then(VtexImage::location)
    }

    /// Price when the suggestion payload carries one.
    pub fn price(&self) -> Option<u64> {
        [self.price, self.selling_price, self.best_price]
            .into_iter()
            .flatten()
            .chain(first_offer(&self.sellers).and_then(|o| o.price))
            .chain(
                self.items
                    .first()
                    .and_then(|i| first_offer(&i.sellers))
                    .and_then(|o| o.price),
            )
            .find(|v| *v > 0.0)
            .map(whole_pesos)
    }

    pub fn availability(&self) -> Option<bool> {
        self.available.or_else(|| {
            first_offer(&self.sellers)
                .or_else(|| self.items.first().and_then(|i| first_offer(&i.sellers)))
                .and_then(|o| o.available_quantity)
                .map(|q| q > 0.0)
        })
    }
}

fn first_offer(sellers: &[VtexSeller]) -> Option<&CommertialOffer> {
    sellers.first().and_then(|s| s.commertial_offer.as_ref())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VtexItem {
    #[serde(default, deserialize_with = "string_or_number")]
    pub item_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<VtexImage>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sellers: Vec<VtexSeller>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VtexImage {
    pub image_url: Option<String>,
    pub url: Option<String>,
}

impl VtexImage {
    fn location(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .or(self.url.as_deref())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct VtexSeller {
    // VTEX spells it this way
    #[serde(rename = "commertialOffer")]
    pub commertial_offer: Option<CommertialOffer>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommertialOffer {
    #[serde(rename = "Price", alias = "price")]
    pub price: Option<f64>,
    #[serde(rename = "AvailableQuantity")]
    pub available_quantity: Option<f64>,
}

/// One product of the catalog search endpoint used for SKU pricing.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogProduct {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<VtexItem>,
}

impl CatalogProduct {
    pub fn price(&self) -> Option<u64> {
        self.items
            .first()
            .and_then(|i| first_offer(&i.sellers))
            .and_then(|o| o.price)
            .filter(|v| *v > 0.0)
            .map(whole_pesos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_lists_and_numeric_ids_are_accepted() {
        let body = r#"{"data":{"suggestionProducts":{"products":[
            {"productId":77,"productName":"Lápiz Grafito HB","linkText":"lapiz-grafito-hb",
             "items":null,"images":null,"sellers":null},
            {"productId":"78","productName":"Goma Miga","linkText":"goma-miga",
             "items":[{"itemId":1201,"images":null,"sellers":null}]}
        ],"items":null}}}"#;
        let products = serde_json::from_str::<SuggestionResponse>(body)
            .unwrap()
            .into_products();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].sku().as_deref(), Some("77"));
        assert!(products[0].items.is_empty());
        assert_eq!(products[0].price(), None);
        assert_eq!(products[1].sku().as_deref(), Some("1201"));
        assert_eq!(products[1].image_url(), None);
    }

    #[test]
    fn catalog_price_drops_the_fraction() {
        let body = r#"[{"items":[{"itemId":"1201","sellers":[
            {"commertialOffer":{"Price":1990.9,"AvailableQuantity":3}}]}]}]"#;
        let products: Vec<CatalogProduct> = serde_json::from_str(body).unwrap();
        assert_eq!(products[0].price(), Some(1990));

        let empty: Vec<CatalogProduct> = serde_json::from_str(r#"[{"items":null}]"#).unwrap();
        assert_eq!(empty[0].price(), None);
    }
}
