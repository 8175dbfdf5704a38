use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::errors::ValidationError;
use super::value_objects::{Delivery, Item, OrderId, Payment};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// Header, delivery, payment and items are stored, cached and served as one
// unit. Re-ingesting the same order_uid replaces the whole aggregate.
//
// ============================================================================

/// Fractional-second digits kept for timestamps (PostgreSQL `timestamptz`).
pub const TIMESTAMP_PRECISION: u16 = 6;

/// Cut a timestamp down to what the store can hold.
pub fn store_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(TIMESTAMP_PRECISION)
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    DateTime::<Utc>::deserialize(deserializer).map(store_precision)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub order_uid: OrderId,
    #[serde(default)]
    pub track_number: String,
    #[serde(default)]
    pub entry: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub delivery_service: String,
    #[serde(default, rename = "shardkey")]
    pub shard_key: i64,
    #[serde(default)]
    pub sm_id: i32,
    /// Decoded at store precision so the cached and stored snapshots agree.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub date_created: DateTime<Utc>,

    #[serde(default)]
    pub delivery: Delivery,
    #[serde(default)]
    pub payment: Payment,
    /// Display order is significant and survives storage.
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Order {
    pub fn id(&self) -> OrderId {
        self.order_uid
    }

    /// Check the structural fields the store relies on.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.order_uid.is_nil() {
            return Err(ValidationError::NilOrderId);
        }

        if self.track_number.trim().is_empty() {
            return Err(ValidationError::EmptyField("track_number"));
        }

        let payment = &self.payment;
        for (field, value) in [
            ("payment.amount", payment.amount),
            ("payment.delivery_cost", payment.delivery_cost),
            ("payment.goods_total", payment.goods_total),
            ("payment.custom_fee", payment.custom_fee),
        ] {
            if value < 0 {
                return Err(ValidationError::NegativeAmount { field: field.to_string(), value });
            }
        }

        for (index, item) in self.items.iter().enumerate() {
            if item.price < 0 {
                return Err(ValidationError::NegativeAmount {
                    field: format!("items[{index}].price"),
                    value: item.price,
                });
            }
            if item.total_price < 0 {
                return Err(ValidationError::NegativeAmount {
                    field: format!("items[{index}].total_price"),
                    value: item.total_price,
                });
            }
        }

        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use uuid::Uuid;

    /// A complete order with two items, shared by tests across the crate.
    pub(crate) fn sample_order() -> Order {
        sample_order_with_id(OrderId::from(Uuid::new_v4()))
    }

    pub(crate) fn sample_order_with_id(order_uid: OrderId) -> Order {
        Order {
            order_uid,
            track_number: "WBILMTESTTRACK".to_string(),
            entry: "WBIL".to_string(),
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shard_key: 9,
            sm_id: 99,
            date_created: "2021-11-26T06:22:19Z".parse().unwrap(),
            delivery: Delivery {
                name: "Test Testov".to_string(),
                phone: "+9720000000".to_string(),
                zip: "2639809".to_string(),
                city: "Kiryat Mozkin".to_string(),
                address: "Ploshad Mira 15".to_string(),
                region: "Kraiot".to_string(),
                email: "test@gmail.com".to_string(),
            },
            payment: Payment {
                transaction_id: order_uid.to_string(),
                request_id: String::new(),
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 1817,
                payment_dt: 1637907727,
                bank: "alpha".to_string(),
                delivery_cost: 1500,
                goods_total: 317,
                custom_fee: 0,
            },
            items: vec![
                Item {
                    chrt_id: 9934930,
                    track_number: "WBILMTESTTRACK".to_string(),
                    price: 453,
                    rid: "ab4219087a764ae0btest".to_string(),
                    name: "Mascaras".to_string(),
                    sale: 30,
                    size: "0".to_string(),
                    total_price: 317,
                    nm_id: 2389212,
                    brand: "Vivienne Sabo".to_string(),
                    status: "202".to_string(),
                },
                Item {
                    chrt_id: 9934931,
                    track_number: "WBILMTESTTRACK".to_string(),
                    price: 120,
                    rid: "ab4219087a764ae0btest2".to_string(),
                    name: "Brush".to_string(),
                    sale: 0,
                    size: "0".to_string(),
                    total_price: 120,
                    nm_id: 2389213,
                    brand: "Vivienne Sabo".to_string(),
                    status: "202".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_decode_upstream_payload() {
        let payload = r#"{
            "order_uid": "b563feb7-b2b8-4b6a-9f5d-1e6a0c3b2a11",
            "track_number": "WBILMTESTTRACK",
            "entry": "WBIL",
            "delivery": {"name": "Test Testov", "phone": "+9720000000", "city": "Kiryat Mozkin"},
            "payment": {"transaction_id": "b563feb7", "currency": "USD", "amount": 1817},
            "items": [
                {"chrt_id": 9934930, "price": 453, "name": "Mascaras", "total_price": 317, "status": "202"},
                {"chrt_id": 9934931, "price": 120, "name": "Brush", "total_price": 120, "status": "202"}
            ],
            "locale": "en",
            "customer_id": "test",
            "shardkey": 9,
            "sm_id": 99,
            "date_created": "2021-11-26T06:22:19Z"
        }"#;

        let order: Order = serde_json::from_str(payload).unwrap();

        assert_eq!(order.id().to_string(), "b563feb7-b2b8-4b6a-9f5d-1e6a0c3b2a11");
        assert_eq!(order.shard_key, 9);
        assert_eq!(order.delivery.city, "Kiryat Mozkin");
        assert_eq!(order.payment.amount, 1817);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].name, "Mascaras");
        assert_eq!(order.items[1].name, "Brush");
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_decode_truncates_date_created_to_microseconds() {
        let payload = r#"{
            "order_uid": "b563feb7-b2b8-4b6a-9f5d-1e6a0c3b2a11",
            "track_number": "WBILMTESTTRACK",
            "date_created": "2025-03-01T10:20:02.776251644Z"
        }"#;

        let order: Order = serde_json::from_str(payload).unwrap();

        let expected: DateTime<Utc> = "2025-03-01T10:20:02.776251Z".parse().unwrap();
        assert_eq!(order.date_created, expected);

        // Re-encoding and decoding again is stable
        let again: Order = serde_json::from_slice(&serde_json::to_vec(&order).unwrap()).unwrap();
        assert_eq!(again, order);
    }

    #[test]
    fn test_decode_rejects_malformed_order_uid() {
        let payload = r#"{"order_uid": "nope", "date_created": "2021-11-26T06:22:19Z"}"#;
        assert!(serde_json::from_str::<Order>(payload).is_err());
    }

    #[test]
    fn test_serialized_field_names_match_feed() {
        let order = sample_order();
        let json = serde_json::to_value(&order).unwrap();

        assert_eq!(json["order_uid"], order.order_uid.to_string());
        assert_eq!(json["shardkey"], 9);
        assert_eq!(json["items"][0]["chrt_id"], 9934930);
        assert_eq!(json["payment"]["delivery_cost"], 1500);
    }

    #[test]
    fn test_validate_rejects_nil_id() {
        let order = sample_order_with_id(OrderId::from(Uuid::nil()));
        assert_eq!(order.validate(), Err(ValidationError::NilOrderId));
    }

    #[test]
    fn test_validate_rejects_blank_track_number() {
        let mut order = sample_order();
        order.track_number = "  ".to_string();
        assert_eq!(order.validate(), Err(ValidationError::EmptyField("track_number")));
    }

    #[test]
    fn test_validate_rejects_negative_item_price() {
        let mut order = sample_order();
        order.items[1].price = -1;

        match order.validate() {
            Err(ValidationError::NegativeAmount { field, value }) => {
                assert_eq!(field, "items[1].price");
                assert_eq!(value, -1);
            }
            other => panic!("unexpected validation result: {:?}", other),
        }
    }
}
