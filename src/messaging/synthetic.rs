use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use crate::domain::order::{store_precision, Delivery, Item, Order, OrderId, Payment};

/// A plausible order with random amounts and a single item.
///
/// `sequence` only shapes the track number (`TESTTRACK-000042`); the id is a
/// fresh time-ordered UUID.
pub fn synthetic_order(sequence: u64, rng: &mut impl Rng) -> Order {
    let uid = Uuid::now_v7();
    let price = rng.gen_range(100..5_000);
    let delivery_cost = rng.gen_range(0..1_500);

    Order {
        order_uid: OrderId::from(uid),
        track_number: format!("TESTTRACK-{sequence:06}"),
        entry: "WBIL".to_string(),
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "emitter".to_string(),
        delivery_service: "meest".to_string(),
        shard_key: rng.gen_range(0..1_000),
        sm_id: rng.gen_range(0..1_000),
        date_created: store_precision(Utc::now()),
        delivery: Delivery {
            name: "Load Gen".to_string(),
            phone: "+100000000".to_string(),
            city: "Rust City".to_string(),
            address: "Benchmark str. 1".to_string(),
            ..Delivery::default()
        },
        payment: Payment {
            transaction_id: uid.to_string(),
            currency: "USD".to_string(),
            provider: "emitter-pay".to_string(),
            amount: price + delivery_cost,
            payment_dt: Utc::now().timestamp(),
            delivery_cost,
            goods_total: price,
            ..Payment::default()
        },
        items: vec![Item {
            chrt_id: rng.gen_range(0..10_000_000),
            track_number: "TESTTRACK".to_string(),
            price,
            name: "DemoItem".to_string(),
            total_price: price,
            nm_id: rng.gen_range(0..10_000_000),
            brand: "EmitterCo".to_string(),
            status: "202".to_string(),
            ..Item::default()
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_orders_pass_validation() {
        let mut rng = rand::thread_rng();
        for sequence in 0..50 {
            let order = synthetic_order(sequence, &mut rng);
            assert!(order.validate().is_ok());
            assert_eq!(order.items.len(), 1);
            assert_eq!(order.payment.amount, order.payment.goods_total + order.payment.delivery_cost);
        }
    }

    #[test]
    fn test_track_number_is_zero_padded() {
        let order = synthetic_order(42, &mut rand::thread_rng());
        assert_eq!(order.track_number, "TESTTRACK-000042");
    }

    #[test]
    fn test_date_created_survives_json_round_trip() {
        let order = synthetic_order(7, &mut rand::thread_rng());
        let decoded: Order = serde_json::from_slice(&serde_json::to_vec(&order).unwrap()).unwrap();

        assert_eq!(decoded, order);
        assert_eq!(order.date_created.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut rng = rand::thread_rng();
        let a = synthetic_order(0, &mut rng);
        let b = synthetic_order(0, &mut rng);
        assert_ne!(a.id(), b.id());
    }
}
