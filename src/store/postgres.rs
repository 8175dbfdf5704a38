use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder, Transaction};
use std::time::Duration;
use uuid::Uuid;

use super::{OrderStore, StoreError};
use crate::domain::order::{Delivery, Item, Order, OrderId, Payment};

// ============================================================================
// PostgreSQL Order Store
// ============================================================================
//
// Four tables keyed by order_uid: orders, deliveries, payments, items.
//
// - save: one transaction, ON CONFLICT upserts for the 1:1 parts and a
//   wholesale replace of the item list, so redelivery never conflicts and
//   never duplicates items.
// - find: one REPEATABLE READ snapshot across all four reads.
//
// ============================================================================

pub async fn connect(dsn: &str, max_connections: u32, acquire_timeout: Duration) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(dsn)
        .await?;

    tracing::info!(max_connections, "Connected to PostgreSQL");
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct OrderRow {
    order_uid: Uuid,
    track_number: String,
    entry: String,
    locale: String,
    internal_signature: String,
    customer_id: String,
    delivery_service: String,
    shardkey: i64,
    sm_id: i32,
    date_created: DateTime<Utc>,
}

#[derive(FromRow)]
struct DeliveryRow {
    del_name: String,
    phone: String,
    zip: String,
    city: String,
    address: String,
    region: String,
    email: String,
}

#[derive(FromRow)]
struct PaymentRow {
    transaction_id: String,
    request_id: String,
    currency: String,
    provider: String,
    amount: i64,
    payment_dt: i64,
    bank: String,
    delivery_cost: i64,
    goods_total: i64,
    custom_fee: i64,
}

#[derive(FromRow)]
struct ItemRow {
    chrt_id: i64,
    track_number: String,
    price: i64,
    rid: String,
    item_name: String,
    sale: i32,
    item_size: String,
    total_price: i64,
    nm_id: i64,
    brand: String,
    status: String,
}

impl From<DeliveryRow> for Delivery {
    fn from(row: DeliveryRow) -> Self {
        Self {
            name: row.del_name,
            phone: row.phone,
            zip: row.zip,
            city: row.city,
            address: row.address,
            region: row.region,
            email: row.email,
        }
    }
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            transaction_id: row.transaction_id,
            request_id: row.request_id,
            currency: row.currency,
            provider: row.provider,
            amount: row.amount,
            payment_dt: row.payment_dt,
            bank: row.bank,
            delivery_cost: row.delivery_cost,
            goods_total: row.goods_total,
            custom_fee: row.custom_fee,
        }
    }
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            chrt_id: row.chrt_id,
            track_number: row.track_number,
            price: row.price,
            rid: row.rid,
            name: row.item_name,
            sale: row.sale,
            size: row.item_size,
            total_price: row.total_price,
            nm_id: row.nm_id,
            brand: row.brand,
            status: row.status,
        }
    }
}

/// SQLSTATE classes 22 (data exception) and 23 (integrity constraint
/// violation) describe the data itself, as do client-side failures to encode
/// or frame the statement. Everything else is infrastructure.
fn classify(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::Database(db_error) => {
            let rejected = db_error
                .code()
                .map(|code| code.starts_with("22") || code.starts_with("23"))
                .unwrap_or(false);
            if rejected {
                return StoreError::Rejected(db_error.message().to_string());
            }
        }
        sqlx::Error::Protocol(_)
        | sqlx::Error::Encode(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnDecode { .. } => return StoreError::Rejected(error.to_string()),
        _ => {}
    }
    StoreError::Database(error)
}

/// Bind parameters PostgreSQL accepts in one statement.
const MAX_BIND_PARAMS: usize = u16::MAX as usize;
const ITEM_COLUMNS: usize = 13;
const ITEMS_PER_INSERT: usize = MAX_BIND_PARAMS / ITEM_COLUMNS;

/// Items split into insertable batches, each with the position of its first item.
fn item_batches(items: &[Item]) -> impl Iterator<Item = (usize, &[Item])> {
    items
        .chunks(ITEMS_PER_INSERT)
        .enumerate()
        .map(|(index, batch)| (index * ITEMS_PER_INSERT, batch))
}

async fn write_aggregate(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<(), sqlx::Error> {
    let id = order.order_uid.into_uuid();

    sqlx::query(
        "INSERT INTO orders (
            order_uid, track_number, entry, locale, internal_signature,
            customer_id, delivery_service, shardkey, sm_id, date_created
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (order_uid) DO UPDATE SET
            track_number = EXCLUDED.track_number,
            entry = EXCLUDED.entry,
            locale = EXCLUDED.locale,
            internal_signature = EXCLUDED.internal_signature,
            customer_id = EXCLUDED.customer_id,
            delivery_service = EXCLUDED.delivery_service,
            shardkey = EXCLUDED.shardkey,
            sm_id = EXCLUDED.sm_id,
            date_created = EXCLUDED.date_created",
    )
    .bind(id)
    .bind(&order.track_number)
    .bind(&order.entry)
    .bind(&order.locale)
    .bind(&order.internal_signature)
    .bind(&order.customer_id)
    .bind(&order.delivery_service)
    .bind(order.shard_key)
    .bind(order.sm_id)
    .bind(order.date_created)
    .execute(&mut **tx)
    .await?;

    let delivery = &order.delivery;
    sqlx::query(
        "INSERT INTO deliveries (order_uid, del_name, phone, zip, city, address, region, email)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (order_uid) DO UPDATE SET
            del_name = EXCLUDED.del_name,
            phone = EXCLUDED.phone,
            zip = EXCLUDED.zip,
            city = EXCLUDED.city,
            address = EXCLUDED.address,
            region = EXCLUDED.region,
            email = EXCLUDED.email",
    )
    .bind(id)
    .bind(&delivery.name)
    .bind(&delivery.phone)
    .bind(&delivery.zip)
    .bind(&delivery.city)
    .bind(&delivery.address)
    .bind(&delivery.region)
    .bind(&delivery.email)
    .execute(&mut **tx)
    .await?;

    let payment = &order.payment;
    sqlx::query(
        "INSERT INTO payments (
            order_uid, transaction_id, request_id, currency, provider, amount,
            payment_dt, bank, delivery_cost, goods_total, custom_fee
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (order_uid) DO UPDATE SET
            transaction_id = EXCLUDED.transaction_id,
            request_id = EXCLUDED.request_id,
            currency = EXCLUDED.currency,
            provider = EXCLUDED.provider,
            amount = EXCLUDED.amount,
            payment_dt = EXCLUDED.payment_dt,
            bank = EXCLUDED.bank,
            delivery_cost = EXCLUDED.delivery_cost,
            goods_total = EXCLUDED.goods_total,
            custom_fee = EXCLUDED.custom_fee",
    )
    .bind(id)
    .bind(&payment.transaction_id)
    .bind(&payment.request_id)
    .bind(&payment.currency)
    .bind(&payment.provider)
    .bind(payment.amount)
    .bind(payment.payment_dt)
    .bind(&payment.bank)
    .bind(payment.delivery_cost)
    .bind(payment.goods_total)
    .bind(payment.custom_fee)
    .execute(&mut **tx)
    .await?;

    // Items have no identity of their own: replace the whole list.
    sqlx::query("DELETE FROM items WHERE order_uid = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    for (first_position, batch) in item_batches(&order.items) {
        let mut insert = QueryBuilder::<Postgres>::new(
            "INSERT INTO items (
                order_uid, position, chrt_id, track_number, price, rid, item_name,
                sale, item_size, total_price, nm_id, brand, status
            ) ",
        );
        insert.push_values(batch.iter().enumerate(), |mut row, (offset, item)| {
            row.push_bind(id)
                .push_bind((first_position + offset) as i32)
                .push_bind(item.chrt_id)
                .push_bind(&item.track_number)
                .push_bind(item.price)
                .push_bind(&item.rid)
                .push_bind(&item.name)
                .push_bind(item.sale)
                .push_bind(&item.size)
                .push_bind(item.total_price)
                .push_bind(item.nm_id)
                .push_bind(&item.brand)
                .push_bind(&item.status);
        });
        insert.build().execute(&mut **tx).await?;
    }

    Ok(())
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let uuid = id.into_uuid();
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let header: Option<OrderRow> = sqlx::query_as(
            "SELECT order_uid, track_number, entry, locale, internal_signature,
                    customer_id, delivery_service, shardkey, sm_id, date_created
             FROM orders WHERE order_uid = $1",
        )
        .bind(uuid)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(header) = header else {
            tx.commit().await?;
            tracing::debug!(order_id = %id, "Order not found in database");
            return Ok(None);
        };

        let delivery: DeliveryRow = sqlx::query_as(
            "SELECT del_name, phone, zip, city, address, region, email
             FROM deliveries WHERE order_uid = $1",
        )
        .bind(uuid)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::Incomplete { order_id: *id, part: "delivery" })?;

        let payment: PaymentRow = sqlx::query_as(
            "SELECT transaction_id, request_id, currency, provider, amount, payment_dt,
                    bank, delivery_cost, goods_total, custom_fee
             FROM payments WHERE order_uid = $1",
        )
        .bind(uuid)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::Incomplete { order_id: *id, part: "payment" })?;

        let items: Vec<ItemRow> = sqlx::query_as(
            "SELECT chrt_id, track_number, price, rid, item_name, sale, item_size,
                    total_price, nm_id, brand, status
             FROM items WHERE order_uid = $1
             ORDER BY position ASC",
        )
        .bind(uuid)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(order_id = %id, item_count = items.len(), "Loaded order from database");

        Ok(Some(Order {
            order_uid: OrderId::from(header.order_uid),
            track_number: header.track_number,
            entry: header.entry,
            locale: header.locale,
            internal_signature: header.internal_signature,
            customer_id: header.customer_id,
            delivery_service: header.delivery_service,
            shard_key: header.shardkey,
            sm_id: header.sm_id,
            date_created: header.date_created,
            delivery: delivery.into(),
            payment: payment.into(),
            items: items.into_iter().map(Item::from).collect(),
        }))
    }

    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        // Dropping an uncommitted transaction rolls it back.
        write_aggregate(&mut tx, order).await.map_err(classify)?;
        tx.commit().await.map_err(classify)?;

        tracing::debug!(
            order_id = %order.order_uid,
            item_count = order.items.len(),
            "Order persisted"
        );

        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<OrderId>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT order_uid FROM orders ORDER BY date_created DESC, order_uid LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(OrderId::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::IsTransient;

    #[test]
    fn test_statement_framing_errors_are_rejected_not_transient() {
        let error = classify(sqlx::Error::Protocol(
            "PgConnection::run(): too many arguments for query: 66300".to_string(),
        ));

        assert!(matches!(error, StoreError::Rejected(_)));
        assert!(!error.is_transient());
    }

    #[test]
    fn test_connection_errors_stay_transient() {
        assert!(classify(sqlx::Error::PoolTimedOut).is_transient());
        assert!(classify(sqlx::Error::PoolClosed).is_transient());
    }

    #[test]
    fn test_item_batches_stay_under_bind_limit() {
        let items = vec![Item::default(); 5_100];

        let batches: Vec<(usize, usize)> = item_batches(&items).map(|(first, batch)| (first, batch.len())).collect();

        assert_eq!(batches, vec![(0, ITEMS_PER_INSERT), (ITEMS_PER_INSERT, 5_100 - ITEMS_PER_INSERT)]);
        assert!(ITEMS_PER_INSERT * ITEM_COLUMNS <= MAX_BIND_PARAMS);
    }

    #[test]
    fn test_no_batches_for_empty_item_list() {
        assert_eq!(item_batches(&[]).count(), 0);
    }
}
