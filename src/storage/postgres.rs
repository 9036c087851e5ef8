use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode};
use sqlx::Row;
use std::collections::HashMap;
use std::time::Duration;

use crate::models::{Delivery, Item, Order, Payment};
use super::{InsertOutcome, OrderStore, StoreError, StoreResult};

// ============================================================================
// Postgres Order Store
// ============================================================================
//
// Tables:
// - orders      (order_uid PRIMARY KEY)
// - deliveries  (order_uid PRIMARY KEY -> orders)
// - payments    (order_uid PRIMARY KEY -> orders)
// - items       ((order_uid, position) PRIMARY KEY, order_uid -> orders)
//
// Inserts run in one transaction. The orders row goes first with
// ON CONFLICT DO NOTHING, so concurrent inserts of the same order serialize
// on the primary key and every loser sees zero affected rows.
//
// ============================================================================

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS orders (
        order_uid TEXT PRIMARY KEY,
        track_number TEXT NOT NULL,
        entry TEXT NOT NULL,
        locale TEXT NOT NULL,
        internal_signature TEXT NOT NULL,
        customer_id TEXT NOT NULL,
        delivery_service TEXT NOT NULL,
        shardkey TEXT NOT NULL,
        sm_id INT NOT NULL,
        date_created TIMESTAMPTZ NOT NULL,
        oof_shard TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS deliveries (
        order_uid TEXT PRIMARY KEY REFERENCES orders(order_uid),
        name TEXT NOT NULL,
        phone TEXT NOT NULL,
        zip TEXT NOT NULL,
        city TEXT NOT NULL,
        address TEXT NOT NULL,
        region TEXT NOT NULL,
        email TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS payments (
        order_uid TEXT PRIMARY KEY REFERENCES orders(order_uid),
        transaction TEXT NOT NULL,
        request_id TEXT NOT NULL,
        currency TEXT NOT NULL,
        provider TEXT NOT NULL,
        amount INT NOT NULL,
        payment_dt BIGINT NOT NULL,
        bank TEXT NOT NULL,
        delivery_cost INT NOT NULL,
        goods_total INT NOT NULL,
        custom_fee INT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS items (
        order_uid TEXT NOT NULL REFERENCES orders(order_uid),
        position INT NOT NULL,
        chrt_id BIGINT NOT NULL,
        track_number TEXT NOT NULL,
        price INT NOT NULL,
        rid TEXT NOT NULL,
        name TEXT NOT NULL,
        sale INT NOT NULL,
        size TEXT NOT NULL,
        total_price INT NOT NULL,
        nm_id BIGINT NOT NULL,
        brand TEXT NOT NULL,
        status INT NOT NULL,
        PRIMARY KEY (order_uid, position)
    )",
];

const INSERT_ORDER: &str = "INSERT INTO orders (
        order_uid, track_number, entry, locale, internal_signature, customer_id,
        delivery_service, shardkey, sm_id, date_created, oof_shard
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ON CONFLICT (order_uid) DO NOTHING";

const INSERT_DELIVERY: &str = "INSERT INTO deliveries (
        order_uid, name, phone, zip, city, address, region, email
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

const INSERT_PAYMENT: &str = "INSERT INTO payments (
        order_uid, transaction, request_id, currency, provider, amount,
        payment_dt, bank, delivery_cost, goods_total, custom_fee
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)";

const INSERT_ITEM: &str = "INSERT INTO items (
        order_uid, position, chrt_id, track_number, price, rid, name, sale,
        size, total_price, nm_id, brand, status
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)";

macro_rules! select_items {
    ($filter:literal) => {
        concat!(
            "SELECT order_uid, chrt_id, track_number, price, rid, name, sale,
                size, total_price, nm_id, brand, status
            FROM items ",
            $filter
        )
    };
}

macro_rules! select_orders {
    ($filter:literal) => {
        concat!(
            "SELECT o.order_uid, o.track_number, o.entry, o.locale,
                o.internal_signature, o.customer_id, o.delivery_service, o.shardkey,
                o.sm_id, o.date_created, o.oof_shard,
                d.name, d.phone, d.zip, d.city, d.address, d.region, d.email,
                p.transaction, p.request_id, p.currency, p.provider, p.amount,
                p.payment_dt, p.bank, p.delivery_cost, p.goods_total, p.custom_fee
            FROM orders o
            JOIN deliveries d ON o.order_uid = d.order_uid
            JOIN payments p ON o.order_uid = p.order_uid ",
            $filter
        )
    };
}

const SELECT_ITEMS: &str = select_items!("ORDER BY order_uid, position");
const SELECT_ITEMS_BY_UID: &str = select_items!("WHERE order_uid = $1 ORDER BY position");
const SELECT_ORDERS: &str = select_orders!("");
const SELECT_ORDER_BY_UID: &str = select_orders!("WHERE o.order_uid = $1");

/// Connection settings for the Postgres pool
#[derive(Debug, Clone)]
pub struct PgStoreOptions {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Open the pool and create the schema if it does not exist yet
    pub async fn connect(options: &PgStoreOptions) -> StoreResult<Self> {
        let ssl_mode: PgSslMode = options.sslmode.parse().map_err(|e: sqlx::Error| {
            StoreError::Connection(format!("invalid sslmode {:?}: {}", options.sslmode, e))
        })?;

        let connect_options = PgConnectOptions::new()
            .host(&options.host)
            .port(options.port)
            .username(&options.user)
            .password(&options.password)
            .database(&options.dbname)
            .ssl_mode(ssl_mode);

        tracing::info!(
            host = %options.host,
            port = options.port,
            database = %options.dbname,
            max_connections = options.max_connections,
            "Connecting to Postgres"
        );

        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Schema(e.to_string()))?;
        }

        tracing::debug!("Order schema ready");
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn exists(&self, order_uid: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM orders WHERE order_uid = $1) AS present")
            .bind(order_uid)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::existence_check(order_uid, e))?;

        row.try_get("present")
            .map_err(|e| StoreError::existence_check(order_uid, e))
    }

    async fn insert(&self, order: &Order) -> StoreResult<InsertOutcome> {
        let uid = order.order_uid.as_str();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::persistence(uid, "begin transaction", e))?;

        let inserted = sqlx::query(INSERT_ORDER)
            .bind(uid)
            .bind(&order.track_number)
            .bind(&order.entry)
            .bind(&order.locale)
            .bind(&order.internal_signature)
            .bind(&order.customer_id)
            .bind(&order.delivery_service)
            .bind(&order.shardkey)
            .bind(order.sm_id)
            .bind(order.date_created)
            .bind(&order.oof_shard)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::persistence(uid, "insert order", e))?
            .rows_affected();

        if inserted == 0 {
            tx.rollback()
                .await
                .map_err(|e| StoreError::persistence(uid, "rollback duplicate", e))?;
            return Ok(InsertOutcome::AlreadyExists);
        }

        let delivery = &order.delivery;
        sqlx::query(INSERT_DELIVERY)
            .bind(uid)
            .bind(&delivery.name)
            .bind(&delivery.phone)
            .bind(&delivery.zip)
            .bind(&delivery.city)
            .bind(&delivery.address)
            .bind(&delivery.region)
            .bind(&delivery.email)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::persistence(uid, "insert delivery", e))?;

        let payment = &order.payment;
        sqlx::query(INSERT_PAYMENT)
            .bind(uid)
            .bind(&payment.transaction)
            .bind(&payment.request_id)
            .bind(&payment.currency)
            .bind(&payment.provider)
            .bind(payment.amount)
            .bind(payment.payment_dt)
            .bind(&payment.bank)
            .bind(payment.delivery_cost)
            .bind(payment.goods_total)
            .bind(payment.custom_fee)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::persistence(uid, "insert payment", e))?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(INSERT_ITEM)
                .bind(uid)
                .bind(position as i32)
                .bind(item.chrt_id)
                .bind(&item.track_number)
                .bind(item.price)
                .bind(&item.rid)
                .bind(&item.name)
                .bind(item.sale)
                .bind(&item.size)
                .bind(item.total_price)
                .bind(item.nm_id)
                .bind(&item.brand)
                .bind(item.status)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::persistence(uid, "insert item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::persistence(uid, "commit", e))?;

        tracing::debug!(
            order_uid = %uid,
            item_count = order.items.len(),
            "Order persisted"
        );

        Ok(InsertOutcome::Inserted)
    }

    async fn load(&self, order_uid: &str) -> StoreResult<Option<Order>> {
        // Orders are written in one transaction and never updated, so the
        // two reads cannot see different versions of the same order.
        let Some(row) = sqlx::query(SELECT_ORDER_BY_UID)
            .bind(order_uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::reload(order_uid, "fetch order", e))?
        else {
            return Ok(None);
        };

        let mut order =
            order_from_row(&row).map_err(|e| StoreError::reload(order_uid, "decode order", e))?;

        let item_rows = sqlx::query(SELECT_ITEMS_BY_UID)
            .bind(order_uid)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::reload(order_uid, "fetch items", e))?;

        order.items = item_rows
            .iter()
            .map(item_from_row)
            .collect::<Result<_, _>>()
            .map_err(|e| StoreError::reload(order_uid, "decode item", e))?;

        Ok(Some(order))
    }

    async fn load_all(&self) -> StoreResult<HashMap<String, Order>> {
        // Both reads must see the same snapshot or an order committed in
        // between would come back without its items.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::retrieval("begin snapshot", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::retrieval("set snapshot isolation", e))?;

        let item_rows = sqlx::query(SELECT_ITEMS)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| StoreError::retrieval("fetch items", e))?;

        let mut items: HashMap<String, Vec<Item>> = HashMap::new();
        for row in &item_rows {
            let order_uid: String = row
                .try_get("order_uid")
                .map_err(|e| StoreError::retrieval("decode item", e))?;
            let item = item_from_row(row).map_err(|e| StoreError::retrieval("decode item", e))?;
            items.entry(order_uid).or_default().push(item);
        }

        let order_rows = sqlx::query(SELECT_ORDERS)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| StoreError::retrieval("fetch orders", e))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::retrieval("end snapshot", e))?;

        let mut orders = HashMap::with_capacity(order_rows.len());
        for row in &order_rows {
            let mut order = order_from_row(row).map_err(|e| StoreError::retrieval("decode order", e))?;
            order.items = items.remove(&order.order_uid).unwrap_or_default();
            orders.insert(order.order_uid.clone(), order);
        }

        Ok(orders)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

fn item_from_row(row: &PgRow) -> Result<Item, sqlx::Error> {
    Ok(Item {
        chrt_id: row.try_get("chrt_id")?,
        track_number: row.try_get("track_number")?,
        price: row.try_get("price")?,
        rid: row.try_get("rid")?,
        name: row.try_get("name")?,
        sale: row.try_get("sale")?,
        size: row.try_get("size")?,
        total_price: row.try_get("total_price")?,
        nm_id: row.try_get("nm_id")?,
        brand: row.try_get("brand")?,
        status: row.try_get("status")?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order, sqlx::Error> {
    Ok(Order {
        order_uid: row.try_get("order_uid")?,
        track_number: row.try_get("track_number")?,
        entry: row.try_get("entry")?,
        delivery: Delivery {
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            zip: row.try_get("zip")?,
            city: row.try_get("city")?,
            address: row.try_get("address")?,
            region: row.try_get("region")?,
            email: row.try_get("email")?,
        },
        payment: Payment {
            transaction: row.try_get("transaction")?,
            request_id: row.try_get("request_id")?,
            currency: row.try_get("currency")?,
            provider: row.try_get("provider")?,
            amount: row.try_get("amount")?,
            payment_dt: row.try_get("payment_dt")?,
            bank: row.try_get("bank")?,
            delivery_cost: row.try_get("delivery_cost")?,
            goods_total: row.try_get("goods_total")?,
            custom_fee: row.try_get("custom_fee")?,
        },
        items: Vec::new(),
        locale: row.try_get("locale")?,
        internal_signature: row.try_get("internal_signature")?,
        customer_id: row.try_get("customer_id")?,
        delivery_service: row.try_get("delivery_service")?,
        shardkey: row.try_get("shardkey")?,
        sm_id: row.try_get("sm_id")?,
        date_created: row.try_get("date_created")?,
        oof_shard: row.try_get("oof_shard")?,
    })
}

// ============================================================================
// Integration Tests (need a live Postgres at DATABASE_URL)
// ============================================================================
