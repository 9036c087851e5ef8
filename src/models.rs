use serde::{Deserialize, Serialize};
use chrono::{DateTime, SubsecRound, TimeZone, Utc};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// The wire format of the inbound stream and the body returned by lookups are
// the same JSON document, so field order here is the serialized key order.
//
// ============================================================================

/// Fractional-second digits a TIMESTAMPTZ column preserves
const STORED_SUBSEC_DIGITS: u16 = 6;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Payment {
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i32,
    /// Unix seconds
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i32,
    pub goods_total: i32,
    pub custom_fee: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i32,
    pub rid: String,
    pub name: String,
    pub sale: i32,
    pub size: String,
    pub total_price: i32,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

impl Order {
    /// Decode an order from a raw message payload.
    ///
    /// `date_created` is truncated to microseconds, the precision Postgres
    /// keeps, so a decoded order equals the row that is read back later.
    pub fn from_json(payload: &[u8]) -> serde_json::Result<Self> {
        let mut order: Order = serde_json::from_slice(payload)?;
        order.date_created = order.date_created.trunc_subsecs(STORED_SUBSEC_DIGITS);
        Ok(order)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// An order without a usable identifier cannot be deduplicated or looked up.
    pub fn has_identifier(&self) -> bool {
        !self.order_uid.trim().is_empty()
    }
}

// ============================================================================
// Sample Orders
// ============================================================================

/// Build the deterministic sample order number `n`.
///
/// Every string field is `<Field>_<n>`, every integer is `n`, and the order
/// carries two identical items. The publisher CLI streams these and the tests
/// use them as fixtures.
pub fn sample_order(n: i32) -> Order {
    let tag = |field: &str| format!("{}_{}", field, n);

    let item = Item {
        chrt_id: i64::from(n),
        track_number: tag("track"),
        price: n,
        rid: tag("RID"),
        name: tag("Name"),
        sale: n,
        size: tag("Size"),
        total_price: n,
        nm_id: i64::from(n),
        brand: tag("Brand"),
        status: n,
    };

    Order {
        order_uid: tag("order"),
        track_number: tag("track"),
        entry: tag("entry"),
        delivery: Delivery {
            name: tag("Name"),
            phone: tag("Phone"),
            zip: tag("Zip"),
            city: tag("City"),
            address: tag("Address"),
            region: tag("Region"),
            email: tag("Email"),
        },
        payment: Payment {
            transaction: tag("Transaction"),
            request_id: tag("RequestID"),
            currency: tag("Currency"),
            provider: tag("Provider"),
            amount: n,
            payment_dt: i64::from(n),
            bank: tag("Bank"),
            delivery_cost: n,
            goods_total: n,
            custom_fee: n,
        },
        items: vec![item.clone(), item],
        locale: tag("Locale"),
        internal_signature: tag("InternalSignature"),
        customer_id: tag("CustomerID"),
        delivery_service: tag("DeliveryService"),
        shardkey: tag("Shardkey"),
        sm_id: n,
        date_created: Utc
            .with_ymd_and_hms(2021, 11, 26, 6, 22, 19)
            .single()
            .unwrap_or_else(Utc::now),
        oof_shard: tag("OOFShard"),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const ORDER_1_JSON: &str = r#"{"order_uid":"order_1","track_number":"track_1","entry":"entry_1","delivery":{"name":"Name_1","phone":"Phone_1","zip":"Zip_1","city":"City_1","address":"Address_1","region":"Region_1","email":"Email_1"},"payment":{"transaction":"Transaction_1","request_id":"RequestID_1","currency":"Currency_1","provider":"Provider_1","amount":1,"payment_dt":1,"bank":"Bank_1","delivery_cost":1,"goods_total":1,"custom_fee":1},"items":[{"chrt_id":1,"track_number":"track_1","price":1,"rid":"RID_1","name":"Name_1","sale":1,"size":"Size_1","total_price":1,"nm_id":1,"brand":"Brand_1","status":1},{"chrt_id":1,"track_number":"track_1","price":1,"rid":"RID_1","name":"Name_1","sale":1,"size":"Size_1","total_price":1,"nm_id":1,"brand":"Brand_1","status":1}],"locale":"Locale_1","internal_signature":"InternalSignature_1","customer_id":"CustomerID_1","delivery_service":"DeliveryService_1","shardkey":"Shardkey_1","sm_id":1,"date_created":"2021-11-26T06:22:19Z","oof_shard":"OOFShard_1"}"#;

    #[test]
    fn test_sample_order_serializes_to_fixture() {
        let json = sample_order(1).to_json().unwrap();
        assert_eq!(json, ORDER_1_JSON);
    }

    #[test]
    fn test_order_round_trip_preserves_item_order() {
        let mut order = sample_order(7);
        order.items[0].name = "first".to_string();
        order.items[1].name = "second".to_string();

        let json = order.to_json().unwrap();
        let decoded = Order::from_json(json.as_bytes()).unwrap();

        assert_eq!(decoded, order);
        assert_eq!(decoded.items[0].name, "first");
        assert_eq!(decoded.items[1].name, "second");
    }

    #[test]
    fn test_from_json_rejects_malformed_payload() {
        assert!(Order::from_json(b"not json").is_err());
        assert!(Order::from_json(br#"{"order_uid":"x"}"#).is_err());
    }

    #[test]
    fn test_has_identifier() {
        let mut order = sample_order(3);
        assert!(order.has_identifier());

        order.order_uid = "   ".to_string();
        assert!(!order.has_identifier());
    }

    #[test]
    fn test_date_created_is_truncated_to_microseconds() {
        let json = ORDER_1_JSON.replace(
            "2021-11-26T06:22:19Z",
            "2021-11-26T06:22:19.123456789Z",
        );

        let order = Order::from_json(json.as_bytes()).unwrap();
        assert_eq!(order.date_created.timestamp_subsec_nanos(), 123_456_000);
        assert!(order.to_json().unwrap().contains("\"2021-11-26T06:22:19.123456Z\""));
    }

    #[test]
    fn test_sample_order_keeps_large_numbers_exact() {
        let order = sample_order(i32::MAX);
        assert_eq!(order.sm_id, i32::MAX);
        assert_eq!(order.items[0].chrt_id, i64::from(i32::MAX));
    }

    #[test]
    fn test_order_without_items_round_trips() {
        let mut order = sample_order(4);
        order.items.clear();

        let decoded = Order::from_json(order.to_json().unwrap().as_bytes()).unwrap();
        assert!(decoded.items.is_empty());
    }
}
