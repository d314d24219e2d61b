//! `Order` action: customer orders and their lines.

use std::sync::Arc;

use async_trait::async_trait;
use direkt_core::{ActionHandler, Caller, ErrorCode, HandlerError, HandlerResult, Operation};
use serde_json::{json, Value};

use super::records::{id_of, pick, present, Filter, Records};
use super::store::{ErpStore, Record, Table};
use super::Session;
use crate::actions::ActionModule;
use crate::Action;

const RESOURCE: &str = "order";

/// Order status id -> short label.
pub const ORDER_STATUSES: [(i64, &str); 5] = [
    (-1, "Canceled"),
    (0, "Draft"),
    (1, "Validated"),
    (2, "In process"),
    (3, "Delivered"),
];

const ORDER_FIELDS: &[(&str, &str)] = &[
    ("ref", "ref"),
    ("ref_int", "ref_int"),
    ("ref_customer", "ref_client"),
    ("customer_id", "socid"),
    ("orderstatus_id", "statut"),
    ("note_private", "note_private"),
    ("note_public", "note_public"),
    ("user_id", "user_author_id"),
    ("order_date", "date_commande"),
    ("deliver_date", "date_livraison"),
    ("availability_id", "availability_id"),
    ("availability_code", "availability_code"),
];

const LINE_FIELDS: &[(&str, &str)] = &[
    ("origin_id", "fk_commande"),
    ("product_id", "fk_product"),
    ("product_price", "subprice"),
    ("product_tax", "tva_tx"),
    ("description", "desc"),
    ("qty_asked", "qty"),
    ("warehouse_id", "fk_entrepot"),
];

fn status_label(status: Option<&Value>) -> Option<&'static str> {
    let status = status?;
    let id = status
        .as_i64()
        .or_else(|| status.as_str()?.trim().parse().ok())?;
    ORDER_STATUSES
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, label)| *label)
}

fn parameter_error() -> HandlerError {
    HandlerError::Code(ErrorCode::Parameter)
}

#[derive(Action)]
#[action(name = "Order")]
pub struct OrderHandler {
    session: Session,
}

impl OrderHandler {
    pub fn new(caller: &Caller, store: Option<Arc<dyn ErpStore>>) -> Self {
        Self {
            session: Session::new(caller, store),
        }
    }

    fn order_row(row: &Record) -> Value {
        let mut out = present(row, ORDER_FIELDS);
        if let Some(label) = status_label(row.get("statut")) {
            out.insert("orderstatus".into(), json!(label));
        }
        Value::Object(out)
    }

    /// One order by `id`, `ref` or `ref_int`. No usable filter -> empty list.
    async fn read_order(&self, params: Value) -> HandlerResult {
        let store = self.session.authorize(RESOURCE, Operation::Read)?;
        let filter =
            Filter::from_params(&params).project(&[("id", "id"), ("ref", "ref"), ("ref_int", "ref_int")]);
        if filter.is_empty() {
            return Ok(json!([]));
        }
        let rows = store.list(Table::Orders, &filter).await?;
        Ok(rows.iter().map(Self::order_row).collect())
    }

    /// Orders filtered by status (repeatable) and `ref`, most recent order date first.
    async fn read_order_list(&self, params: Value) -> HandlerResult {
        let store = self.session.authorize(RESOURCE, Operation::Read)?;
        let filter = Filter::from_params(&params).project(&[("orderstatus_id", "statut"), ("ref", "ref")]);
        let mut rows = store.list(Table::Orders, &filter).await?;
        rows.sort_by(|a, b| {
            let date = |r: &Record| r.get("date_commande").and_then(Value::as_str).map(str::to_string);
            date(b).cmp(&date(a))
        });
        Ok(rows
            .iter()
            .map(|row| {
                json!({
                    "id": row.get("id"),
                    "customer_id": row.get("socid"),
                    "ref": row.get("ref"),
                    "ref_int": row.get("ref_int"),
                    "orderstatus_id": row.get("statut"),
                    "orderstatus": status_label(row.get("statut")),
                    "availability_id": row.get("availability_id"),
                })
            })
            .collect())
    }

    async fn read_order_status(&self) -> HandlerResult {
        self.session.connected()?;
        Ok(ORDER_STATUSES
            .iter()
            .map(|(id, status)| json!({"id": id, "status": status}))
            .collect())
    }

    /// Active availability codes in id order.
    async fn read_availability_codes(&self) -> HandlerResult {
        let store = self.session.connected()?;
        let rows = store
            .list(Table::Availability, &Filter::new().with_value("active", 1))
            .await?;
        Ok(rows
            .iter()
            .map(|row| json!({"id": row.get("id"), "code": row.get("code"), "label": row.get("label")}))
            .collect())
    }

    async fn create_order(&self, params: Value) -> HandlerResult {
        let store = self.session.authorize(RESOURCE, Operation::Create)?;
        let mut records = Records::from_param(params)?;
        for record in records.items_mut() {
            let mut fields = pick(record, ORDER_FIELDS);
            fields.entry("statut").or_insert_with(|| json!(0));
            let id = store.insert(Table::Orders, fields).await?;
            record.insert("id".into(), json!(id));
        }
        Ok(records.into_value())
    }

    async fn update_order(&self, params: Value) -> HandlerResult {
        let store = self.session.authorize(RESOURCE, Operation::Update)?;
        let mut records = Records::from_param(params)?;
        for record in records.items_mut() {
            let id = id_of(record.get("id")).ok_or_else(parameter_error)?;
            let fields = pick(record, ORDER_FIELDS);
            if fields.get("statut").is_some_and(|s| status_label(Some(s)).is_none()) {
                return Err(parameter_error());
            }
            if !store.update(Table::Orders, id, fields).await? {
                return Err(ErrorCode::Update.into());
            }
        }
        Ok(records.into_value())
    }

    /// Deletes the order and its lines.
    async fn destroy_order(&self, params: Value) -> HandlerResult {
        let store = self.session.authorize(RESOURCE, Operation::Delete)?;
        let mut records = Records::from_param(params)?;
        for record in records.items_mut() {
            let id = id_of(record.get("id")).ok_or_else(parameter_error)?;
            if !store.delete(Table::Orders, id).await? {
                return Err(ErrorCode::Update.into());
            }
            let lines = store
                .list(Table::OrderLines, &Filter::new().with_value("fk_commande", id))
                .await?;
            for line in lines {
                if let Some(line_id) = id_of(line.get("id")) {
                    store.delete(Table::OrderLines, line_id).await?;
                }
            }
        }
        Ok(records.into_value())
    }

    /// Lines of the order given as `order_id` (or the older `id`), optionally for one warehouse.
    async fn read_order_line(&self, params: Value) -> HandlerResult {
        let store = self.session.authorize(RESOURCE, Operation::Read)?;
        let filter = Filter::from_params(&params);
        let Some(order_id) = id_of(filter.value("order_id").or_else(|| filter.value("id"))) else {
            return Ok(json!([]));
        };
        let warehouse = filter.value("warehouse_id").cloned();
        let mut lines_filter = Filter::new().with_value("fk_commande", order_id);
        if let Some(warehouse) = &warehouse {
            lines_filter = lines_filter.with_value("fk_entrepot", warehouse.clone());
        }
        let lines = store.list(Table::OrderLines, &lines_filter).await?;
        Ok(lines
            .iter()
            .map(|line| {
                let mut out = present(line, LINE_FIELDS);
                let line_id = line.get("id").cloned().unwrap_or(Value::Null);
                if let Some(warehouse) = &warehouse {
                    let composite = match warehouse {
                        Value::String(s) => format!("{line_id}_{s}"),
                        other => format!("{line_id}_{other}"),
                    };
                    out.insert("id".into(), json!(composite));
                }
                out.insert("origin_line_id".into(), line_id);
                Value::Object(out)
            })
            .collect())
    }

    /// Each line names its order in `origin_id`; the order must exist.
    async fn create_order_line(&self, params: Value) -> HandlerResult {
        let store = self.session.authorize(RESOURCE, Operation::Create)?;
        let mut records = Records::from_param(params)?;
        for record in records.items_mut() {
            let order_id = id_of(record.get("origin_id")).ok_or_else(parameter_error)?;
            if store.fetch(Table::Orders, order_id).await?.is_none() {
                return Err(ErrorCode::Update.into());
            }
            let mut fields = pick(record, LINE_FIELDS);
            fields.insert("fk_commande".into(), json!(order_id));
            let line_id = store.insert(Table::OrderLines, fields).await?;
            record.insert("origin_line_id".into(), json!(line_id));
        }
        Ok(records.into_value())
    }

    async fn update_order_line(&self, params: Value) -> HandlerResult {
        let store = self.session.authorize(RESOURCE, Operation::Update)?;
        let mut records = Records::from_param(params)?;
        for record in records.items_mut() {
            let order_id = id_of(record.get("origin_id")).ok_or_else(parameter_error)?;
            let line_id = id_of(record.get("origin_line_id")).ok_or_else(parameter_error)?;
            let belongs = store
                .fetch(Table::OrderLines, line_id)
                .await?
                .is_some_and(|line| id_of(line.get("fk_commande")) == Some(order_id));
            if !belongs {
                return Err(ErrorCode::Update.into());
            }
            let mut fields = pick(record, LINE_FIELDS);
            fields.remove("fk_commande");
            if !store.update(Table::OrderLines, line_id, fields).await? {
                return Err(ErrorCode::Update.into());
            }
        }
        Ok(records.into_value())
    }

    async fn destroy_order_line(&self, params: Value) -> HandlerResult {
        let store = self.session.authorize(RESOURCE, Operation::Delete)?;
        let mut records = Records::from_param(params)?;
        for record in records.items_mut() {
            let line_id = id_of(record.get("origin_line_id")).ok_or_else(parameter_error)?;
            if !store.delete(Table::OrderLines, line_id).await? {
                return Err(ErrorCode::Update.into());
            }
        }
        Ok(records.into_value())
    }
}

#[async_trait]
impl ActionHandler for OrderHandler {
    async fn invoke(&self, method: &str, args: Vec<Value>) -> HandlerResult {
        match method {
            "readOrderStatus" => return self.read_order_status().await,
            "readAvailabilityCodes" => return self.read_availability_codes().await,
            _ => {}
        }
        let params = args.into_iter().next().unwrap_or(Value::Null);
        match method {
            "readOrder" => self.read_order(params).await,
            "readOrderList" => self.read_order_list(params).await,
            "createOrder" => self.create_order(params).await,
            "updateOrder" => self.update_order(params).await,
            "destroyOrder" => self.destroy_order(params).await,
            "readOrderLine" => self.read_order_line(params).await,
            "createOrderLine" => self.create_order_line(params).await,
            "updateOrderLine" => self.update_order_line(params).await,
            "destroyOrderLine" => self.destroy_order_line(params).await,
            other => Err(HandlerError::Fault(format!("Order has no method {other}"))),
        }
    }
}

/// The `Order` action and its methods. The two code-table reads take no arguments.
pub fn module(store: Option<Arc<dyn ErpStore>>) -> ActionModule {
    ActionModule::new(move |caller: &Caller| OrderHandler::new(caller, store.clone()))
        .method("readOrder")
        .method("readOrderList")
        .method_with_len("readOrderStatus", 0)
        .method_with_len("readAvailabilityCodes", 0)
        .method("createOrder")
        .method("updateOrder")
        .method("destroyOrder")
        .method("readOrderLine")
        .method("createOrderLine")
        .method("updateOrderLine")
        .method("destroyOrderLine")
}
