//! `Category` action: product/customer/supplier categories.

use std::sync::Arc;

use async_trait::async_trait;
use direkt_core::{ActionHandler, Caller, ErrorCode, HandlerError, HandlerResult, Operation};
use serde_json::{json, Value};

use super::records::{id_of, pick, present, Filter, Records};
use super::store::{ErpStore, Table};
use super::Session;
use crate::actions::ActionModule;
use crate::Action;

const RESOURCE: &str = "category";

/// Client field -> stored field.
const FIELDS: &[(&str, &str)] = &[
    ("fk_parent", "fk_parent"),
    ("label", "label"),
    ("description", "description"),
    ("company_id", "socid"),
    // 0 product, 1 supplier, 2 customer, 3 member
    ("type", "type"),
    ("entity", "entity"),
];

#[derive(Action)]
#[action(name = "Category")]
pub struct CategoryHandler {
    session: Session,
}

impl CategoryHandler {
    pub fn new(caller: &Caller, store: Option<Arc<dyn ErpStore>>) -> Self {
        Self {
            session: Session::new(caller, store),
        }
    }

    /// One category by `id` or `label`. No usable filter -> empty list.
    async fn read_categorie(&self, params: Value) -> HandlerResult {
        let store = self.session.authorize(RESOURCE, Operation::Read)?;
        let filter = Filter::from_params(&params).project(&[("id", "id"), ("label", "label")]);
        if filter.is_empty() {
            return Ok(json!([]));
        }
        let rows = store.list(Table::Categories, &filter).await?;
        let results = rows
            .iter()
            .map(|row| {
                let mut out = present(row, FIELDS);
                out.entry("description").or_insert_with(|| json!(""));
                Value::Object(out)
            })
            .collect();
        Ok(Value::Array(results))
    }

    /// All categories of one type (default 0), as `{id, categorie}` pairs.
    async fn read_categorie_list(&self, params: Value) -> HandlerResult {
        let store = self.session.authorize(RESOURCE, Operation::Read)?;
        let kind = Filter::from_params(&params)
            .value("type")
            .cloned()
            .unwrap_or_else(|| json!(0));
        let rows = store
            .list(Table::Categories, &Filter::new().with_value("type", kind))
            .await?;
        Ok(rows
            .iter()
            .map(|row| json!({"id": row.get("id"), "categorie": row.get("label")}))
            .collect())
    }

    async fn create_categorie(&self, params: Value) -> HandlerResult {
        let store = self.session.authorize(RESOURCE, Operation::Create)?;
        let mut records = Records::from_param(params)?;
        for record in records.items_mut() {
            let mut fields = pick(record, FIELDS);
            fields.entry("type").or_insert_with(|| json!(0));
            let id = store.insert(Table::Categories, fields).await?;
            record.insert("id".into(), json!(id));
        }
        Ok(records.into_value())
    }

    async fn update_categorie(&self, params: Value) -> HandlerResult {
        let store = self.session.authorize(RESOURCE, Operation::Update)?;
        let mut records = Records::from_param(params)?;
        for record in records.items_mut() {
            let id = id_of(record.get("id")).ok_or(HandlerError::Code(ErrorCode::Parameter))?;
            if !store.update(Table::Categories, id, pick(record, FIELDS)).await? {
                return Err(ErrorCode::Update.into());
            }
        }
        Ok(records.into_value())
    }

    async fn destroy_categorie(&self, params: Value) -> HandlerResult {
        let store = self.session.authorize(RESOURCE, Operation::Delete)?;
        let mut records = Records::from_param(params)?;
        for record in records.items_mut() {
            let id = id_of(record.get("id")).ok_or(HandlerError::Code(ErrorCode::Parameter))?;
            if !store.delete(Table::Categories, id).await? {
                return Err(ErrorCode::Update.into());
            }
        }
        Ok(records.into_value())
    }
}

#[async_trait]
impl ActionHandler for CategoryHandler {
    async fn invoke(&self, method: &str, args: Vec<Value>) -> HandlerResult {
        let params = args.into_iter().next().unwrap_or(Value::Null);
        match method {
            "readCategorie" => self.read_categorie(params).await,
            "readCategorieList" => self.read_categorie_list(params).await,
            "createCategorie" => self.create_categorie(params).await,
            "updateCategorie" => self.update_categorie(params).await,
            "destroyCategorie" => self.destroy_categorie(params).await,
            other => Err(HandlerError::Fault(format!("Category has no method {other}"))),
        }
    }
}

/// The `Category` action and its methods.
pub fn module(store: Option<Arc<dyn ErpStore>>) -> ActionModule {
    ActionModule::new(move |caller: &Caller| CategoryHandler::new(caller, store.clone()))
        .method("readCategorie")
        .method("readCategorieList")
        .method("createCategorie")
        .method("updateCategorie")
        .method("destroyCategorie")
}
