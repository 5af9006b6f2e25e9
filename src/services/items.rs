use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr},
    ActiveValue::Set,
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, SqlErr,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{find_item, non_blank, write_projection};
use crate::{
    auth::Capabilities,
    db::DatabaseAccess,
    entities::{
        custody_transfer, incident,
        item::{self, AssignmentType, Category, ItemCondition, ItemState, OwnershipType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

pub const MAX_QUANTITY: i32 = 500;
const MAX_PREFIX_LEN: usize = 6;
const LIKE_ESCAPE: char = '\\';

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("not_blank");
        err.message = Some("must not be empty".into());
        return Err(err);
    }
    Ok(())
}

/// Fields accepted when registering equipment.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateItemInput {
    #[validate(custom = "not_blank")]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub category: Category,
    #[validate(range(min = 1, max = 500))]
    pub quantity: i32,
    #[serde(default)]
    pub ownership_type: OwnershipType,
    pub lender_name: Option<String>,
    pub lender_contact: Option<String>,
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub assignment_type: AssignmentType,
    /// Defaults to GOOD.
    pub condition: Option<ItemCondition>,
    pub observations: Option<String>,
    /// Prefix for individually coded units; the name is used when absent.
    pub code_prefix: Option<String>,
}

/// Descriptive fields an editor may change. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateItemInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub quantity: Option<i32>,
    pub ownership_type: Option<OwnershipType>,
    pub lender_name: Option<String>,
    pub lender_contact: Option<String>,
    pub assigned_to: Option<String>,
    pub assignment_type: Option<AssignmentType>,
    pub observations: Option<String>,
    /// When set, the update only applies if the item is still at this version.
    pub expected_version: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ItemFilters {
    pub category: Option<Category>,
    pub ownership_type: Option<OwnershipType>,
    pub state: Option<ItemState>,
    /// Case-insensitive substring over name, description, code, holder and assignee.
    #[serde(alias = "q")]
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatedItems {
    pub created_count: usize,
    pub items: Vec<item::Model>,
}

/// Normalizes a code prefix: ASCII alphanumerics only, uppercased, at most six characters.
pub fn normalize_code_prefix(raw: &str) -> Result<String, ServiceError> {
    let prefix: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(MAX_PREFIX_LEN)
        .collect();

    if prefix.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "code_prefix: '{}' contains no letters or digits",
            raw
        )));
    }
    Ok(prefix)
}

/// Codes `PREFIX-001` through `PREFIX-{count}`.
pub fn generate_codes(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|n| format!("{}-{:03}", prefix, n)).collect()
}

fn lender_required(ownership: OwnershipType, lender_name: &Option<String>) -> Result<(), ServiceError> {
    if ownership == OwnershipType::Borrowed && lender_name.is_none() {
        return Err(ServiceError::ValidationError(
            "lender_name: required for borrowed items".to_string(),
        ));
    }
    Ok(())
}

fn unique_code_violation(err: sea_orm::DbErr) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::ValidationError(
            "code: an item with this code already exists in the activity".to_string(),
        ),
        _ => ServiceError::DatabaseError(err),
    }
}

#[derive(Clone)]
pub struct ItemService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    max_batch_size: usize,
}

impl ItemService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db,
            event_sender,
            max_batch_size: MAX_QUANTITY as usize,
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Registers equipment for an activity.
    ///
    /// With `create_individual_units` and a quantity above one, one record per
    /// physical unit is created, each carrying its own code. Otherwise a single
    /// consolidated record holds the whole quantity.
    #[instrument(skip(self, input), fields(activity_id = %activity_id, quantity = input.quantity))]
    pub async fn create(
        &self,
        caps: &Capabilities,
        activity_id: Uuid,
        input: CreateItemInput,
        create_individual_units: bool,
    ) -> Result<CreatedItems, ServiceError> {
        Capabilities::require(caps.can_create, "create items")?;
        input.validate()?;

        let borrowed = input.ownership_type == OwnershipType::Borrowed;
        let lender_name = non_blank(input.lender_name.clone()).filter(|_| borrowed);
        lender_required(input.ownership_type, &lender_name)?;

        let now = Utc::now();
        let template = item::Model {
            id: Uuid::nil(),
            activity_id,
            name: input.name.trim().to_string(),
            description: non_blank(input.description.clone()),
            category: input.category,
            quantity: input.quantity,
            code: None,
            ownership_type: input.ownership_type,
            lender_name,
            lender_contact: non_blank(input.lender_contact.clone()).filter(|_| borrowed),
            assigned_to: non_blank(input.assigned_to.clone()),
            assignment_type: input.assignment_type,
            current_holder: None,
            state: ItemState::Available,
            condition: input.condition.unwrap_or_default(),
            returned: false,
            returned_at: None,
            observations: non_blank(input.observations.clone()),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let records: Vec<item::Model> = if create_individual_units && input.quantity > 1 {
            let count = input.quantity as usize;
            if count > self.max_batch_size {
                return Err(ServiceError::ValidationError(format!(
                    "quantity: at most {} individually coded units per request",
                    self.max_batch_size
                )));
            }
            let prefix =
                normalize_code_prefix(input.code_prefix.as_deref().unwrap_or(&input.name))?;
            generate_codes(&prefix, count)
                .into_iter()
                .map(|code| item::Model {
                    id: Uuid::new_v4(),
                    quantity: 1,
                    code: Some(code),
                    ..template.clone()
                })
                .collect()
        } else {
            vec![item::Model {
                id: Uuid::new_v4(),
                ..template
            }]
        };

        let codes: Vec<String> = records.iter().filter_map(|r| r.code.clone()).collect();
        let to_insert = records.clone();

        DatabaseAccess::new(self.db.clone())
            .transaction(move |txn| {
                Box::pin(async move {
                    if !codes.is_empty() {
                        let clash = item::Entity::find()
                            .filter(item::Column::ActivityId.eq(activity_id))
                            .filter(item::Column::Code.is_in(codes))
                            .order_by_asc(item::Column::Code)
                            .one(txn)
                            .await?;
                        if let Some(existing) = clash {
                            return Err(ServiceError::ValidationError(format!(
                                "code: {} already exists in this activity",
                                existing.code.unwrap_or_default()
                            )));
                        }
                    }

                    item::Entity::insert_many(
                        to_insert.into_iter().map(item::ActiveModel::from),
                    )
                    .exec(txn)
                    .await
                    .map_err(unique_code_violation)?;

                    Ok::<_, ServiceError>(())
                })
            })
            .await
            .map_err(|e| {
                warn!(error = %e, "item registration rejected");
                e
            })?;

        counter!("custody.items.created", records.len() as u64);
        info!(count = records.len(), "items registered");

        self.event_sender
            .send_or_log(Event::ItemsCreated {
                activity_id,
                item_ids: records.iter().map(|r| r.id).collect(),
            })
            .await;

        Ok(CreatedItems {
            created_count: records.len(),
            items: records,
        })
    }

    /// Edits descriptive fields. Lifecycle fields are owned by the custody,
    /// incident and return workflows and cannot be changed here.
    #[instrument(skip(self, input), fields(item_id = %id))]
    pub async fn update(
        &self,
        caps: &Capabilities,
        id: Uuid,
        input: UpdateItemInput,
    ) -> Result<item::Model, ServiceError> {
        Capabilities::require(caps.can_edit, "edit items")?;

        let updated = DatabaseAccess::new(self.db.clone())
            .transaction(move |txn| {
                Box::pin(async move {
                    let current = find_item(txn, id).await?;
                    if let Some(expected) = input.expected_version {
                        if expected != current.version {
                            return Err(ServiceError::ConcurrentModification(id));
                        }
                    }

                    let changes = merge_update(&current, input)?;
                    write_projection(txn, &current, changes).await
                })
            })
            .await?;

        info!(item_id = %id, version = updated.version, "item updated");
        self.event_sender.send_or_log(Event::ItemUpdated(id)).await;
        Ok(updated)
    }

    /// Removes an item together with its custody chain and incidents.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn delete(&self, caps: &Capabilities, id: Uuid) -> Result<(), ServiceError> {
        Capabilities::require(caps.can_delete, "delete items")?;

        DatabaseAccess::new(self.db.clone())
            .transaction(move |txn| {
                Box::pin(async move {
                    find_item(txn, id).await?;

                    custody_transfer::Entity::delete_many()
                        .filter(custody_transfer::Column::ItemId.eq(id))
                        .exec(txn)
                        .await?;
                    incident::Entity::delete_many()
                        .filter(incident::Column::ItemId.eq(id))
                        .exec(txn)
                        .await?;
                    item::Entity::delete_by_id(id).exec(txn).await?;

                    Ok::<_, ServiceError>(())
                })
            })
            .await?;

        info!(item_id = %id, "item deleted");
        self.event_sender.send_or_log(Event::ItemDeleted(id)).await;
        Ok(())
    }

    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn get(&self, caps: &Capabilities, id: Uuid) -> Result<item::Model, ServiceError> {
        Capabilities::require(caps.can_read, "view items")?;
        find_item(self.db.as_ref(), id).await
    }

    #[instrument(skip(self))]
    pub async fn get_by_code(
        &self,
        caps: &Capabilities,
        activity_id: Uuid,
        code: &str,
    ) -> Result<item::Model, ServiceError> {
        Capabilities::require(caps.can_read, "view items")?;

        let code = code.trim().to_ascii_uppercase();
        item::Entity::find()
            .filter(item::Column::ActivityId.eq(activity_id))
            .filter(item::Column::Code.eq(code.as_str()))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item with code {} not found", code)))
    }

    /// Lists an activity's items, one page at a time. `page` starts at 1.
    #[instrument(skip(self, filters))]
    pub async fn list(
        &self,
        caps: &Capabilities,
        activity_id: Uuid,
        filters: &ItemFilters,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<item::Model>, u64), ServiceError> {
        Capabilities::require(caps.can_read, "view items")?;

        let limit = limit.max(1);
        let page_index = page.max(1) - 1;
        limit
            .checked_mul(page_index)
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or_else(|| ServiceError::ValidationError("page: out of range".to_string()))?;

        let mut query = item::Entity::find().filter(item::Column::ActivityId.eq(activity_id));

        if let Some(category) = filters.category {
            query = query.filter(item::Column::Category.eq(category));
        }
        if let Some(ownership) = filters.ownership_type {
            query = query.filter(item::Column::OwnershipType.eq(ownership));
        }
        if let Some(state) = filters.state {
            query = query.filter(item::Column::State.eq(state));
        }
        if let Some(search) = non_blank(filters.search.clone()) {
            let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
            let mut any = Condition::any();
            for column in [
                item::Column::Name,
                item::Column::Description,
                item::Column::Code,
                item::Column::CurrentHolder,
                item::Column::AssignedTo,
            ] {
                any = any.add(
                    Expr::expr(Func::lower(Expr::col(column)))
                        .like(LikeExpr::new(pattern.clone()).escape(LIKE_ESCAPE)),
                );
            }
            query = query.filter(any);
        }

        let paginator = query
            .order_by_asc(item::Column::Name)
            .order_by_asc(item::Column::Code)
            .order_by_asc(item::Column::Id)
            .paginate(self.db.as_ref(), limit);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page_index).await?;

        Ok((items, total))
    }
}

/// Makes `%` and `_` in search text match themselves.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Applies an update to the stored record and validates the merged result.
fn merge_update(
    current: &item::Model,
    input: UpdateItemInput,
) -> Result<item::ActiveModel, ServiceError> {
    let mut changes = item::ActiveModel::default();

    if let Some(name) = input.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "name: must not be empty".to_string(),
            ));
        }
        changes.name = Set(name);
    }
    if let Some(description) = input.description {
        changes.description = Set(non_blank(Some(description)));
    }
    if let Some(category) = input.category {
        changes.category = Set(category);
    }
    if let Some(quantity) = input.quantity {
        if !(1..=MAX_QUANTITY).contains(&quantity) {
            return Err(ServiceError::ValidationError(format!(
                "quantity: must be between 1 and {}",
                MAX_QUANTITY
            )));
        }
        if current.code.is_some() && quantity != 1 {
            return Err(ServiceError::ValidationError(
                "quantity: individually coded units always have quantity 1".to_string(),
            ));
        }
        changes.quantity = Set(quantity);
    }
    if let Some(assigned_to) = input.assigned_to {
        changes.assigned_to = Set(non_blank(Some(assigned_to)));
    }
    if let Some(assignment_type) = input.assignment_type {
        changes.assignment_type = Set(assignment_type);
    }
    if let Some(observations) = input.observations {
        changes.observations = Set(non_blank(Some(observations)));
    }

    let ownership = input.ownership_type.unwrap_or(current.ownership_type);
    match ownership {
        OwnershipType::Owned => {
            if current.returned {
                return Err(ServiceError::InvalidTransition {
                    event: "change the ownership of".to_string(),
                    state: ItemState::Returned.as_ref().to_string(),
                });
            }
            if current.ownership_type != OwnershipType::Owned {
                changes.ownership_type = Set(OwnershipType::Owned);
                changes.lender_name = Set(None);
                changes.lender_contact = Set(None);
            }
        }
        OwnershipType::Borrowed => {
            let lender_name = match input.lender_name {
                Some(name) => non_blank(Some(name)),
                None => current.lender_name.clone(),
            };
            lender_required(ownership, &lender_name)?;

            if current.ownership_type != OwnershipType::Borrowed {
                changes.ownership_type = Set(OwnershipType::Borrowed);
            }
            changes.lender_name = Set(lender_name);
            if let Some(contact) = input.lender_contact {
                changes.lender_contact = Set(non_blank(Some(contact)));
            }
        }
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn prefix_is_normalized() {
        assert_eq!(normalize_code_prefix("ext").unwrap(), "EXT");
        assert_eq!(normalize_code_prefix("Extension cord").unwrap(), "EXTENS");
        assert_eq!(normalize_code_prefix("a-b c_d").unwrap(), "ABCD");
        assert!(matches!(
            normalize_code_prefix("--- !"),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100% cotton"), "100\\% cotton");
        assert_eq!(escape_like("tent_pole"), "tent\\_pole");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("lantern"), "lantern");
    }

    #[test]
    fn codes_are_numbered_from_one() {
        assert_eq!(
            generate_codes("EXT", 3),
            vec!["EXT-001", "EXT-002", "EXT-003"]
        );
        assert_eq!(generate_codes("T", 500).last().unwrap(), "T-500");
    }

    fn stored(ownership: OwnershipType) -> item::Model {
        let now = Utc::now();
        item::Model {
            id: Uuid::new_v4(),
            activity_id: Uuid::new_v4(),
            name: "Tent".into(),
            description: None,
            category: Category::Camping,
            quantity: 1,
            code: Some("TENT-001".into()),
            ownership_type: ownership,
            lender_name: Some("Council store".into()),
            lender_contact: Some("store@example.org".into()),
            assigned_to: None,
            assignment_type: AssignmentType::Unassigned,
            current_holder: None,
            state: ItemState::Available,
            condition: ItemCondition::Good,
            returned: false,
            returned_at: None,
            observations: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn switching_to_owned_clears_lender() {
        let changes = merge_update(
            &stored(OwnershipType::Borrowed),
            UpdateItemInput {
                ownership_type: Some(OwnershipType::Owned),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(changes.lender_name, Set(None));
        assert_eq!(changes.lender_contact, Set(None));
    }

    #[test]
    fn returned_items_cannot_become_owned() {
        let mut returned = stored(OwnershipType::Borrowed);
        returned.returned = true;
        returned.state = ItemState::Returned;

        let err = merge_update(
            &returned,
            UpdateItemInput {
                ownership_type: Some(OwnershipType::Owned),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition { .. }));
    }

    #[test]
    fn coded_units_keep_quantity_one() {
        let err = merge_update(
            &stored(OwnershipType::Owned),
            UpdateItemInput {
                quantity: Some(4),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn clearing_lender_of_borrowed_item_is_rejected() {
        let err = merge_update(
            &stored(OwnershipType::Borrowed),
            UpdateItemInput {
                lender_name: Some("  ".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("lender_name"));
    }

    proptest! {
        #[test]
        fn generated_codes_are_distinct_and_prefixed(raw in "[a-zA-Z0-9 _-]{1,20}", count in 1usize..=500) {
            prop_assume!(raw.chars().any(|c| c.is_ascii_alphanumeric()));
            let prefix = normalize_code_prefix(&raw).unwrap();
            prop_assert!(prefix.len() <= 6);

            let codes = generate_codes(&prefix, count);
            let unique: std::collections::HashSet<_> = codes.iter().collect();
            prop_assert_eq!(unique.len(), count);
            let expected_prefix = format!("{}-", prefix);
            prop_assert!(codes.iter().all(|c| c.starts_with(&expected_prefix)));
        }
    }
}
