// Lifecycle engine
pub mod lifecycle;

// Item registry and queries
pub mod dashboard;
pub mod items;

// Custody, incidents and returns
pub mod custody;
pub mod incidents;
pub mod returns;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use crate::{
    entities::{custody_transfer, item},
    errors::ServiceError,
};

/// Loads an item or fails with `NotFound`.
pub(crate) async fn find_item<C>(conn: &C, id: Uuid) -> Result<item::Model, ServiceError>
where
    C: ConnectionTrait,
{
    item::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", id)))
}

/// Writes `changes` onto the item only if nobody else has written it since
/// `current` was read, bumping the version.
pub(crate) async fn write_projection<C>(
    conn: &C,
    current: &item::Model,
    mut changes: item::ActiveModel,
) -> Result<item::Model, ServiceError>
where
    C: ConnectionTrait,
{
    changes.version = Set(current.version + 1);
    changes.updated_at = Set(Utc::now());

    let result = item::Entity::update_many()
        .set(changes)
        .filter(item::Column::Id.eq(current.id))
        .filter(item::Column::Version.eq(current.version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        tracing::warn!(item_id = %current.id, version = current.version, "stale item version");
        return Err(ServiceError::ConcurrentModification(current.id));
    }

    find_item(conn, current.id).await
}

/// Appends the next entry of an item's custody chain.
///
/// Timestamps never go backwards within a chain, so ordering by
/// (timestamp, sequence) and ordering by sequence agree.
pub(crate) async fn append_transfer<C>(
    conn: &C,
    item_id: Uuid,
    previous_holder: Option<String>,
    new_holder: String,
    note: Option<String>,
    at: DateTime<Utc>,
) -> Result<custody_transfer::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let last = custody_transfer::Entity::find()
        .filter(custody_transfer::Column::ItemId.eq(item_id))
        .order_by_desc(custody_transfer::Column::Sequence)
        .one(conn)
        .await?;

    let (sequence, timestamp) = match &last {
        Some(entry) => (entry.sequence + 1, at.max(entry.timestamp)),
        None => (1, at),
    };

    let entry = custody_transfer::Model {
        id: Uuid::new_v4(),
        item_id,
        previous_holder,
        new_holder,
        timestamp,
        sequence,
        note,
    };

    custody_transfer::Entity::insert(custody_transfer::ActiveModel::from(entry.clone()))
        .exec(conn)
        .await?;

    Ok(entry)
}

/// Trims a free-text field, mapping blank input to `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
