use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A piece of equipment tracked for an activity.
///
/// `state`, `condition`, `current_holder`, `returned` and `returned_at` form the
/// mutable projection; they are only written by the lifecycle services.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub activity_id: Uuid,
    pub name: String,
    #[sea_orm(nullable)]
    pub description: Option<String>,
    pub category: Category,
    pub quantity: i32,
    #[sea_orm(nullable)]
    pub code: Option<String>,
    pub ownership_type: OwnershipType,
    #[sea_orm(nullable)]
    pub lender_name: Option<String>,
    #[sea_orm(nullable)]
    pub lender_contact: Option<String>,
    #[sea_orm(nullable)]
    pub assigned_to: Option<String>,
    pub assignment_type: AssignmentType,
    #[sea_orm(nullable)]
    pub current_holder: Option<String>,
    pub state: ItemState,
    pub condition: ItemCondition,
    pub returned: bool,
    #[sea_orm(nullable)]
    pub returned_at: Option<DateTime<Utc>>,
    #[sea_orm(column_type = "Text", nullable)]
    pub observations: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::custody_transfer::Entity")]
    CustodyTransfers,
    #[sea_orm(has_many = "super::incident::Entity")]
    Incidents,
}

impl Related<super::custody_transfer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CustodyTransfers.def()
    }
}

impl Related<super::incident::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Incidents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_borrowed(&self) -> bool {
        self.ownership_type == OwnershipType::Borrowed
    }

    /// Label recorded as the previous holder when nobody holds the item yet:
    /// the lender for borrowed equipment, nobody (the organization) otherwise.
    pub fn default_holder(&self) -> Option<String> {
        if self.is_borrowed() {
            self.lender_name.clone()
        } else {
            None
        }
    }

    /// Whoever physically has the item right now, falling back to the default holder.
    pub fn effective_holder(&self) -> Option<String> {
        self.current_holder
            .clone()
            .or_else(|| self.default_holder())
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::AsRefStr,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    #[default]
    #[sea_orm(string_value = "general")]
    General,
    #[sea_orm(string_value = "electrical")]
    Electrical,
    #[sea_orm(string_value = "camping")]
    Camping,
    #[sea_orm(string_value = "kitchen")]
    Kitchen,
    #[sea_orm(string_value = "first_aid")]
    FirstAid,
    #[sea_orm(string_value = "tools")]
    Tools,
    #[sea_orm(string_value = "decor")]
    Decor,
    #[sea_orm(string_value = "other")]
    Other,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::AsRefStr,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnershipType {
    #[default]
    #[sea_orm(string_value = "owned")]
    Owned,
    #[sea_orm(string_value = "borrowed")]
    Borrowed,
}

/// Administrative assignment, independent of who physically holds the item.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::AsRefStr,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentType {
    #[sea_orm(string_value = "subcamp")]
    Subcamp,
    #[sea_orm(string_value = "patrol")]
    Patrol,
    #[sea_orm(string_value = "leader")]
    Leader,
    #[sea_orm(string_value = "work_team")]
    WorkTeam,
    #[default]
    #[sea_orm(string_value = "unassigned")]
    Unassigned,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::AsRefStr,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemState {
    #[sea_orm(string_value = "available")]
    Available,
    #[sea_orm(string_value = "in_use")]
    InUse,
    #[sea_orm(string_value = "damaged")]
    Damaged,
    #[sea_orm(string_value = "written_off")]
    WrittenOff,
    #[sea_orm(string_value = "returned")]
    Returned,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::AsRefStr,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemCondition {
    #[sea_orm(string_value = "new")]
    New,
    #[default]
    #[sea_orm(string_value = "good")]
    Good,
    #[sea_orm(string_value = "fair")]
    Fair,
    #[sea_orm(string_value = "poor")]
    Poor,
    #[sea_orm(string_value = "write_off")]
    WriteOff,
}

impl ItemCondition {
    /// Conditions that flag the item for downstream reporting.
    pub fn is_degraded(self) -> bool {
        matches!(self, ItemCondition::Poor | ItemCondition::WriteOff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_defaults() {
        assert_eq!(Category::default(), Category::General);
        assert_eq!(OwnershipType::default(), OwnershipType::Owned);
        assert_eq!(AssignmentType::default(), AssignmentType::Unassigned);
        assert_eq!(ItemCondition::default(), ItemCondition::Good);
        assert!(!ItemCondition::default().is_degraded());
    }
}
