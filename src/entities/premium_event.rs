//! Outbox rows for premium lifecycle events.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "premium_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_type = "String(StringLen::N(64))")]
    pub event_type: String,
    #[sea_orm(column_type = "String(StringLen::N(42))")]
    pub wallet_address: String,
    pub payload: Json,
    /// When the event happened in the linking flow
    pub occurred_at: DateTimeWithTimeZone,
    /// When the dispatcher wrote it to the outbox
    pub recorded_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
