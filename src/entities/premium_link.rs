use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "premium_links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub wallet_address: String,
    #[sea_orm(unique)]
    pub profile_id: String,
    pub linked_at: DateTimeWithTimeZone,
    pub is_active: bool,
    pub deactivated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
