//! `SeaORM` Entity for attachments table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "attachments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub hash: String,
    pub channel: String,
    pub nickname: String,
    pub ip: String,
    pub name: String,
    pub path: String,
    pub size: i64,
    pub mime: Option<String>,
    pub file_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub status: String,
    pub reg_date: DateTimeWithTimeZone,
    pub exp_date: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
