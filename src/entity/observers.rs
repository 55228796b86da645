use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "iom_waarnemer")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub initialen: Option<String>,
    pub voornaam: Option<String>,
    pub tussenvoegsel: Option<String>,
    pub achternaam: String,
    pub email: Option<String>,
    pub telefoon: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::observations::Entity")]
    Observations,
}

impl Related<super::observations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Observations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
