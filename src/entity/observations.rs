use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "iom_waarneming")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Category of the observation: `ec_ondiep`, `ec_diep` or `ec`
    pub naam: String,
    pub waarnemer_id: Option<i32>,
    pub locatie_id: i32,
    pub device: String,
    pub datum: DateTime,
    pub waarde: f64,
    pub foto_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::measuring_points::Entity",
        from = "Column::LocatieId",
        to = "super::measuring_points::Column::Id"
    )]
    MeasuringPoint,
    #[sea_orm(
        belongs_to = "super::observers::Entity",
        from = "Column::WaarnemerId",
        to = "super::observers::Column::Id"
    )]
    Observer,
}

impl Related<super::measuring_points::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MeasuringPoint.def()
    }
}

impl Related<super::observers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Observer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
