use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::CompetenceType;
use crate::schema::{
    academic_qualification_type, competence, country, language, occupation, occupation_category,
    outbreak_type, region, specialization,
};

/// Lookup rows rendered as `{value, label}` pairs by the frontend selects.
pub trait Lookup {
    fn lookup_value(&self) -> i32;
    fn lookup_label(&self) -> String;
}

#[derive(Serialize, Debug, Clone)]
pub struct Labeled<T> {
    #[serde(flatten)]
    pub item: T,
    pub value: i32,
    pub label: String,
}

impl<T: Lookup> Labeled<T> {
    pub fn new(item: T) -> Self {
        Self {
            value: item.lookup_value(),
            label: item.lookup_label(),
            item,
        }
    }
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = country)]
pub struct Country {
    pub id: i32,
    pub name: String,
    pub phone_code: String,
}

#[derive(Insertable, AsChangeset, Deserialize, Debug)]
#[diesel(table_name = country)]
pub struct CountryInput {
    pub name: String,
    pub phone_code: String,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = region)]
pub struct Region {
    pub id: i32,
    pub name: String,
    pub country_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, AsChangeset, Deserialize, Debug)]
#[diesel(table_name = region)]
pub struct RegionInput {
    pub name: String,
    pub country_id: i32,
}

/// Region with its country nested, as every read endpoint returns it.
#[derive(Serialize, Debug, Clone)]
pub struct RegionView {
    pub id: i32,
    pub name: String,
    pub country: Labeled<Country>,
    pub value: i32,
    pub label: String,
}

impl RegionView {
    pub fn new(region: Region, country: Country) -> Self {
        Self {
            id: region.id,
            value: region.id,
            label: region.name.clone(),
            name: region.name,
            country: Labeled::new(country),
        }
    }
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = occupation)]
pub struct Occupation {
    pub id: i32,
    pub name: String,
    pub category_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, AsChangeset, Deserialize, Debug)]
#[diesel(table_name = occupation, treat_none_as_null = true)]
pub struct OccupationInput {
    pub name: String,
    pub category_id: Option<i32>,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = specialization)]
pub struct Specialization {
    pub id: i32,
    pub name: String,
    pub occupation_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, AsChangeset, Deserialize, Debug)]
#[diesel(table_name = specialization, treat_none_as_null = true)]
pub struct SpecializationInput {
    pub name: String,
    pub occupation_id: Option<i32>,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = competence)]
pub struct Competence {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub competence_type: CompetenceType,
    pub specialization_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, AsChangeset, Deserialize, Debug)]
#[diesel(table_name = competence, treat_none_as_null = true)]
pub struct CompetenceInput {
    pub name: String,
    #[serde(rename = "type", default)]
    pub competence_type: CompetenceType,
    pub specialization_id: Option<i32>,
}

/// Name-only lookup tables share one shape.
macro_rules! named_lookup {
    ($row:ident, $input:ident, $table:ident) => {
        #[derive(Queryable, Selectable, Serialize, Debug, Clone)]
        #[diesel(table_name = $table)]
        pub struct $row {
            pub id: i32,
            pub name: String,
            pub created_at: NaiveDateTime,
            pub updated_at: NaiveDateTime,
        }

        #[derive(Insertable, AsChangeset, Deserialize, Debug)]
        #[diesel(table_name = $table)]
        pub struct $input {
            pub name: String,
        }

        impl Lookup for $row {
            fn lookup_value(&self) -> i32 {
                self.id
            }

            fn lookup_label(&self) -> String {
                self.name.clone()
            }
        }
    };
}

named_lookup!(OccupationCategory, OccupationCategoryInput, occupation_category);
named_lookup!(Language, LanguageInput, language);
named_lookup!(AcademicQualificationType, AcademicQualificationTypeInput, academic_qualification_type);
named_lookup!(OutbreakType, OutbreakTypeInput, outbreak_type);

impl Lookup for Country {
    fn lookup_value(&self) -> i32 {
        self.id
    }

    fn lookup_label(&self) -> String {
        self.name.clone()
    }
}

impl Lookup for Occupation {
    fn lookup_value(&self) -> i32 {
        self.id
    }

    fn lookup_label(&self) -> String {
        self.name.clone()
    }
}

impl Lookup for Specialization {
    fn lookup_value(&self) -> i32 {
        self.id
    }

    fn lookup_label(&self) -> String {
        self.name.clone()
    }
}

impl Lookup for Competence {
    fn lookup_value(&self) -> i32 {
        self.id
    }

    fn lookup_label(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_flattens_item_fields() {
        let country = Country {
            id: 3,
            name: "Kenya".to_string(),
            phone_code: "+254".to_string(),
        };
        let json = serde_json::to_value(Labeled::new(country)).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["value"], 3);
        assert_eq!(json["label"], "Kenya");
        assert_eq!(json["phone_code"], "+254");
    }
}
