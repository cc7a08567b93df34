use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::enums::Severity;
use super::reference::{Competence, Labeled, OutbreakType, RegionView};
use crate::schema::outbreak;

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = outbreak)]
pub struct Outbreak {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub outbreak_type_id: Option<i32>,
    pub severity: Severity,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub general_information: Option<Value>,
    pub detailed_information: Option<Value>,
    pub eligibility_criteria: Option<Value>,
    pub requirements: Option<Value>,
    pub other_information: Option<Value>,
    #[serde(skip_serializing)]
    pub report_path: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = outbreak)]
pub struct NewOutbreak {
    pub name: String,
    pub description: String,
    pub outbreak_type_id: Option<i32>,
    pub severity: Severity,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub general_information: Option<Value>,
    pub detailed_information: Option<Value>,
    pub eligibility_criteria: Option<Value>,
    pub requirements: Option<Value>,
    pub other_information: Option<Value>,
}

#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = outbreak)]
pub struct OutbreakChangeset {
    pub name: Option<String>,
    pub description: Option<String>,
    pub outbreak_type_id: Option<i32>,
    pub severity: Option<Severity>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub general_information: Option<Value>,
    pub detailed_information: Option<Value>,
    pub eligibility_criteria: Option<Value>,
    pub requirements: Option<Value>,
    pub other_information: Option<Value>,
    pub report_path: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Deserialize, Debug)]
pub struct OutbreakInput {
    pub name: String,
    pub description: String,
    pub outbreak_type_id: Option<i32>,
    pub severity: Severity,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub competencies: Vec<i32>,
    #[serde(default)]
    pub affected_regions: Vec<i32>,
    pub general_information: Option<Value>,
    pub detailed_information: Option<Value>,
    pub eligibility_criteria: Option<Value>,
    pub requirements: Option<Value>,
    pub other_information: Option<Value>,
}

impl OutbreakInput {
    pub fn split(self) -> (NewOutbreak, Vec<i32>, Vec<i32>) {
        let row = NewOutbreak {
            name: self.name,
            description: self.description,
            outbreak_type_id: self.outbreak_type_id,
            severity: self.severity,
            start_date: self.start_date,
            end_date: self.end_date,
            general_information: self.general_information,
            detailed_information: self.detailed_information,
            eligibility_criteria: self.eligibility_criteria,
            requirements: self.requirements,
            other_information: self.other_information,
        };
        (row, self.competencies, self.affected_regions)
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct OutbreakUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub outbreak_type_id: Option<i32>,
    pub severity: Option<Severity>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub competencies: Option<Vec<i32>>,
    pub affected_regions: Option<Vec<i32>>,
    pub general_information: Option<Value>,
    pub detailed_information: Option<Value>,
    pub eligibility_criteria: Option<Value>,
    pub requirements: Option<Value>,
    pub other_information: Option<Value>,
}

impl OutbreakUpdate {
    pub fn split(
        self,
        now: NaiveDateTime,
    ) -> (OutbreakChangeset, Option<Vec<i32>>, Option<Vec<i32>>) {
        let changeset = OutbreakChangeset {
            name: self.name,
            description: self.description,
            outbreak_type_id: self.outbreak_type_id,
            severity: self.severity,
            start_date: self.start_date,
            end_date: self.end_date,
            general_information: self.general_information,
            detailed_information: self.detailed_information,
            eligibility_criteria: self.eligibility_criteria,
            requirements: self.requirements,
            other_information: self.other_information,
            report_path: None,
            updated_at: Some(now),
        };
        (changeset, self.competencies, self.affected_regions)
    }
}

#[derive(Serialize, Debug)]
pub struct OutbreakView {
    #[serde(flatten)]
    pub outbreak: Outbreak,
    #[serde(rename = "type")]
    pub outbreak_type: Option<Labeled<OutbreakType>>,
    pub competencies: Vec<i32>,
    pub competencies_objects: Vec<Labeled<Competence>>,
    pub affected_regions: Vec<i32>,
    pub affected_regions_objects: Vec<RegionView>,
    pub has_report: bool,
    pub value: i32,
    pub label: String,
}

#[derive(Queryable, Serialize, Debug)]
pub struct OutbreakOption {
    pub value: i32,
    pub label: String,
}
