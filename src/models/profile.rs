use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::enums::{ApplicationStatus, Gender, IdType, Proficiency};
use super::reference::{
    AcademicQualificationType, Competence, Labeled, Language, Occupation, RegionView,
};
use crate::schema::{
    profile, profile_academic_qualification, profile_language, profile_recommendation,
};

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = profile)]
pub struct Profile {
    pub id: i32,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub occupation_id: Option<i32>,
    pub date_of_birth: NaiveDate,
    pub next_of_kin_name: String,
    pub next_of_kin_phone: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub user_id: Option<i32>,
    pub id_type: IdType,
    pub id_number: String,
    pub region_of_residence_id: Option<i32>,
    #[serde(skip_serializing)]
    pub cv_path: Option<String>,
    pub active: bool,
    pub available: bool,
    pub note: String,
    pub application_status: ApplicationStatus,
    pub managerial_experience: Option<Value>,
    pub detailed_experience: Option<Value>,
    pub reference_contacts: Option<Value>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Profile {
    pub fn full_name(&self) -> String {
        if self.middle_name.is_empty() {
            format!("{} {}", self.first_name, self.last_name)
        } else {
            format!("{} {} {}", self.first_name, self.middle_name, self.last_name)
        }
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = profile)]
pub struct NewProfile {
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub occupation_id: Option<i32>,
    pub date_of_birth: NaiveDate,
    pub next_of_kin_name: String,
    pub next_of_kin_phone: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub user_id: Option<i32>,
    pub id_type: IdType,
    pub id_number: String,
    pub region_of_residence_id: Option<i32>,
    pub active: bool,
    pub available: bool,
    pub note: String,
    pub application_status: ApplicationStatus,
    pub managerial_experience: Option<Value>,
    pub detailed_experience: Option<Value>,
    pub reference_contacts: Option<Value>,
}

#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = profile)]
pub struct ProfileChangeset {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<Gender>,
    pub occupation_id: Option<i32>,
    pub date_of_birth: Option<NaiveDate>,
    pub next_of_kin_name: Option<String>,
    pub next_of_kin_phone: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub user_id: Option<i32>,
    pub id_type: Option<IdType>,
    pub id_number: Option<String>,
    pub region_of_residence_id: Option<i32>,
    pub cv_path: Option<String>,
    pub active: Option<bool>,
    pub available: Option<bool>,
    pub note: Option<String>,
    pub application_status: Option<ApplicationStatus>,
    pub managerial_experience: Option<Value>,
    pub detailed_experience: Option<Value>,
    pub reference_contacts: Option<Value>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ProfileInput {
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub occupation_id: Option<i32>,
    pub date_of_birth: NaiveDate,
    pub next_of_kin_name: String,
    pub next_of_kin_phone: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Only honoured for staff; self-service profiles link to the requester.
    pub user_id: Option<i32>,
    pub id_type: IdType,
    pub id_number: String,
    pub region_of_residence_id: i32,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub note: String,
    pub application_status: Option<ApplicationStatus>,
    #[serde(default)]
    pub competencies: Vec<i32>,
    pub managerial_experience: Option<Value>,
    pub detailed_experience: Option<Value>,
    pub reference_contacts: Option<Value>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<Gender>,
    pub occupation_id: Option<i32>,
    pub date_of_birth: Option<NaiveDate>,
    pub next_of_kin_name: Option<String>,
    pub next_of_kin_phone: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub user_id: Option<i32>,
    pub id_type: Option<IdType>,
    pub id_number: Option<String>,
    pub region_of_residence_id: Option<i32>,
    pub active: Option<bool>,
    pub available: Option<bool>,
    pub note: Option<String>,
    pub application_status: Option<ApplicationStatus>,
    pub competencies: Option<Vec<i32>>,
    pub managerial_experience: Option<Value>,
    pub detailed_experience: Option<Value>,
    pub reference_contacts: Option<Value>,
}

impl ProfileUpdate {
    /// Fields only an administrator may change.
    pub fn touches_admin_fields(&self) -> bool {
        self.application_status.is_some() || self.active.is_some() || self.user_id.is_some()
    }

    pub fn into_changeset(self, now: NaiveDateTime) -> (ProfileChangeset, Option<Vec<i32>>) {
        let changeset = ProfileChangeset {
            first_name: self.first_name,
            middle_name: self.middle_name,
            last_name: self.last_name,
            gender: self.gender,
            occupation_id: self.occupation_id,
            date_of_birth: self.date_of_birth,
            next_of_kin_name: self.next_of_kin_name,
            next_of_kin_phone: self.next_of_kin_phone,
            email: self.email,
            phone: self.phone,
            user_id: self.user_id,
            id_type: self.id_type,
            id_number: self.id_number,
            region_of_residence_id: self.region_of_residence_id,
            cv_path: None,
            active: self.active,
            available: self.available,
            note: self.note,
            application_status: self.application_status,
            managerial_experience: self.managerial_experience,
            detailed_experience: self.detailed_experience,
            reference_contacts: self.reference_contacts,
            updated_at: Some(now),
        };
        (changeset, self.competencies)
    }
}

/// Query-string filters shared by the list and CSV export endpoints.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProfileFilter {
    pub application_status: Option<ApplicationStatus>,
    pub region_id: Option<i32>,
    pub country_id: Option<i32>,
    pub occupation_id: Option<i32>,
    pub competence_id: Option<i32>,
    pub gender: Option<Gender>,
    pub available: Option<bool>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Serialize, Debug)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: Profile,
    pub occupation: Option<Labeled<Occupation>>,
    pub region_of_residence: Option<RegionView>,
    pub competencies: Vec<i32>,
    pub competencies_objects: Vec<Labeled<Competence>>,
    pub recommendations: Vec<RecommendationView>,
    pub has_cv: bool,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = profile_recommendation)]
pub struct Recommendation {
    pub id: i32,
    pub profile_id: i32,
    pub author_id: i32,
    pub comment: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = profile_recommendation)]
pub struct NewRecommendation {
    pub profile_id: i32,
    pub author_id: i32,
    pub comment: String,
}

#[derive(Deserialize, Debug)]
pub struct RecommendationInput {
    pub profile_id: i32,
    pub comment: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct AuthorSummary {
    pub id: i32,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct RecommendationView {
    pub id: i32,
    pub profile: i32,
    pub comment: String,
    pub author: AuthorSummary,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = profile_academic_qualification)]
pub struct AcademicQualification {
    pub id: i32,
    pub profile_id: i32,
    pub qualification_type_id: Option<i32>,
    pub institution: String,
    pub field_of_study: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, AsChangeset, Deserialize, Debug)]
#[diesel(table_name = profile_academic_qualification, treat_none_as_null = true)]
pub struct AcademicQualificationInput {
    pub profile_id: i32,
    pub qualification_type_id: Option<i32>,
    pub institution: String,
    pub field_of_study: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Serialize, Debug)]
pub struct AcademicQualificationView {
    #[serde(flatten)]
    pub qualification: AcademicQualification,
    pub qualification_type: Option<Labeled<AcademicQualificationType>>,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = profile_language)]
pub struct ProfileLanguage {
    pub id: i32,
    pub profile_id: i32,
    pub language_id: i32,
    pub proficiency: Proficiency,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, AsChangeset, Deserialize, Debug)]
#[diesel(table_name = profile_language)]
pub struct ProfileLanguageInput {
    pub profile_id: i32,
    pub language_id: i32,
    pub proficiency: Proficiency,
}

#[derive(Serialize, Debug)]
pub struct ProfileLanguageView {
    #[serde(flatten)]
    pub entry: ProfileLanguage,
    pub language: Labeled<Language>,
}
