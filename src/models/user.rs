use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::UserLevel;
use crate::schema::{refresh_token, user_account};

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = user_account)]
pub struct UserAccount {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub staff_number: Option<String>,
    pub level: UserLevel,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub email_verified: bool,
    pub attached_region_id: Option<i32>,
    #[serde(skip_serializing)]
    pub otp: Option<String>,
    #[serde(skip_serializing)]
    pub otp_used: bool,
    #[serde(skip_serializing)]
    pub otp_issued_at: Option<NaiveDateTime>,
    #[serde(skip_serializing)]
    pub otp_attempts: i32,
    pub last_login: Option<NaiveDateTime>,
    pub date_joined: NaiveDateTime,
}

impl UserAccount {
    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = user_account)]
pub struct NewUserAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub staff_number: Option<String>,
    pub level: UserLevel,
    pub is_staff: bool,
    pub is_active: bool,
    pub attached_region_id: Option<i32>,
}

#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = user_account)]
pub struct UserChangeset {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub staff_number: Option<String>,
    pub level: Option<UserLevel>,
    pub is_staff: Option<bool>,
    pub is_active: Option<bool>,
    pub attached_region_id: Option<i32>,
}

impl UserChangeset {
    pub fn has_changes(&self) -> bool {
        self.email.is_some()
            || self.password_hash.is_some()
            || self.first_name.is_some()
            || self.last_name.is_some()
            || self.phone_number.is_some()
            || self.staff_number.is_some()
            || self.level.is_some()
            || self.is_staff.is_some()
            || self.is_active.is_some()
            || self.attached_region_id.is_some()
    }
}

#[derive(Queryable, Selectable, Serialize, Debug)]
#[diesel(table_name = refresh_token)]
pub struct RefreshToken {
    pub token_id: i32,
    pub user_id: i32,
    pub token: String,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = refresh_token)]
pub struct NewRefreshToken {
    pub user_id: i32,
    pub token: String,
    pub expires_at: NaiveDateTime,
}

// DTOs
#[derive(Deserialize, Debug)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    // Staff-only fields; ignored for self-registration.
    pub staff_number: Option<String>,
    pub level: Option<UserLevel>,
    pub is_staff: Option<bool>,
    pub attached_region_id: Option<i32>,
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub staff_number: Option<String>,
    pub level: Option<UserLevel>,
    pub is_staff: Option<bool>,
    pub is_active: Option<bool>,
    pub attached_region_id: Option<i32>,
}

impl UpdateUserRequest {
    pub fn touches_staff_fields(&self) -> bool {
        self.staff_number.is_some()
            || self.level.is_some()
            || self.is_staff.is_some()
            || self.is_active.is_some()
            || self.attached_region_id.is_some()
    }
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Debug)]
pub struct LoginResponse {
    pub token: String,
    pub refresh_token: String,
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub level: UserLevel,
    pub is_staff: bool,
    pub attached_region_id: Option<i32>,
}

#[derive(Deserialize, Debug)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Claims {
    pub sub: String, // Subject (user id)
    pub exp: usize,
    pub iat: usize,
    pub user_id: i32,
    pub username: String,
    pub level: UserLevel,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub attached_region_id: Option<i32>,
    pub attached_country_id: Option<i32>,
}

#[derive(Deserialize, Debug)]
pub struct SendEmailRequest {
    pub username: String,
}

#[derive(Deserialize, Debug)]
pub struct PasswordChangeRequest {
    pub email: String,
}

#[derive(Deserialize, Debug)]
pub struct CompletePasswordChangeRequest {
    pub username: String,
    pub otp: String,
    pub new_password: String,
}
