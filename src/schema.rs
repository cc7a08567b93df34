// Database schema definitions
diesel::table! {
    country (id) {
        id -> Int4,
        name -> Varchar,
        phone_code -> Varchar,
    }
}

diesel::table! {
    region (id) {
        id -> Int4,
        name -> Varchar,
        country_id -> Int4,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    user_account (id) {
        id -> Int4,
        username -> Varchar,
        email -> Varchar,
        password_hash -> Varchar,
        first_name -> Nullable<Varchar>,
        last_name -> Nullable<Varchar>,
        phone_number -> Nullable<Varchar>,
        staff_number -> Nullable<Varchar>,
        level -> Varchar,
        is_staff -> Bool,
        is_superuser -> Bool,
        is_active -> Bool,
        email_verified -> Bool,
        attached_region_id -> Nullable<Int4>,
        otp -> Nullable<Varchar>,
        otp_used -> Bool,
        otp_issued_at -> Nullable<Timestamp>,
        otp_attempts -> Int4,
        last_login -> Nullable<Timestamp>,
        date_joined -> Timestamp,
    }
}

diesel::table! {
    refresh_token (token_id) {
        token_id -> Int4,
        user_id -> Int4,
        token -> Varchar,
        expires_at -> Timestamp,
        created_at -> Timestamp,
    }
}

diesel::table! {
    occupation_category (id) {
        id -> Int4,
        name -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    occupation (id) {
        id -> Int4,
        name -> Varchar,
        category_id -> Nullable<Int4>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    specialization (id) {
        id -> Int4,
        name -> Varchar,
        occupation_id -> Nullable<Int4>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    competence (id) {
        id -> Int4,
        name -> Varchar,
        competence_type -> Varchar,
        specialization_id -> Nullable<Int4>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    language (id) {
        id -> Int4,
        name -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    academic_qualification_type (id) {
        id -> Int4,
        name -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    outbreak_type (id) {
        id -> Int4,
        name -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    profile (id) {
        id -> Int4,
        first_name -> Varchar,
        middle_name -> Varchar,
        last_name -> Varchar,
        gender -> Varchar,
        occupation_id -> Nullable<Int4>,
        date_of_birth -> Date,
        next_of_kin_name -> Varchar,
        next_of_kin_phone -> Varchar,
        email -> Nullable<Varchar>,
        phone -> Nullable<Varchar>,
        user_id -> Nullable<Int4>,
        id_type -> Varchar,
        id_number -> Varchar,
        region_of_residence_id -> Nullable<Int4>,
        cv_path -> Nullable<Varchar>,
        active -> Bool,
        available -> Bool,
        note -> Text,
        application_status -> Varchar,
        managerial_experience -> Nullable<Jsonb>,
        detailed_experience -> Nullable<Jsonb>,
        reference_contacts -> Nullable<Jsonb>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    profile_competence (profile_id, competence_id) {
        profile_id -> Int4,
        competence_id -> Int4,
    }
}

diesel::table! {
    profile_recommendation (id) {
        id -> Int4,
        profile_id -> Int4,
        author_id -> Int4,
        comment -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    profile_academic_qualification (id) {
        id -> Int4,
        profile_id -> Int4,
        qualification_type_id -> Nullable<Int4>,
        institution -> Varchar,
        field_of_study -> Varchar,
        start_date -> Date,
        end_date -> Nullable<Date>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    profile_language (id) {
        id -> Int4,
        profile_id -> Int4,
        language_id -> Int4,
        proficiency -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    outbreak (id) {
        id -> Int4,
        name -> Varchar,
        description -> Text,
        outbreak_type_id -> Nullable<Int4>,
        severity -> Varchar,
        start_date -> Date,
        end_date -> Nullable<Date>,
        general_information -> Nullable<Jsonb>,
        detailed_information -> Nullable<Jsonb>,
        eligibility_criteria -> Nullable<Jsonb>,
        requirements -> Nullable<Jsonb>,
        other_information -> Nullable<Jsonb>,
        report_path -> Nullable<Varchar>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    outbreak_region (outbreak_id, region_id) {
        outbreak_id -> Int4,
        region_id -> Int4,
    }
}

diesel::table! {
    outbreak_competence (outbreak_id, competence_id) {
        outbreak_id -> Int4,
        competence_id -> Int4,
    }
}

diesel::table! {
    profile_deployment (id) {
        id -> Int4,
        profile_id -> Int4,
        outbreak_id -> Int4,
        region_id -> Int4,
        start_date -> Date,
        end_date -> Nullable<Date>,
        status -> Varchar,
        accepted_by_user -> Bool,
        rejected_by_user -> Bool,
        report_path -> Nullable<Varchar>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::joinable!(region -> country (country_id));
diesel::joinable!(user_account -> region (attached_region_id));
diesel::joinable!(refresh_token -> user_account (user_id));
diesel::joinable!(occupation -> occupation_category (category_id));
diesel::joinable!(specialization -> occupation (occupation_id));
diesel::joinable!(competence -> specialization (specialization_id));
diesel::joinable!(profile -> occupation (occupation_id));
diesel::joinable!(profile -> region (region_of_residence_id));
diesel::joinable!(profile -> user_account (user_id));
diesel::joinable!(profile_competence -> profile (profile_id));
diesel::joinable!(profile_competence -> competence (competence_id));
diesel::joinable!(profile_recommendation -> profile (profile_id));
diesel::joinable!(profile_recommendation -> user_account (author_id));
diesel::joinable!(profile_academic_qualification -> profile (profile_id));
diesel::joinable!(profile_academic_qualification -> academic_qualification_type (qualification_type_id));
diesel::joinable!(profile_language -> profile (profile_id));
diesel::joinable!(profile_language -> language (language_id));
diesel::joinable!(outbreak -> outbreak_type (outbreak_type_id));
diesel::joinable!(outbreak_region -> outbreak (outbreak_id));
diesel::joinable!(outbreak_region -> region (region_id));
diesel::joinable!(outbreak_competence -> outbreak (outbreak_id));
diesel::joinable!(outbreak_competence -> competence (competence_id));
diesel::joinable!(profile_deployment -> profile (profile_id));
diesel::joinable!(profile_deployment -> outbreak (outbreak_id));
diesel::joinable!(profile_deployment -> region (region_id));

diesel::allow_tables_to_appear_in_same_query!(
    country,
    region,
    user_account,
    refresh_token,
    occupation_category,
    occupation,
    specialization,
    competence,
    language,
    academic_qualification_type,
    outbreak_type,
    profile,
    profile_competence,
    profile_recommendation,
    profile_academic_qualification,
    profile_language,
    outbreak,
    outbreak_region,
    outbreak_competence,
    profile_deployment,
);
