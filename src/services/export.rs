use csv::Writer;
use log::debug;

use crate::config::ApiError;
use crate::models::ProfileView;

const HEADER: [&str; 19] = [
    "id",
    "first_name",
    "middle_name",
    "last_name",
    "gender",
    "date_of_birth",
    "email",
    "phone",
    "id_type",
    "id_number",
    "region",
    "country",
    "occupation",
    "competencies",
    "application_status",
    "available",
    "active",
    "has_cv",
    "created_at",
];

fn csv_error(e: impl std::fmt::Display) -> ApiError {
    ApiError::InternalError(format!("Failed to write CSV: {}", e))
}

// Spreadsheets evaluate cells starting with these as formulas.
const FORMULA_PREFIXES: [char; 6] = ['=', '+', '-', '@', '\t', '\r'];

/// Free text cell, quoted with a leading `'` when it would read as a formula.
fn text_cell(value: String) -> String {
    if value.starts_with(&FORMULA_PREFIXES[..]) {
        format!("'{}", value)
    } else {
        value
    }
}

/// Renders profiles as CSV, one row per profile after the header.
pub fn profiles_csv(rows: &[ProfileView]) -> Result<Vec<u8>, ApiError> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(HEADER).map_err(csv_error)?;

    for view in rows {
        let p = &view.profile;
        let (region, country) = match &view.region_of_residence {
            Some(r) => (r.name.clone(), r.country.item.name.clone()),
            None => (String::new(), String::new()),
        };
        let occupation = view
            .occupation
            .as_ref()
            .map(|o| o.label.clone())
            .unwrap_or_default();
        let competencies = view
            .competencies_objects
            .iter()
            .map(|c| c.label.as_str())
            .collect::<Vec<_>>()
            .join("; ");

        writer
            .write_record([
                p.id.to_string(),
                text_cell(p.first_name.clone()),
                text_cell(p.middle_name.clone()),
                text_cell(p.last_name.clone()),
                p.gender.to_string(),
                p.date_of_birth.to_string(),
                text_cell(p.email.clone().unwrap_or_default()),
                text_cell(p.phone.clone().unwrap_or_default()),
                p.id_type.to_string(),
                text_cell(p.id_number.clone()),
                text_cell(region),
                text_cell(country),
                text_cell(occupation),
                text_cell(competencies),
                p.application_status.to_string(),
                p.available.to_string(),
                p.active.to_string(),
                view.has_cv.to_string(),
                p.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ])
            .map_err(csv_error)?;
    }

    let bytes = writer.into_inner().map_err(csv_error)?;
    debug!("Exported {} profiles ({} bytes)", rows.len(), bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use chrono::NaiveDate;

    fn view(id: i32, first_name: &str) -> ProfileView {
        let stamp = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        ProfileView {
            profile: Profile {
                id,
                first_name: first_name.to_string(),
                middle_name: String::new(),
                last_name: "Mugisha".to_string(),
                gender: Gender::Male,
                occupation_id: None,
                date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
                next_of_kin_name: "Aline".to_string(),
                next_of_kin_phone: "+250700000000".to_string(),
                email: Some("rde@example.org".to_string()),
                phone: None,
                user_id: None,
                id_type: IdType::NationalId,
                id_number: format!("ID-{}", id),
                region_of_residence_id: None,
                cv_path: None,
                active: true,
                available: false,
                note: String::new(),
                application_status: ApplicationStatus::ApprovalComplete,
                managerial_experience: None,
                detailed_experience: None,
                reference_contacts: None,
                created_at: stamp,
                updated_at: stamp,
            },
            occupation: None,
            region_of_residence: None,
            competencies: Vec::new(),
            competencies_objects: Vec::new(),
            recommendations: Vec::new(),
            has_cv: false,
        }
    }

    #[test]
    fn one_line_per_profile_plus_header() {
        let rows = vec![view(1, "Jean"), view(2, "Eric, Jr."), view(3, "Paul")];
        let bytes = profiles_csv(&rows).unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), HEADER.len());
        let records: Vec<_> = reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), rows.len());
        assert_eq!(&records[1][1], "Eric, Jr.");
        assert_eq!(&records[0][14], "approval_complete");
    }

    #[test]
    fn formula_like_cells_are_neutralised() {
        let mut row = view(4, "=HYPERLINK(\"http://evil\")");
        row.profile.email = Some("@SUM(A1)".to_string());
        row.profile.phone = Some("+254700000000".to_string());
        let bytes = profiles_csv(&[row]).unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[1], "'=HYPERLINK(\"http://evil\")");
        assert_eq!(&record[3], "Mugisha");
        assert_eq!(&record[6], "'@SUM(A1)");
        assert_eq!(&record[7], "'+254700000000");
    }

    #[test]
    fn empty_export_has_only_header() {
        let bytes = profiles_csv(&[]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("id,first_name"));
    }
}
