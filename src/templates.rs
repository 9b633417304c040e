use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tracing::info;

use crate::types::DataKind;

const APPLICATIONS: &str = "\
applicant_name,email,phone,gender,address,housing_type,has_yard,yard_size_sqm,family_members,all_family_members_agree,experience_level,has_other_pets,other_pets_description,motivation,animal_applied_for,status
Jane Smith,jane@example.com,555-0101,female,12 Oak Street,House,true,120,\"Two adults, one teenager\",true,Experienced,true,One calm senior cat,\"I work from home and have fostered anxious dogs before.\",Bella,Pending
";

const DOGS: &str = "\
name,breed,age,weight_kg,sex,rescue_date,adoption_status,rescue_organization,behavioral_notes,medical_history
Bella,Labrador mix,3,24.5,female,2025-01-15,available,Happy Paws Rescue,\"Gentle, anxious when left alone\",\"Spayed; vaccinations up to date\"
";

const OUTCOMES: &str = "\
dog_id,application_id,outcome,outcome_reason,success_factors,failure_factors,adoption_date,return_date,adopter_satisfaction_score,dog_difficulty_level,adopter_experience_level,match_score
dog-001,app-101,success,Settled well,\"Home all day, prior experience\",,2025-02-01,,5,moderate,experienced,0.92
";

/// Sample CSV (header plus one example row) for kinds that accept uploads.
pub fn template(kind: DataKind) -> Option<&'static str> {
    match kind {
        DataKind::Applications => Some(APPLICATIONS),
        DataKind::Dogs => Some(DOGS),
        DataKind::Outcomes => Some(OUTCOMES),
        DataKind::MedicalDocuments => None,
    }
}

/// Suggested file name for the save dialog.
pub fn file_name(kind: DataKind) -> String {
    format!("{}_template.csv", kind.path().replace('-', "_"))
}

pub async fn write_template(kind: DataKind, path: &Path) -> Result<()> {
    let contents = template(kind).ok_or_else(|| anyhow!("no CSV template for {}", kind.path()))?;
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("writing template to {}", path.display()))?;
    info!(kind = kind.path(), path = %path.display(), "CSV template saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploadable_kinds_have_templates() {
        for kind in DataKind::ALL {
            assert_eq!(template(kind).is_some(), kind.supports_csv(), "{kind:?}");
        }
    }

    #[test]
    fn application_template_has_required_columns() {
        let header = APPLICATIONS.lines().next().unwrap();
        let columns: Vec<&str> = header.split(',').collect();
        for required in ["applicant_name", "email", "phone", "housing_type", "motivation"] {
            assert!(columns.contains(&required), "{required}");
        }
    }

    #[test]
    fn file_names_follow_kind() {
        assert_eq!(file_name(DataKind::Applications), "applications_template.csv");
        assert_eq!(file_name(DataKind::Outcomes), "outcomes_template.csv");
    }

    #[tokio::test]
    async fn writes_template_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dogs.csv");
        write_template(DataKind::Dogs, &path).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("name,breed,age"));
        assert_eq!(written.lines().count(), 2);
    }

    #[tokio::test]
    async fn medical_documents_have_no_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medical.csv");
        assert!(write_template(DataKind::MedicalDocuments, &path).await.is_err());
        assert!(!path.exists());
    }
}
