//! Medical profile merge applied when a student's record moves schools.
//!
//! The transferred value wins, but an empty or blank transferred value never
//! erases what the destination already holds.

use crate::entities::student;
use sea_orm::Set;

/// The medical and emergency-contact fields of a student profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthProfile {
    /// Blood group
    pub blood_group: Option<String>,
    /// Known allergies
    pub allergies: Option<String>,
    /// Current medications
    pub medications: Option<String>,
    /// Emergency contact name
    pub emergency_contact_name: Option<String>,
    /// Emergency contact phone number
    pub emergency_contact_phone: Option<String>,
    /// Emergency contact relationship
    pub emergency_contact_relationship: Option<String>,
    /// Free-form medical notes
    pub medical_notes: Option<String>,
}

impl From<&student::Model> for HealthProfile {
    fn from(student: &student::Model) -> Self {
        Self {
            blood_group: student.blood_group.clone(),
            allergies: student.allergies.clone(),
            medications: student.medications.clone(),
            emergency_contact_name: student.emergency_contact_name.clone(),
            emergency_contact_phone: student.emergency_contact_phone.clone(),
            emergency_contact_relationship: student.emergency_contact_relationship.clone(),
            medical_notes: student.medical_notes.clone(),
        }
    }
}

impl HealthProfile {
    /// Merges `incoming` over `self`, keeping `self`'s value wherever the
    /// incoming one is missing or blank.
    #[must_use]
    pub fn merged_with(&self, incoming: &Self) -> Self {
        Self {
            blood_group: prefer(&incoming.blood_group, &self.blood_group),
            allergies: prefer(&incoming.allergies, &self.allergies),
            medications: prefer(&incoming.medications, &self.medications),
            emergency_contact_name: prefer(
                &incoming.emergency_contact_name,
                &self.emergency_contact_name,
            ),
            emergency_contact_phone: prefer(
                &incoming.emergency_contact_phone,
                &self.emergency_contact_phone,
            ),
            emergency_contact_relationship: prefer(
                &incoming.emergency_contact_relationship,
                &self.emergency_contact_relationship,
            ),
            medical_notes: prefer(&incoming.medical_notes, &self.medical_notes),
        }
    }

    /// Writes the profile into a student active model.
    pub fn apply_to(self, active: &mut student::ActiveModel) {
        active.blood_group = Set(self.blood_group);
        active.allergies = Set(self.allergies);
        active.medications = Set(self.medications);
        active.emergency_contact_name = Set(self.emergency_contact_name);
        active.emergency_contact_phone = Set(self.emergency_contact_phone);
        active.emergency_contact_relationship = Set(self.emergency_contact_relationship);
        active.medical_notes = Set(self.medical_notes);
    }
}

fn prefer(incoming: &Option<String>, current: &Option<String>) -> Option<String> {
    match incoming.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Some(value.to_string()),
        _ => current.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(blood: Option<&str>, allergies: Option<&str>, notes: Option<&str>) -> HealthProfile {
        HealthProfile {
            blood_group: blood.map(str::to_string),
            allergies: allergies.map(str::to_string),
            medical_notes: notes.map(str::to_string),
            ..HealthProfile::default()
        }
    }

    #[test]
    fn test_incoming_value_wins() {
        let current = profile(Some("A+"), Some("none"), None);
        let incoming = profile(Some("O-"), Some("peanuts"), Some("asthma"));

        let merged = current.merged_with(&incoming);
        assert_eq!(merged.blood_group.as_deref(), Some("O-"));
        assert_eq!(merged.allergies.as_deref(), Some("peanuts"));
        assert_eq!(merged.medical_notes.as_deref(), Some("asthma"));
    }

    #[test]
    fn test_empty_incoming_never_overwrites() {
        let current = profile(Some("A+"), Some("penicillin"), Some("wears glasses"));
        let incoming = profile(None, Some(""), Some("   "));

        let merged = current.merged_with(&incoming);
        assert_eq!(merged, current);
    }

    #[test]
    fn test_incoming_fills_gaps() {
        let current = HealthProfile::default();
        let incoming = HealthProfile {
            emergency_contact_name: Some("Ada Obi".to_string()),
            emergency_contact_phone: Some(" 0803 000 0000 ".to_string()),
            ..HealthProfile::default()
        };

        let merged = current.merged_with(&incoming);
        assert_eq!(merged.emergency_contact_name.as_deref(), Some("Ada Obi"));
        assert_eq!(merged.emergency_contact_phone.as_deref(), Some("0803 000 0000"));
        assert_eq!(merged.blood_group, None);
    }
}
