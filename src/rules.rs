//
// rules.rs
// dicom-batch
//
// Field rule set used by the anonymizer: keyword -> replacement value, with add/remove/reset editing.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fmt;

use thiserror::Error;

/// Identifying fields blanked out by default, in display order.
pub const DEFAULT_FIELDS: [&str; 39] = [
    "PatientID",                         // (0010,0020)
    "PatientName",                       // (0010,0010)
    "PatientBirthDate",                  // (0010,0030)
    "PatientSex",                        // (0010,0040)
    "PatientAge",                        // (0010,1010)
    "PatientComments",                   // (0010,4000)
    "PatientSize",                       // (0010,1020)
    "PatientWeight",                     // (0010,1030)
    "PatientAddress",                    // (0010,1040)
    "InstitutionName",                   // (0008,0080)
    "InstitutionCodeSequence",           // (0008,0082)
    "InstitutionAddress",                // (0008,0081)
    "InstitutionalDepartmentName",       // (0008,1040)
    "OperatorsName",                     // (0008,1070)
    "DeviceID",                          // (0018,1003)
    "DeviceSerialNumber",                // (0018,1000)
    "DeviceDescription",                 // (0050,0020)
    "ReferringPhysicianName",            // (0008,0090)
    "StudyInstanceUID",                  // (0020,000D)
    "SeriesInstanceUID",                 // (0020,000E)
    "SOPInstanceUID",                    // (0008,0018)
    "AccessionNumber",                   // (0008,0050)
    "StudyID",                           // (0020,0010)
    "StudyDate",                         // (0008,0020)
    "StudyTime",                         // (0008,0030)
    "SeriesDate",                        // (0008,0021)
    "SeriesTime",                        // (0008,0031)
    "AcquisitionDate",                   // (0008,0022)
    "ContentDate",                       // (0008,0023)
    "AcquisitionDateTime",               // (0008,002A)
    "AcquisitionTime",                   // (0008,0032)
    "ContentTime",                       // (0008,0033)
    "DateOfSecondaryCapture",            // (0018,1012)
    "TimeOfSecondaryCapture",            // (0018,1014)
    "InstanceCreationDate",              // (0008,0012)
    "InstanceCreationTime",              // (0008,0013)
    "PerformedProcedureStepDescription", // (0040,0254)
    "StudyDescription",                  // (0008,1030)
    "SeriesDescription",                 // (0008,103E)
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("field name must not be empty")]
    EmptyName,

    #[error("replacement value for {0} must not be empty")]
    EmptyValue(String),

    #[error("no rule for field {0}")]
    UnknownField(String),
}

/// A single replacement: every occurrence of `name` gets `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    pub name: String,
    pub value: String,
}

impl fmt::Display for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Ordered, name-unique list of field rules.
///
/// Starts out as the built-in default set. Edits move it into a user-modified state until
/// [`FieldRuleSet::reset`] is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRuleSet {
    rules: Vec<FieldRule>,
}

impl Default for FieldRuleSet {
    fn default() -> Self {
        Self {
            rules: DEFAULT_FIELDS
                .iter()
                .map(|name| FieldRule {
                    name: (*name).to_string(),
                    value: String::new(),
                })
                .collect(),
        }
    }
}

impl FieldRuleSet {
    /// Rule set with no rules at all.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Adds a rule, or replaces the value of an existing rule in place.
    ///
    /// Both name and value are required; a rejected call leaves the set untouched.
    pub fn add(&mut self, name: &str, value: &str) -> Result<(), RuleError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RuleError::EmptyName);
        }
        if value.is_empty() {
            return Err(RuleError::EmptyValue(name.to_string()));
        }

        match self.rules.iter_mut().find(|rule| rule.name == name) {
            Some(rule) => rule.value = value.to_string(),
            None => self.rules.push(FieldRule {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
        Ok(())
    }

    /// Removes the rule named by `entry`, which is either a bare field name or a
    /// `"Name: value"` display line.
    pub fn remove(&mut self, entry: &str) -> Result<FieldRule, RuleError> {
        let name = entry.split(':').next().unwrap_or_default().trim();
        let position = self
            .rules
            .iter()
            .position(|rule| rule.name == name)
            .ok_or_else(|| RuleError::UnknownField(name.to_string()))?;
        Ok(self.rules.remove(position))
    }

    /// Discards every edit and restores the built-in defaults.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.name == name)
            .map(|rule| rule.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_blank_every_identifying_field() {
        let rules = FieldRuleSet::default();
        assert_eq!(rules.len(), DEFAULT_FIELDS.len());
        assert!(rules.iter().all(|r| r.value.is_empty()));
        assert_eq!(rules.iter().next().unwrap().name, "PatientID");
        assert!(rules.is_default());
    }

    #[test]
    fn add_requires_name_and_value() {
        let mut rules = FieldRuleSet::default();
        assert_eq!(rules.add("", "x"), Err(RuleError::EmptyName));
        assert_eq!(
            rules.add("PatientID", ""),
            Err(RuleError::EmptyValue("PatientID".into()))
        );
        assert!(rules.is_default());
    }

    #[test]
    fn add_replaces_existing_value_in_place() {
        let mut rules = FieldRuleSet::default();
        rules.add("PatientName", "ANON").unwrap();
        rules.add("StationName", "X1").unwrap();

        assert_eq!(rules.len(), DEFAULT_FIELDS.len() + 1);
        assert_eq!(rules.get("PatientName"), Some("ANON"));
        let names: Vec<_> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names[1], "PatientName");
        assert_eq!(names.last(), Some(&"StationName"));
        assert!(!rules.is_default());
    }

    #[test]
    fn remove_accepts_display_entries() {
        let mut rules = FieldRuleSet::default();
        rules.add("StationName", "X1").unwrap();
        let removed = rules.remove("StationName: X1").unwrap();
        assert_eq!(removed.value, "X1");

        rules.remove("PatientSex").unwrap();
        assert_eq!(rules.get("PatientSex"), None);
        assert_eq!(
            rules.remove("PatientSex"),
            Err(RuleError::UnknownField("PatientSex".into()))
        );
    }

    #[test]
    fn reset_restores_defaults_after_edits() {
        let mut rules = FieldRuleSet::default();
        rules.remove("PatientID").unwrap();
        rules.remove("StudyDate").unwrap();
        rules.add("PatientID", "P").unwrap();
        rules.add("Manufacturer", "M").unwrap();

        rules.reset();
        assert_eq!(rules, FieldRuleSet::default());
        let names: Vec<_> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, DEFAULT_FIELDS.to_vec());
    }

    #[test]
    fn display_matches_entry_format() {
        let rule = FieldRule {
            name: "PatientID".into(),
            value: "".into(),
        };
        assert_eq!(rule.to_string(), "PatientID: ");
    }
}
