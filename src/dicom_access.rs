//
// dicom_access.rs
// dicom-batch
//
// Keyword-based field access shared by the processors, implemented for both in-memory and file-backed objects.
//
// Thales Matheus Mendonça Santos - November 2025

use dicom::core::value::DataSetSequence;
use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::{DefaultDicomObject, InMemDicomObject};

/// Small helper trait to read and rewrite fields by their dictionary keyword (e.g. `PatientID`).
///
/// Names that are not dictionary keywords behave like absent fields.
pub trait FieldAccess {
    fn field_str(&self, name: &str) -> Option<String>;
    fn has_field(&self, name: &str) -> bool;
    /// Overwrites a field that is already present, keeping its VR. Returns `false` when the
    /// field is absent, in which case nothing is written.
    fn replace_field(&mut self, name: &str, value: &str) -> bool;
}

impl FieldAccess for InMemDicomObject<StandardDataDictionary> {
    fn field_str(&self, name: &str) -> Option<String> {
        self.element_by_name(name)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.into_owned())
    }

    fn has_field(&self, name: &str) -> bool {
        self.element_by_name(name).is_ok()
    }

    fn replace_field(&mut self, name: &str, value: &str) -> bool {
        let (tag, vr) = match self.element_by_name(name) {
            Ok(elem) => (elem.header().tag, elem.header().vr),
            Err(_) => return false,
        };

        // Sequences cannot hold text; clear them instead.
        let element = if vr == VR::SQ {
            DataElement::new(tag, vr, DataSetSequence::empty())
        } else {
            DataElement::new(tag, vr, PrimitiveValue::from(value))
        };
        self.put(element);
        true
    }
}

impl FieldAccess for DefaultDicomObject {
    fn field_str(&self, name: &str) -> Option<String> {
        (**self).field_str(name)
    }

    fn has_field(&self, name: &str) -> bool {
        (**self).has_field(name)
    }

    fn replace_field(&mut self, name: &str, value: &str) -> bool {
        (**self).replace_field(name, value)
    }
}
