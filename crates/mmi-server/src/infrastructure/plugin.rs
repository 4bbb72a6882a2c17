//! Optional device plugins, selected by name at startup.
//!
//! The loader always returns a usable classifier.  An unknown or absent
//! name falls back to [`NoopKnuckleClassifier`], so the rest of the service
//! never checks whether a plugin is present.

use std::sync::Arc;

use mmi_core::domain::ToolType;
use tracing::{info, warn};

use crate::transform::touchscreen::ContactSample;
use crate::transform::{KnuckleClassifier, NoopKnuckleClassifier};

/// Knuckle classifier for panels that report contact size.
///
/// A knuckle touches with a small, hard contact: narrow ellipse, high
/// pressure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactSizeKnuckleClassifier {
    pub max_major: f64,
    pub min_pressure: f64,
}

impl ContactSizeKnuckleClassifier {
    pub const NAME: &'static str = "contact-size";
}

impl Default for ContactSizeKnuckleClassifier {
    fn default() -> Self {
        Self {
            max_major: 4.0,
            min_pressure: 0.6,
        }
    }
}

impl KnuckleClassifier for ContactSizeKnuckleClassifier {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn classify(&self, contact: &ContactSample) -> ToolType {
        if contact.major > 0.0 && contact.major <= self.max_major && contact.pressure >= self.min_pressure {
            ToolType::Knuckle
        } else {
            ToolType::Finger
        }
    }
}

/// Returns the classifier named `name`, or the no-op one.
pub fn load_knuckle_classifier(name: Option<&str>) -> Arc<dyn KnuckleClassifier> {
    match name {
        None => Arc::new(NoopKnuckleClassifier),
        Some(ContactSizeKnuckleClassifier::NAME) => {
            info!(plugin = ContactSizeKnuckleClassifier::NAME, "knuckle classifier loaded");
            Arc::new(ContactSizeKnuckleClassifier::default())
        }
        Some(other) => {
            warn!(plugin = other, "unknown knuckle classifier; using none");
            Arc::new(NoopKnuckleClassifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_falls_back_to_noop() {
        assert_eq!(load_knuckle_classifier(None).name(), "noop");
        assert_eq!(load_knuckle_classifier(Some("vendor-x")).name(), "noop");
        assert_eq!(load_knuckle_classifier(Some("contact-size")).name(), "contact-size");
    }

    #[test]
    fn test_small_hard_contact_is_knuckle() {
        let classifier = ContactSizeKnuckleClassifier::default();

        let knuckle = classifier.classify(&ContactSample { pressure: 0.9, major: 3.0 });
        let finger = classifier.classify(&ContactSample { pressure: 0.9, major: 9.0 });
        let light = classifier.classify(&ContactSample { pressure: 0.2, major: 3.0 });

        assert_eq!(knuckle, ToolType::Knuckle);
        assert_eq!(finger, ToolType::Finger);
        assert_eq!(light, ToolType::Finger);
    }
}
