//! Detection classification
//!
//! Maps the free-text `animal`, `role` and legacy `human` fields onto the
//! detected animal and person role. `role` always takes precedence.

use crate::snapshot::{set_value, RawSnapshot, Scalar};
use crate::PersonRole;

/// Canonical detection result
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Detection {
    pub animal: Option<String>,
    pub person: Option<PersonRole>,
}

/// Animal name passed through verbatim when set
pub fn classify_animal(raw: &RawSnapshot) -> Option<String> {
    set_value(&raw.animal).map(Scalar::to_string)
}

/// Case-insensitive substring match; poacher is checked first
pub fn classify_person_text(text: &str) -> Option<PersonRole> {
    let lower = text.to_lowercase();
    if lower.contains("poacher") {
        Some(PersonRole::Poacher)
    } else if lower.contains("ranger") {
        Some(PersonRole::Ranger)
    } else {
        None
    }
}

/// Person role from `role`, falling back to `human` when `role` says nothing
pub fn classify_person(raw: &RawSnapshot) -> Option<PersonRole> {
    let from = |field: &Option<Scalar>| {
        set_value(field).and_then(|value| classify_person_text(&value.to_string()))
    };

    match from(&raw.role) {
        Some(role) => {
            tracing::debug!(?role, "Person classified from role field");
            Some(role)
        }
        None => {
            let role = from(&raw.human);
            if role.is_some() {
                tracing::debug!(?role, "Person classified from legacy human field");
            }
            role
        }
    }
}

pub fn classify(raw: &RawSnapshot) -> Detection {
    Detection {
        animal: classify_animal(raw),
        person: classify_person(raw),
    }
}
