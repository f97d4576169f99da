//! Patient intake state machine
//!
//! Before a session can ask medical questions, a fixed sequence of profile
//! fields is collected one user turn at a time: name, age, weight, height,
//! blood group. The machine is linear and never branches back; a rejected
//! value re-prompts the same step without storing anything.

use serde::{Deserialize, Serialize};

use crate::config::PromptSet;

/// Structured facts collected during intake.
///
/// Fields populate strictly in declaration order. Once `blood_group` is set
/// the profile is complete and intake never runs again for the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub weight: Option<String>,
    pub height: Option<String>,
    pub blood_group: Option<String>,
}

impl PatientProfile {
    pub fn is_complete(&self) -> bool {
        self.blood_group.is_some()
    }

    /// The next field intake will ask for, or `None` when complete.
    pub fn next_field(&self) -> Option<IntakeField> {
        if self.name.is_none() {
            Some(IntakeField::Name)
        } else if self.age.is_none() {
            Some(IntakeField::Age)
        } else if self.weight.is_none() {
            Some(IntakeField::Weight)
        } else if self.height.is_none() {
            Some(IntakeField::Height)
        } else if self.blood_group.is_none() {
            Some(IntakeField::BloodGroup)
        } else {
            None
        }
    }

    /// Profile block for the generation prompt. Unset fields render as
    /// "Unknown", which should not occur once intake has completed.
    pub fn prompt_block(&self) -> String {
        fn or_unknown(value: Option<&str>) -> &str {
            value.unwrap_or("Unknown")
        }

        format!(
            "Patient name: {}\nAge: {}\nWeight: {}\nHeight: {}\nBlood group: {}",
            or_unknown(self.name.as_deref()),
            self.age
                .map(|a| a.to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            or_unknown(self.weight.as_deref()),
            or_unknown(self.height.as_deref()),
            or_unknown(self.blood_group.as_deref()),
        )
    }
}

/// The profile fields, in collection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeField {
    Name,
    Age,
    Weight,
    Height,
    BloodGroup,
}

/// Result of feeding one user turn into the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// A field was stored; reply with the prompt for the next step.
    Advance(String),
    /// The input was rejected; reply with a validation prompt and stay put.
    Retry(String),
    /// Every field is already set; the caller should answer questions instead.
    Complete,
}

/// Feed one user turn into the intake sequence.
///
/// Exactly one field transitions per call. Age is the only validated field;
/// everything else accepts arbitrary text as given.
pub fn advance(profile: &mut PatientProfile, input: &str, prompts: &PromptSet) -> IntakeOutcome {
    match profile.next_field() {
        Some(IntakeField::Name) => {
            profile.name = Some(input.trim().to_string());
            IntakeOutcome::Advance(prompts.ask_age.clone())
        }
        Some(IntakeField::Age) => match input.trim().parse::<u32>() {
            Ok(age) => {
                profile.age = Some(age);
                IntakeOutcome::Advance(prompts.ask_weight.clone())
            }
            Err(_) => IntakeOutcome::Retry(prompts.invalid_age.clone()),
        },
        Some(IntakeField::Weight) => {
            profile.weight = Some(input.to_string());
            IntakeOutcome::Advance(prompts.ask_height.clone())
        }
        Some(IntakeField::Height) => {
            profile.height = Some(input.to_string());
            IntakeOutcome::Advance(prompts.ask_blood_group.clone())
        }
        Some(IntakeField::BloodGroup) => {
            profile.blood_group = Some(input.to_string());
            let name = profile.name.clone().unwrap_or_default();
            IntakeOutcome::Advance(prompts.closing_for(&name))
        }
        None => IntakeOutcome::Complete,
    }
}
