//! Prompt construction for triage assessments and chat replies.
//!
//! Both builders are pure: the same inputs always produce the same text.
//! Absent or blank data is rendered as an explicit placeholder so the model
//! never sees an empty field.

use crate::models::{PatientProfile, SymptomInput};

use super::emergency::EmergencyKeywords;

pub const TRIAGE_SYSTEM_PROMPT: &str =
    "You are an NHS-trained medical triage AI assistant. Provide a thorough but concise assessment.";

pub const EMERGENCY_MARKER: &str = "⚠️ EMERGENCY KEYWORDS DETECTED - PRIORITIZE URGENCY ASSESSMENT";

pub const CHAT_EMERGENCY_ALERT: &str = "⚠️ **EMERGENCY ALERT**: Your symptoms may require immediate medical attention. If this is a life-threatening emergency, please call 999 immediately.";

/// The four sections every triage response is asked to contain.
pub const OUTPUT_INSTRUCTIONS: &str = r#"Provide a structured assessment with exactly these four sections:

**URGENCY LEVEL:** [Emergency/Urgent/Standard/Self-care]

**CLINICAL ASSESSMENT:**
Brief clinical reasoning based on symptoms and patient history.

**IMMEDIATE ACTIONS:**
What the patient should do right now.

**WARNING SIGNS, FOLLOW-UP & SELF-CARE:**
Red flag symptoms that require immediate medical attention, when and how to seek further care if symptoms persist or worsen, and safe self-management strategies where appropriate.

Be concise but thorough. Always err on the side of caution for serious symptoms."#;

/// Build the triage prompt for one assessment.
///
/// The emergency marker is included when `keywords` match the primary
/// symptom text.
pub fn build_triage_prompt(
    profile: &PatientProfile,
    symptoms: &SymptomInput,
    keywords: &EmergencyKeywords,
) -> String {
    let primary = non_blank(symptoms.primary_symptom.as_deref());
    let emergency = primary.map(|s| keywords.detect(s)).unwrap_or(false);

    let mut prompt = String::new();
    prompt.push_str(TRIAGE_SYSTEM_PROMPT);
    prompt.push_str("\n\n");

    prompt.push_str("PATIENT PROFILE:\n");
    prompt.push_str(&format!(
        "- Age: {}\n",
        profile
            .age
            .map(|a| format!("{a} years"))
            .unwrap_or_else(|| "unknown".to_string())
    ));
    prompt.push_str(&format!(
        "- Gender: {}\n",
        profile.gender.map(|g| g.as_str()).unwrap_or("unknown")
    ));
    prompt.push_str(&format!(
        "- Medical Conditions: {}\n",
        join_or(&profile.existing_conditions, "None reported")
    ));
    prompt.push_str(&format!(
        "- Current Medications: {}\n",
        join_or(&profile.current_medications, "None reported")
    ));
    prompt.push_str(&format!(
        "- Known Allergies: {}\n\n",
        join_or(&profile.allergies, "None reported")
    ));

    prompt.push_str("CURRENT SYMPTOMS:\n");
    if let Some(category) = symptoms.category {
        prompt.push_str(&format!("- Category: {}\n", category.display_name()));
    }
    prompt.push_str(&format!(
        "- Primary Concern: {}\n",
        primary.unwrap_or("Not specified")
    ));
    prompt.push_str(&format!(
        "- Severity Level: {}\n",
        symptoms
            .severity
            .map(|s| format!("{s}/10"))
            .unwrap_or_else(|| "Not reported".to_string())
    ));
    prompt.push_str(&format!(
        "- Duration: {}\n",
        non_blank(symptoms.duration.as_deref()).unwrap_or("Unknown")
    ));
    prompt.push_str(&format!(
        "- Additional Symptoms: {}\n\n",
        join_or(&symptoms.additional_symptoms, "None")
    ));

    if emergency {
        prompt.push_str(EMERGENCY_MARKER);
        prompt.push_str("\n\n");
    }

    prompt.push_str(OUTPUT_INSTRUCTIONS);
    prompt
}

/// Build the conversational prompt for one chat turn.
pub fn build_chat_prompt(message: &str, keywords: &EmergencyKeywords) -> String {
    let mut prompt = String::new();
    if keywords.detect(message) {
        prompt.push_str(CHAT_EMERGENCY_ALERT);
        prompt.push_str("\n\n");
    }
    prompt.push_str(
        "You are an NHS medical assistant. Provide helpful, concise medical guidance (2-3 sentences).\n\n",
    );
    prompt.push_str("Previous context: This is a chat conversation about health concerns.\n\n");
    prompt.push_str(&format!("User message: {}\n\n", message.trim()));
    prompt.push_str(
        "Respond professionally and ask ONE specific follow-up question if appropriate. Always include appropriate medical disclaimers.",
    );
    prompt
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn join_or(items: &[String], placeholder: &str) -> String {
    let present: Vec<&str> = items
        .iter()
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .collect();
    if present.is_empty() {
        placeholder.to_string()
    } else {
        present.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, SymptomCategory};

    fn full_profile() -> PatientProfile {
        PatientProfile {
            age: Some(54),
            gender: Some(Gender::Male),
            existing_conditions: vec!["hypertension".into(), "type 2 diabetes".into()],
            current_medications: vec!["metformin".into()],
            allergies: vec!["penicillin".into()],
        }
    }

    fn full_symptoms(primary: &str) -> SymptomInput {
        SymptomInput {
            category: Some(SymptomCategory::Pain),
            primary_symptom: Some(primary.into()),
            severity: Some(7),
            duration: Some("2 hours".into()),
            additional_symptoms: vec!["nausea".into(), "sweating".into()],
        }
    }

    #[test]
    fn all_supplied_fields_are_rendered() {
        let prompt = build_triage_prompt(
            &full_profile(),
            &full_symptoms("aching left arm"),
            &EmergencyKeywords::default(),
        );
        assert!(prompt.contains("- Age: 54 years"));
        assert!(prompt.contains("- Gender: male"));
        assert!(prompt.contains("hypertension, type 2 diabetes"));
        assert!(prompt.contains("- Current Medications: metformin"));
        assert!(prompt.contains("- Known Allergies: penicillin"));
        assert!(prompt.contains("- Category: Pain & Discomfort"));
        assert!(prompt.contains("- Primary Concern: aching left arm"));
        assert!(prompt.contains("- Severity Level: 7/10"));
        assert!(prompt.contains("- Duration: 2 hours"));
        assert!(prompt.contains("- Additional Symptoms: nausea, sweating"));
    }

    #[test]
    fn absent_fields_render_placeholders() {
        let prompt = build_triage_prompt(
            &PatientProfile::default(),
            &SymptomInput::default(),
            &EmergencyKeywords::default(),
        );
        assert!(prompt.contains("- Age: unknown"));
        assert!(prompt.contains("- Gender: unknown"));
        assert!(prompt.contains("- Medical Conditions: None reported"));
        assert!(prompt.contains("- Current Medications: None reported"));
        assert!(prompt.contains("- Known Allergies: None reported"));
        assert!(prompt.contains("- Primary Concern: Not specified"));
        assert!(prompt.contains("- Severity Level: Not reported"));
        assert!(prompt.contains("- Duration: Unknown"));
        assert!(prompt.contains("- Additional Symptoms: None"));
        assert!(!prompt.contains("- Category:"));
        assert!(!prompt.contains(": \n"));
    }

    #[test]
    fn blank_entries_count_as_absent() {
        let profile = PatientProfile {
            existing_conditions: vec!["  ".into(), String::new()],
            ..Default::default()
        };
        let symptoms = SymptomInput {
            primary_symptom: Some("   ".into()),
            duration: Some(String::new()),
            additional_symptoms: vec!["".into(), "rash".into()],
            ..Default::default()
        };
        let prompt = build_triage_prompt(&profile, &symptoms, &EmergencyKeywords::default());
        assert!(prompt.contains("- Medical Conditions: None reported"));
        assert!(prompt.contains("- Primary Concern: Not specified"));
        assert!(prompt.contains("- Duration: Unknown"));
        assert!(prompt.contains("- Additional Symptoms: rash"));
    }

    #[test]
    fn emergency_marker_present_iff_primary_symptom_matches() {
        let keywords = EmergencyKeywords::default();
        let flagged = build_triage_prompt(&full_profile(), &full_symptoms("Crushing CHEST PAIN"), &keywords);
        assert!(flagged.contains(EMERGENCY_MARKER));

        let calm = build_triage_prompt(&full_profile(), &full_symptoms("stiff neck"), &keywords);
        assert!(!calm.contains(EMERGENCY_MARKER));
    }

    #[test]
    fn keywords_in_other_fields_do_not_trigger_marker() {
        let mut symptoms = full_symptoms("tired");
        symptoms.additional_symptoms = vec!["chest pain".into()];
        let prompt = build_triage_prompt(&full_profile(), &symptoms, &EmergencyKeywords::default());
        assert!(!prompt.contains(EMERGENCY_MARKER));
    }

    #[test]
    fn instruction_block_names_four_sections() {
        let prompt = build_triage_prompt(
            &PatientProfile::default(),
            &SymptomInput::default(),
            &EmergencyKeywords::default(),
        );
        for section in [
            "**URGENCY LEVEL:**",
            "**CLINICAL ASSESSMENT:**",
            "**IMMEDIATE ACTIONS:**",
            "**WARNING SIGNS, FOLLOW-UP & SELF-CARE:**",
        ] {
            assert_eq!(prompt.matches(section).count(), 1, "{section}");
        }
    }

    #[test]
    fn triage_prompt_is_deterministic() {
        let keywords = EmergencyKeywords::default();
        let a = build_triage_prompt(&full_profile(), &full_symptoms("headache"), &keywords);
        let b = build_triage_prompt(&full_profile(), &full_symptoms("headache"), &keywords);
        assert_eq!(a, b);
    }

    #[test]
    fn chat_prompt_prepends_alert_on_emergency() {
        let keywords = EmergencyKeywords::default();
        let alert = build_chat_prompt("I think I'm having a heart attack", &keywords);
        assert!(alert.starts_with(CHAT_EMERGENCY_ALERT));
        assert!(alert.contains("User message: I think I'm having a heart attack"));

        let plain = build_chat_prompt("Is ibuprofen ok with a cold?", &keywords);
        assert!(!plain.contains("EMERGENCY ALERT"));
        assert!(plain.starts_with("You are an NHS medical assistant"));
    }
}
