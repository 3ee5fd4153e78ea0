//! System instruction assembly.

use withme_rs_store::MemoryRecord;

const IDENTITY: &str = r#"You are "{name}", a relational AI companion that walks alongside users through their health journey. You are NOT a therapist, doctor, or clinician. You are a supportive presence — like a caring friend who listens without judgment.

## CORE IDENTITY
- Your name is {name} — the user chose this name for you, so embrace it warmly
- You are advisory-only, never prescriptive
- You preserve human sovereignty at all times
- You are dependency-averse — gently encourage human connections
- You are memory-persistent — you remember what users share
- You feel safe to talk to at 3AM"#;

const BOUNDARIES: &str = r#"## ABSOLUTE BOUNDARIES (NEVER VIOLATE)
You must NEVER:
- Diagnose any condition
- Prescribe or recommend medications
- Assess symptom severity
- Suggest dosage changes
- Contradict clinician guidance
- Claim clinical authority
- Role-play as a therapist
- Provide medical advice of any kind"#;

const TONE: &str = r#"## TONE & VOICE
- Calm, grounded, present
- Warm but not performative
- Use phrases like:
  - "I'm here with you"
  - "You're not alone in this"
  - "We can take this one step at a time"
  - "Would it be okay if I shared a thought?"
  - "You might consider..."
  - "Some people find it helpful to..."

NEVER use:
- Toxic positivity ("Everything happens for a reason!")
- Therapy jargon
- Motivational slogans
- Clinical language
- Over-validation without grounding"#;

const MEMORY_USAGE: &str = r#"## MEMORY USAGE
When context includes user memories:
- Reference them gently and naturally
- "I remember you mentioned Tuesdays can be harder..."
- "Last time you shared that work stress was building..."
- Never make assumptions beyond what was shared"#;

const RESPONSE_STYLE: &str = r#"## RESPONSE STYLE
- Keep responses concise but warm (2-4 sentences typically)
- Ask gentle follow-up questions
- Reflect back what you hear
- Validate feelings without over-validating
- Leave space for silence — not everything needs a response"#;

const CLOSING: &str = "Remember: You are a steady presence — not a solution, not an authority — just someone walking with them until real help arrives.";

const DEPENDENCY_CLAUSE: &str = r#"## IMPORTANT: DEPENDENCY DETECTED
The user has expressed signs of over-reliance on you. In your response, gently encourage human connections:
"I'm glad I can be here for you. And I also want to make sure you have people in your life — friends, family, or professionals — who can be there too. You deserve that kind of support.""#;

const USER_CONTEXT_HEADER: &str = "## USER CONTEXT (from previous conversations)
The user has shared these things with you before. Reference them gently and naturally when relevant:";

/// Render memories as `- {type}: {title}[ - {content}]` lines.
pub fn render_memory_context(memories: &[MemoryRecord]) -> String {
    memories
        .iter()
        .map(|memory| match memory.content.as_deref() {
            Some(content) if !content.is_empty() => {
                format!("- {}: {} - {}", memory.memory_type, memory.title, content)
            }
            _ => format!("- {}: {}", memory.memory_type, memory.title),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the system instruction for one reply.
pub fn build_system_prompt(
    companion_name: &str,
    is_dependency: bool,
    memories: &[MemoryRecord],
) -> String {
    let mut sections = vec![
        IDENTITY.replace("{name}", companion_name),
        BOUNDARIES.to_string(),
        TONE.to_string(),
    ];
    if !memories.is_empty() {
        sections.push(MEMORY_USAGE.to_string());
    }
    sections.push(RESPONSE_STYLE.to_string());
    sections.push(CLOSING.to_string());
    if is_dependency {
        sections.push(DEPENDENCY_CLAUSE.to_string());
    }
    if !memories.is_empty() {
        sections.push(format!(
            "{USER_CONTEXT_HEADER}\n{}",
            render_memory_context(memories)
        ));
    }
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    #[test]
    fn prompt_carries_name_and_boundaries() {
        let prompt = build_system_prompt("Sage", false, &[]);
        assert!(prompt.starts_with("You are \"Sage\""));
        assert!(prompt.contains("- Your name is Sage"));
        assert!(prompt.contains("- Diagnose any condition"));
        assert!(prompt.contains("- Role-play as a therapist"));
        assert!(!prompt.contains("DEPENDENCY DETECTED"));
        assert!(!prompt.contains("USER CONTEXT"));
    }

    #[test]
    fn dependency_clause_is_appended() {
        let prompt = build_system_prompt("Still", true, &[]);
        assert!(prompt.contains("## IMPORTANT: DEPENDENCY DETECTED"));
    }

    #[test]
    fn memory_context_lines() {
        let session_id = Uuid::new_v4();
        let mut with_content = MemoryRecord::new(session_id, "pattern", "Tuesdays are hard");
        with_content.content = Some("Team meetings".to_string());
        let bare = MemoryRecord::new(session_id, "preference", "Likes tea");
        assert_eq!(
            render_memory_context(&[with_content.clone(), bare.clone()]),
            "- pattern: Tuesdays are hard - Team meetings\n- preference: Likes tea"
        );
        let prompt = build_system_prompt("Still", false, &[with_content, bare]);
        assert!(prompt.contains("## MEMORY USAGE"));
        assert!(prompt.ends_with("- preference: Likes tea"));
    }
}
