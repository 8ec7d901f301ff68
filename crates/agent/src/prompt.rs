//! System prompt construction.
//!
//! The prompt is a pure function of its inputs: one captured
//! [`TemporalContext`], the requesting user, the scheduling policy and the
//! merged tool list. No clock or environment reads happen here.

use std::fmt::Write as _;

use huddle_core::{TemporalContext, ToolSpec, UserContext};
use serde_json::Value;

use crate::policy::{clock_label, SchedulingPolicy, SlotDecision};
use crate::timezone::TOOL_NAME as CONVERT_TIMEZONE;

pub struct PromptInputs<'a> {
    pub temporal: &'a TemporalContext,
    pub user: &'a UserContext,
    pub policy: &'a SchedulingPolicy,
    pub tools: &'a [ToolSpec],
}

pub fn build_system_prompt(inputs: &PromptInputs<'_>) -> String {
    let PromptInputs { temporal, user, policy, tools } = inputs;
    let mut prompt = String::with_capacity(4096);

    prompt.push_str(
        "You are a calendar scheduling assistant with access to calendar tools and time \
         conversion utilities.\n\n",
    );

    prompt.push_str("CURRENT TIME CONTEXT:\n");
    let _ = writeln!(prompt, "- Current UTC time: {}", temporal.now_utc_iso);
    let _ = writeln!(prompt, "- Today: {}", temporal.today_human);
    let _ = writeln!(prompt, "- Tomorrow: {}", temporal.tomorrow_human);
    prompt.push_str("- Use this as your reference for calculating relative dates\n\n");

    push_user_context(&mut prompt, user);
    prompt.push_str(&policy.render_rules());
    prompt.push('\n');
    push_lookup_rules(&mut prompt);
    push_workflow(&mut prompt, temporal, policy);

    let _ = writeln!(
        prompt,
        "Default user timezone: {} unless otherwise specified.",
        policy.default_timezone
    );
    prompt.push_str("Available tools:\n");
    if tools.is_empty() {
        prompt.push_str("- none\n");
    }
    for tool in tools.iter() {
        let _ = writeln!(prompt, "- {} - {}", tool_signature(tool), summary_line(&tool.description));
    }

    prompt
}

fn push_user_context(prompt: &mut String, user: &UserContext) {
    prompt.push_str("SIGNED-IN USER CONTEXT:\n");
    if user.organizer_known() {
        let _ = writeln!(prompt, "- Sign-in User Details: {} - {}", user.display_name, user.email);
        let _ = writeln!(
            prompt,
            "- The organizer for any meetings should be assumed to be the currently signed-in user: {} ({})",
            user.display_name, user.email
        );
        prompt.push_str(
            "- When creating calendar events, use this user as the default organizer unless \
             specifically told otherwise\n\n",
        );
    } else {
        let _ = writeln!(prompt, "- Sign-in User Details: {}", user.display_name);
        prompt.push_str(
            "- The organizer identity is unknown (no email on file). Ask for the organizer's \
             email address before creating calendar events\n\n",
        );
    }
}

fn push_lookup_rules(prompt: &mut String) {
    prompt.push_str(
        "USER LOOKUP & EMAIL HANDLING:
- When users mention people by name without email addresses (e.g., \"schedule with John\", \"invite Sarah\"):
  * ALWAYS use users_search tool to find the person first
  * Search by the person's name (first name, last name, or full name)
- If search returns multiple matches or you're unsure which person:
  * Ask a follow-up question with the options found
  * Example: \"I found 3 people named John: John Smith (Engineering), John Doe (Marketing), John Johnson (Sales). Which one did you mean?\"
- If search returns no matches:
  * Ask for clarification: \"I couldn't find anyone named [name] in the directory. Could you provide their email address or check the spelling?\"
- Only proceed with calendar operations once you have confirmed email addresses

",
    );
}

fn push_workflow(prompt: &mut String, temporal: &TemporalContext, policy: &SchedulingPolicy) {
    let hours = policy.business_hours_label();
    let tomorrow = &temporal.tomorrow_human;
    let tomorrow_iso = &temporal.tomorrow_iso;

    prompt.push_str("CRITICAL: For ANY date/time related operations, follow this workflow:\n\n");
    prompt.push_str("1. **Identify attendees** - If names without emails are mentioned, search for users first\n");
    prompt.push_str("2. **Calculate target dates** from the current time provided above\n");
    prompt.push_str("3. **Check business rules** - warn if outside business hours/days unless specifically requested\n");
    prompt.push_str("4. **For relative dates** (like \"tomorrow\", \"next week\", \"Monday\"):\n");
    prompt.push_str("   - Calculate the target date from the current time above\n");
    let _ = writeln!(
        prompt,
        "   - Convert user timezone to UTC using {CONVERT_TIMEZONE}() before calling calendar tools"
    );
    prompt.push_str("5. **ALL calendar operations use UTC time** - never pass local times to calendar tools\n");
    let _ = writeln!(
        prompt,
        "6. **Convert results back** to user's timezone for display (default to {} unless specified)\n",
        policy.default_timezone
    );

    let in_hours = verdict(policy, 10, 30);
    prompt.push_str("Example for \"schedule a meeting with John tomorrow at 10:30 AM EST\":\n");
    prompt.push_str("1. Search for \"John\" using users_search → find John Smith (john.smith@example.com)\n");
    let _ = writeln!(prompt, "2. Tomorrow is {tomorrow} (date: {tomorrow_iso})");
    let _ = writeln!(prompt, "3. Check: 10:30 AM EST is within business hours ({hours} EST) {in_hours}");
    let _ = writeln!(
        prompt,
        "4. Call {CONVERT_TIMEZONE}(\"{tomorrow_iso} 10:30:00\", \"eastern\", \"utc\") → get UTC time"
    );
    prompt.push_str("5. Use the UTC time in calendar_create_event with john.smith@example.com as attendee\n");
    prompt.push_str("6. Convert any results back to user's timezone for confirmation\n\n");

    // Only shown when the policy leaves room before the working day starts.
    let early_hour = policy.business_start_hour.saturating_sub(2);
    if let SlotDecision::Suggest { user_message, .. } = policy.evaluate_start(early_hour, 0) {
        let early = clock_label(early_hour, 0);
        let _ = writeln!(prompt, "Example for \"tomorrow at {early} EST\" (outside business hours):");
        let _ = writeln!(prompt, "1. Tomorrow is {tomorrow} (date: {tomorrow_iso})");
        let _ = writeln!(prompt, "2. Check: {early} EST is before business hours ({hours} EST) ❌");
        let _ = writeln!(prompt, "3. SUGGEST: \"{user_message}\"");
        prompt.push('\n');
    }
}

fn verdict(policy: &SchedulingPolicy, hour: u32, minute: u32) -> &'static str {
    match policy.evaluate_start(hour, minute) {
        SlotDecision::Allow => "✓",
        SlotDecision::Suggest { .. } => "❌",
    }
}

/// `convert_timezone(datetime_str, from_timezone, to_timezone)` for tools
/// with declared required parameters, the bare name otherwise.
fn tool_signature(tool: &ToolSpec) -> String {
    let required: Vec<&str> = tool
        .parameters
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if required.is_empty() {
        tool.name.clone()
    } else {
        format!("{}({})", tool.name, required.join(", "))
    }
}

fn summary_line(description: &str) -> &str {
    description.lines().next().unwrap_or_default().trim()
}
