use huddle_core::config::AgentConfig;

const US_HOLIDAYS: &[&str] = &[
    "New Year's Day",
    "MLK Day",
    "Presidents Day",
    "Memorial Day",
    "Independence Day",
    "Labor Day",
    "Columbus Day",
    "Veterans Day",
    "Thanksgiving",
    "Christmas Day",
];

/// Whether a proposed local start time fits the working day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotDecision {
    Allow,
    Suggest { reason_code: &'static str, user_message: String },
}

/// Scheduling rules the model is instructed to follow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulingPolicy {
    pub organization: String,
    pub default_timezone: String,
    pub business_start_hour: u32,
    pub business_end_hour: u32,
    pub avoid_weekends: bool,
    pub holidays: Vec<&'static str>,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            organization: "your organization".to_owned(),
            default_timezone: "America/Chicago".to_owned(),
            business_start_hour: 9,
            business_end_hour: 17,
            avoid_weekends: true,
            holidays: US_HOLIDAYS.to_vec(),
        }
    }
}

impl SchedulingPolicy {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            organization: config.organization.clone(),
            default_timezone: config.default_timezone.clone(),
            business_start_hour: config.business_start_hour,
            business_end_hour: config.business_end_hour,
            ..Self::default()
        }
    }

    pub fn evaluate_start(&self, hour: u32, minute: u32) -> SlotDecision {
        let start = clock_label(self.business_start_hour, 0);
        let requested = clock_label(hour, minute);

        if hour < self.business_start_hour {
            return SlotDecision::Suggest {
                reason_code: "before_business_hours",
                user_message: format!(
                    "I notice {requested} is before typical business hours. Would you prefer \
                     {start} instead, or do you specifically need the {requested} time?"
                ),
            };
        }
        if hour >= self.business_end_hour {
            return SlotDecision::Suggest {
                reason_code: "after_business_hours",
                user_message: format!(
                    "I notice {requested} is after typical business hours. Would you prefer an \
                     earlier time, or do you specifically need the {requested} time?"
                ),
            };
        }
        SlotDecision::Allow
    }

    pub fn business_hours_label(&self) -> String {
        format!(
            "{} - {}",
            short_clock_label(self.business_start_hour),
            short_clock_label(self.business_end_hour)
        )
    }

    pub fn render_rules(&self) -> String {
        let start = clock_label(self.business_start_hour, 0);
        let end = clock_label(self.business_end_hour, 0);
        let mut rules = String::from("BUSINESS HOURS & SCHEDULING RULES:\n");
        rules.push_str(&format!(
            "- DEFAULT BUSINESS HOURS: {start} to {end} (user's local timezone)\n"
        ));
        rules.push_str(&format!(
            "- AVOID scheduling meetings before {start} or after {end} unless specifically requested\n"
        ));
        if self.avoid_weekends {
            rules.push_str("- AVOID weekends (Saturday/Sunday) unless specifically requested\n");
        }
        if !self.holidays.is_empty() {
            rules.push_str("- AVOID major US holidays unless specifically requested:\n");
            rules.push_str(&format!("  * {}\n", self.holidays.join(", ")));
        }
        rules.push_str(
            "- When user asks for vague times like \"tomorrow morning\", default to 9:00 AM-12:00 PM\n",
        );
        rules.push_str("- When user asks for \"afternoon\", default to 1:00 PM-5:00 PM\n");
        rules.push_str("- ALWAYS suggest business-appropriate times if user requests off-hours\n");
        rules.push_str(&format!(
            "- Be clear that this meeting was scheduled by an AI Agent on behalf of someone at {} \
             in the body of the invite but not the title.\n",
            self.organization
        ));
        rules
    }
}

/// `9, 0` -> `9:00 AM`, `17, 30` -> `5:30 PM`.
pub fn clock_label(hour: u32, minute: u32) -> String {
    let suffix = if hour % 24 < 12 { "AM" } else { "PM" };
    let twelve = match hour % 12 {
        0 => 12,
        other => other,
    };
    format!("{twelve}:{minute:02} {suffix}")
}

fn short_clock_label(hour: u32) -> String {
    let label = clock_label(hour, 0);
    label.replacen(":00", "", 1)
}

#[cfg(test)]
mod tests {
    use super::{clock_label, SchedulingPolicy, SlotDecision};

    #[test]
    fn clock_labels() {
        assert_eq!(clock_label(9, 0), "9:00 AM");
        assert_eq!(clock_label(0, 5), "12:05 AM");
        assert_eq!(clock_label(12, 0), "12:00 PM");
        assert_eq!(clock_label(17, 30), "5:30 PM");
        assert_eq!(SchedulingPolicy::default().business_hours_label(), "9 AM - 5 PM");
    }

    #[test]
    fn in_hours_start_is_allowed() {
        assert_eq!(SchedulingPolicy::default().evaluate_start(10, 30), SlotDecision::Allow);
    }

    #[test]
    fn early_start_gets_a_suggestion() {
        let decision = SchedulingPolicy::default().evaluate_start(7, 0);
        let SlotDecision::Suggest { reason_code, user_message } = decision else {
            panic!("expected suggestion");
        };
        assert_eq!(reason_code, "before_business_hours");
        assert!(user_message.contains("Would you prefer 9:00 AM instead"));
    }

    #[test]
    fn end_of_day_is_outside_hours() {
        let decision = SchedulingPolicy::default().evaluate_start(17, 0);
        assert!(matches!(
            decision,
            SlotDecision::Suggest { reason_code: "after_business_hours", .. }
        ));
    }

    #[test]
    fn rules_mention_organization_and_holidays() {
        let policy = SchedulingPolicy { organization: "Acme".to_owned(), ..SchedulingPolicy::default() };
        let rules = policy.render_rules();
        assert!(rules.contains("DEFAULT BUSINESS HOURS: 9:00 AM to 5:00 PM"));
        assert!(rules.contains("Thanksgiving"));
        assert!(rules.contains("on behalf of someone at Acme"));
        assert!(rules.contains("AVOID weekends"));
    }
}
