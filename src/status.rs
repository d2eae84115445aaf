use crate::orchestrator::PlanSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Error,
}

/// Transient on-page notification for a fill pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Analyzing,
    Filling(PlanSource),
    Success,
    Error,
}

impl Status {
    pub fn message(&self) -> &'static str {
        match self {
            Status::Analyzing => "Analyzing form with AI...",
            Status::Filling(PlanSource::Analyzer) => "Filling form fields...",
            Status::Filling(PlanSource::PatternTable) => "Using smart pattern matching...",
            Status::Success => "Form filled successfully!",
            Status::Error => "Error filling form",
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            Status::Analyzing | Status::Filling(_) => Tone::Info,
            Status::Success => Tone::Success,
            Status::Error => Tone::Error,
        }
    }

    /// Info statuses stay until replaced; outcomes dismiss themselves.
    pub fn auto_dismisses(&self) -> bool {
        self.tone() != Tone::Info
    }

    pub fn color(&self) -> &'static str {
        match self.tone() {
            Tone::Info => "#4F46E5",
            Tone::Success => "#10B981",
            Tone::Error => "#EF4444",
        }
    }
}

/// Where status notifications are shown. Showing a status replaces the previous one.
pub trait StatusSurface {
    fn show(&self, status: &Status);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_outcomes_auto_dismiss() {
        assert!(!Status::Analyzing.auto_dismisses());
        assert!(!Status::Filling(PlanSource::PatternTable).auto_dismisses());
        assert!(Status::Success.auto_dismisses());
        assert!(Status::Error.auto_dismisses());
    }

    #[test]
    fn test_filling_message_reflects_plan_source() {
        assert_eq!(Status::Filling(PlanSource::Analyzer).message(), "Filling form fields...");
        assert_eq!(
            Status::Filling(PlanSource::PatternTable).message(),
            "Using smart pattern matching..."
        );
        assert_eq!(Status::Error.color(), "#EF4444");
    }
}
