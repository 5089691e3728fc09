use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Section {
    Mcq,
    ShortAnswer,
    Calculation,
    Essay,
    Reading,
    Grammar,
    Literature,
    Vocabulary,
    Structured,
    Writing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum QuestionKind {
    Mcq,
    Text,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TextDirection {
    #[default]
    Ltr,
    Rtl,
}

/// Lifecycle of one attempt. There is no `NotStarted` variant: an attempt
/// that has not started is simply absent from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SessionPhase {
    InProgress,
    ConfirmingSubmit,
    Grading,
    Completed,
}

impl SessionPhase {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::ConfirmingSubmit => "confirming_submit",
            Self::Grading => "grading",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum GradeLetter {
    A,
    B,
    C,
    D,
    F,
}

impl GradeLetter {
    /// Fixed thresholds: >=80 A, >=70 B, >=60 C, >=50 D, else F.
    pub(crate) fn from_percentage(percentage: f64) -> Self {
        if percentage >= 80.0 {
            Self::A
        } else if percentage >= 70.0 {
            Self::B
        } else if percentage >= 60.0 {
            Self::C
        } else if percentage >= 50.0 {
            Self::D
        } else {
            Self::F
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::GradeLetter;

    #[test]
    fn grade_letter_boundaries() {
        assert_eq!(GradeLetter::from_percentage(100.0), GradeLetter::A);
        assert_eq!(GradeLetter::from_percentage(80.0), GradeLetter::A);
        assert_eq!(GradeLetter::from_percentage(79.9), GradeLetter::B);
        assert_eq!(GradeLetter::from_percentage(70.0), GradeLetter::B);
        assert_eq!(GradeLetter::from_percentage(60.0), GradeLetter::C);
        assert_eq!(GradeLetter::from_percentage(50.0), GradeLetter::D);
        assert_eq!(GradeLetter::from_percentage(49.9), GradeLetter::F);
        assert_eq!(GradeLetter::from_percentage(0.0), GradeLetter::F);
    }
}
